// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crossbeam_utils::Backoff;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const READY: u8 = 2;
const ABANDONED: u8 = 3;

/// The shared value slot behind a [`Promise`]/[`Future`] pair.
struct Slot<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the cell is written once, by the thread that wins the
// EMPTY -> WRITING transition, and only read after READY has been observed
// with acquire ordering. `T: Sync` because every reader copies out of the
// same shared cell.
unsafe impl<T: Send + Sync> Sync for Slot<T> {}

impl<T: Copy> Slot<T> {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    fn publish(&self, value: T) {
        let claimed = self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed);
        assert!(
            claimed.is_ok(),
            "single-assignment slot published more than once"
        );

        // SAFETY: winning EMPTY -> WRITING grants exclusive access to the cell;
        // readers do not touch it until they observe READY.
        unsafe { (*self.value.get()).write(value) };
        self.state.store(READY, Ordering::Release);
    }

    fn read(&self) -> Option<T> {
        if self.state.load(Ordering::Acquire) == READY {
            // SAFETY: READY is stored with release ordering after the write,
            // and the cell is never written again.
            Some(unsafe { (*self.value.get()).assume_init() })
        } else {
            None
        }
    }
}

/// The write side of a single-assignment value.
///
/// Publishing consumes the promise, so a value can be set at most once.
/// Dropping a promise without publishing marks its [`Future`] as abandoned.
pub struct Promise<T: Copy + Send + Sync + 'static> {
    slot: Arc<Slot<T>>,
}

/// The read side of a single-assignment value.
///
/// Cloning is cheap and every clone observes the same value.
pub struct Future<T: Copy + Send + Sync + 'static> {
    slot: Arc<Slot<T>>,
}

/// Creates a connected [`Promise`]/[`Future`] pair.
pub fn promise<T: Copy + Send + Sync + 'static>() -> (Promise<T>, Future<T>) {
    let slot = Arc::new(Slot::new());
    (
        Promise {
            slot: Arc::clone(&slot),
        },
        Future { slot },
    )
}

impl<T: Copy + Send + Sync + 'static> Promise<T> {
    /// Creates a new pair. Equivalent to [`promise`].
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Promise<T>, Future<T>) {
        promise()
    }

    /// Returns another reader connected to this promise.
    pub fn future(&self) -> Future<T> {
        Future {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Publishes `value` to every connected [`Future`].
    ///
    /// The write is made visible with release ordering, so any thread that
    /// observes the future as ready also observes the value.
    pub fn set_value(self, value: T) {
        self.slot.publish(value);
    }
}

impl<T: Copy + Send + Sync + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        // Only an unpublished slot can be abandoned; a READY slot is left alone.
        let _ = self.slot.state.compare_exchange(
            EMPTY,
            ABANDONED,
            Ordering::Release,
            Ordering::Relaxed,
        );
    }
}

impl<T: Copy + Send + Sync + 'static> Future<T> {
    /// Returns `true` once a value has been published.
    pub fn poll(&self) -> bool {
        self.slot.state.load(Ordering::Acquire) == READY
    }

    /// Returns the value if it has been published, without waiting.
    pub fn try_get(&self) -> Option<T> {
        self.slot.read()
    }

    /// Returns `true` if the promise was dropped without publishing.
    pub fn is_abandoned(&self) -> bool {
        self.slot.state.load(Ordering::Acquire) == ABANDONED
    }

    /// Waits for the value and returns it.
    ///
    /// Waiting is cooperative: a short spin followed by repeated
    /// [`std::thread::yield_now`], never an OS-level block.
    ///
    /// # Panics
    ///
    /// Panics if the promise is dropped without publishing a value.
    pub fn get(&self) -> T {
        let backoff = Backoff::new();
        loop {
            if let Some(value) = self.slot.read() {
                return value;
            }
            if self.is_abandoned() {
                panic!("promise dropped without publishing a value");
            }
            backoff.snooze();
        }
    }
}

impl<T: Copy + Send + Sync + 'static> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Copy + Send + Sync + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

impl<T: Copy + Send + Sync + fmt::Debug + 'static> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("value", &self.try_get())
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn not_ready_before_publish() {
        let (promise, future) = promise::<i32>();
        assert!(!future.poll());
        assert_eq!(future.try_get(), None);
        assert!(!future.is_abandoned());
        drop(promise);
    }

    #[test]
    fn ready_after_single_publish() {
        let (promise, future) = promise::<i32>();
        promise.set_value(42);
        assert!(future.poll());
        assert_eq!(future.try_get(), Some(42));
        assert_eq!(future.get(), 42);
        assert_eq!(future.get(), 42);
    }

    #[test]
    fn publish_after_drop_of_other_reader_still_visible() {
        let (promise, future) = promise::<u64>();
        let extra = promise.future();
        drop(future);
        promise.set_value(7);
        assert_eq!(extra.get(), 7);
    }

    #[test]
    fn concurrent_readers_all_observe_the_value() {
        const READERS: usize = 8;
        let (promise, future) = promise::<(u32, u32)>();
        let barrier = Arc::new(Barrier::new(READERS + 1));

        let handles: Vec<_> = (0..READERS)
            .map(|_| {
                let future = future.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    future.get()
                })
            })
            .collect();

        barrier.wait();
        thread::sleep(Duration::from_millis(10));
        promise.set_value((5, 10));

        for handle in handles {
            assert_eq!(handle.join().expect("reader panicked"), (5, 10));
        }
    }

    #[test]
    fn dropped_promise_marks_future_abandoned() {
        let (promise, future) = promise::<i32>();
        drop(promise);
        assert!(future.is_abandoned());
        assert!(!future.poll());
        assert_eq!(future.try_get(), None);
    }

    #[test]
    #[should_panic(expected = "promise dropped without publishing a value")]
    fn get_on_abandoned_future_panics() {
        let (promise, future) = promise::<i32>();
        drop(promise);
        future.get();
    }

    #[test]
    fn publish_is_not_undone_by_drop() {
        let (promise, future) = Promise::<i32>::new();
        promise.set_value(1);
        assert!(!future.is_abandoned());
        assert_eq!(future.get(), 1);
    }

    #[test]
    #[should_panic(expected = "published more than once")]
    fn slot_rejects_second_publish() {
        let slot = Slot::<i32>::new();
        slot.publish(1);
        slot.publish(2);
    }
}
