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

//! Bounded lock-free ring buffer for deferred event delivery.
//!
//! Multiple producers, one consumer. Every slot carries a stamp that says
//! which ticket may touch it next:
//!
//! ```text
//! stamp == t        slot is free for the producer holding ticket t
//! stamp == t + 1    slot holds the value of ticket t, ready for the consumer
//! stamp == t + cap  slot was consumed, free for ticket t + cap
//! ```
//!
//! A producer claims a ticket by a CAS on `tail` *before* writing, so two
//! producers can never write the same slot. The payload becomes visible to
//! the consumer through the release store of the slot stamp, paired with an
//! acquire load on the consumer side.

use crate::error::CapacityExceeded;
use crossbeam_utils::{Backoff, CachePadded};
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Smallest supported capacity. With a single slot the "published" stamp of
/// one ticket equals the "free" stamp of the next.
pub const MIN_CAPACITY: usize = 2;

struct Slot<T> {
    stamp: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A fixed-capacity multi-producer, single-consumer queue of `Copy` records.
///
/// A queue of capacity `C` holds exactly `C` records before
/// [`push`](RingBuffer::push) reports [`CapacityExceeded::Queue`].
pub struct RingBuffer<T: Copy + Send> {
    slots: Box<[Slot<T>]>,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    len: AtomicUsize,
    consuming: AtomicBool,
}

// SAFETY: a slot's value is only written by the producer that won its ticket
// and only read by the single consumer after acquiring the published stamp.
unsafe impl<T: Copy + Send> Sync for RingBuffer<T> {}

impl<T: Copy + Send> RingBuffer<T> {
    /// Creates an empty buffer. Capacities below [`MIN_CAPACITY`] are raised.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        let slots = (0..capacity)
            .map(|i| Slot {
                stamp: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            slots,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            len: AtomicUsize::new(0),
            consuming: AtomicBool::new(false),
        }
    }

    /// Appends a record. Safe to call from any number of threads.
    ///
    /// Records pushed by one thread are consumed in the order they were
    /// pushed. Records from different threads are ordered by whichever
    /// ticket claim succeeded first.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityExceeded::Queue`] when every slot is occupied or
    /// still being written. The record is not stored.
    pub fn push(&self, value: T) -> Result<(), CapacityExceeded> {
        let capacity = self.slots.len();
        let backoff = Backoff::new();
        let mut tail = self.tail.load(Ordering::Relaxed);

        loop {
            // Recomputed on every attempt: the slot follows the ticket.
            let slot = &self.slots[tail % capacity];
            let stamp = slot.stamp.load(Ordering::Acquire);
            let lag = stamp.wrapping_sub(tail) as isize;

            if lag == 0 {
                match self.tail.compare_exchange_weak(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // Counted before publishing so the consumer's decrement
                        // can never run first.
                        self.len.fetch_add(1, Ordering::Relaxed);
                        // SAFETY: ticket `tail` is ours alone until we publish
                        // the stamp below; the consumer ignores the slot until then.
                        unsafe { (*slot.value.get()).write(value) };
                        slot.stamp.store(tail.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => {
                        tail = current;
                        backoff.spin();
                    }
                }
            } else if lag < 0 {
                // The slot still belongs to the previous lap.
                return Err(CapacityExceeded::Queue { capacity });
            } else {
                // Another producer already took this ticket.
                backoff.spin();
                tail = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Claims the consumer side of the buffer.
    ///
    /// Returns `None` while another [`Consumer`] is alive, which is how the
    /// single-consumer rule is enforced.
    pub fn consumer(&self) -> Option<Consumer<'_, T>> {
        self.consuming
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Consumer { ring: self })
    }

    /// Number of records stored, including claims whose write is in flight.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns `true` if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of records the buffer holds at once.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T: Copy + Send> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Exclusive consumer access to a [`RingBuffer`]. Released on drop.
pub struct Consumer<'a, T: Copy + Send> {
    ring: &'a RingBuffer<T>,
}

impl<T: Copy + Send> Consumer<'_, T> {
    /// Removes the oldest published record.
    ///
    /// Returns `None` when the buffer is empty, or when the oldest ticket has
    /// been claimed but its producer has not finished writing. In that case
    /// the record is picked up by a later call, keeping FIFO order.
    pub fn pop(&mut self) -> Option<T> {
        let ring = self.ring;
        let capacity = ring.slots.len();
        let head = ring.head.load(Ordering::Relaxed);
        let slot = &ring.slots[head % capacity];

        if slot.stamp.load(Ordering::Acquire) != head.wrapping_add(1) {
            return None;
        }

        // SAFETY: the acquire load above observed the producer's release
        // store of `head + 1`, so the value is fully written.
        let value = unsafe { (*slot.value.get()).assume_init() };
        slot.stamp
            .store(head.wrapping_add(capacity), Ordering::Release);
        ring.head.store(head.wrapping_add(1), Ordering::Release);
        ring.len.fetch_sub(1, Ordering::Release);
        Some(value)
    }
}

impl<T: Copy + Send> Drop for Consumer<'_, T> {
    fn drop(&mut self) {
        self.ring.consuming.store(false, Ordering::Release);
    }
}

impl<T: Copy + Send> fmt::Debug for Consumer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("ring", self.ring).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn accepts_exactly_capacity_records() {
        let ring = RingBuffer::<u32>::new(4);
        for i in 0..4 {
            ring.push(i).unwrap();
        }
        assert_eq!(ring.len(), 4);
        assert_eq!(
            ring.push(99),
            Err(CapacityExceeded::Queue { capacity: 4 })
        );

        let mut consumer = ring.consumer().unwrap();
        assert_eq!(consumer.pop(), Some(0));
        drop(consumer);

        // One slot freed, one more record fits.
        ring.push(4).unwrap();
        assert_eq!(ring.push(5), Err(CapacityExceeded::Queue { capacity: 4 }));
    }

    #[test]
    fn pops_in_fifo_order_across_laps() {
        let ring = RingBuffer::<u32>::new(3);
        let mut next = 0;
        let mut expected = 0;
        for _ in 0..10 {
            ring.push(next).unwrap();
            next += 1;
            ring.push(next).unwrap();
            next += 1;

            let mut consumer = ring.consumer().unwrap();
            while let Some(value) = consumer.pop() {
                assert_eq!(value, expected);
                expected += 1;
            }
        }
        assert_eq!(expected, 20);
        assert!(ring.is_empty());
    }

    #[test]
    fn capacity_is_raised_to_the_minimum() {
        let ring = RingBuffer::<u8>::new(0);
        assert_eq!(ring.capacity(), MIN_CAPACITY);
    }

    #[test]
    fn only_one_consumer_at_a_time() {
        let ring = RingBuffer::<u8>::new(2);
        let first = ring.consumer();
        assert!(first.is_some());
        assert!(ring.consumer().is_none());
        drop(first);
        assert!(ring.consumer().is_some());
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        const PRODUCERS: u32 = 4;
        const PER_PRODUCER: u32 = 2_000;

        let ring = Arc::new(RingBuffer::<(u32, u32)>::new(64));
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        while ring.push((producer, seq)).is_err() {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let mut last_seen: HashMap<u32, u32> = HashMap::new();
        let mut received = 0;
        while received < PRODUCERS * PER_PRODUCER {
            let mut consumer = ring.consumer().unwrap();
            while let Some((producer, seq)) = consumer.pop() {
                if let Some(previous) = last_seen.insert(producer, seq) {
                    assert_eq!(seq, previous + 1, "producer {producer} reordered");
                } else {
                    assert_eq!(seq, 0);
                }
                received += 1;
            }
            drop(consumer);
            thread::yield_now();
        }

        for handle in handles {
            handle.join().expect("producer panicked");
        }
        assert!(ring.is_empty());
        assert_eq!(last_seen.len(), PRODUCERS as usize);
    }
}
