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

use super::kind::{EventKind, EventSet};
use super::listener::ListenerTable;
use super::ring::RingBuffer;
use crate::error::CapacityExceeded;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default per-kind listener limit.
pub const DEFAULT_MAX_LISTENERS: usize = 8;

/// Default number of events the deferred queue holds.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Configuration for a [`Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum number of listeners per event kind.
    pub max_listeners_per_kind: usize,
    /// Number of events the deferred queue holds before `queue_event` fails.
    /// Values below [`MIN_CAPACITY`](super::ring::MIN_CAPACITY) are raised.
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_listeners_per_kind: DEFAULT_MAX_LISTENERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Typed publish/subscribe over the event set `S`.
///
/// Two delivery paths share one listener table:
/// - [`dispatch`](Self::dispatch) fans out synchronously on the calling thread;
/// - [`queue_event`](Self::queue_event) stores the event in a bounded
///   lock-free ring buffer, and [`update`](Self::update) later drains it on
///   the consumer's thread, once per tick.
///
/// Subscribing needs `&mut self`, so the table is complete before the
/// dispatcher is shared. Producing and draining only need `&self`.
pub struct Dispatcher<S: EventSet> {
    listeners: ListenerTable<S>,
    queue: RingBuffer<S>,
}

impl<S: EventSet> Dispatcher<S> {
    /// Creates a dispatcher sized by `config`.
    pub fn new(config: &DispatcherConfig) -> Self {
        let queue = RingBuffer::new(config.queue_capacity);
        if queue.capacity() != config.queue_capacity {
            log::warn!(
                "Dispatcher: queue capacity {} raised to {}",
                config.queue_capacity,
                queue.capacity()
            );
        }
        log::info!(
            "Dispatcher initialized: {} kinds, {} listeners/kind, queue of {} x {} bytes",
            S::KIND_COUNT,
            config.max_listeners_per_kind,
            queue.capacity(),
            std::mem::size_of::<S>()
        );

        Self {
            listeners: ListenerTable::new(config.max_listeners_per_kind),
            queue,
        }
    }

    /// Registers `listener` for events of kind `K`.
    ///
    /// Listeners run in registration order. There is no unsubscribe.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityExceeded::Listeners`] once `K` has reached the
    /// configured limit.
    pub fn subscribe<K, F>(&mut self, listener: F) -> Result<(), CapacityExceeded>
    where
        K: EventKind<S>,
        F: Fn(&K) + Send + Sync + 'static,
    {
        match self.listeners.push(listener) {
            Ok(()) => {
                log::debug!(
                    "Dispatcher: listener #{} subscribed to {}",
                    self.listeners.len_of::<K>(),
                    K::NAME
                );
                Ok(())
            }
            Err(e) => {
                log::warn!("Dispatcher: {e}");
                Err(e)
            }
        }
    }

    /// Delivers `event` to its listeners immediately, on the calling thread.
    pub fn dispatch(&self, event: impl Into<S>) {
        self.listeners.notify(&event.into());
    }

    /// Queues `event` for delivery on the next [`update`](Self::update).
    ///
    /// Safe to call from any number of threads concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityExceeded::Queue`] when the queue is full. The event
    /// is not stored; the caller decides whether to retry or drop it.
    pub fn queue_event(&self, event: impl Into<S>) -> Result<(), CapacityExceeded> {
        let event = event.into();
        self.queue.push(event).inspect_err(|e| {
            log::warn!("Dispatcher: {:?} rejected: {e}", event.kind());
        })
    }

    /// Drains the queue, delivering published events to their listeners in
    /// FIFO order. Returns the number of events delivered.
    ///
    /// One update delivers at most the events queued when it started. Events
    /// queued meanwhile, including by the listeners themselves, are left for
    /// the next update.
    ///
    /// Only one update may run at a time. A concurrent or re-entrant call
    /// (e.g. from inside a listener) is refused and returns 0.
    pub fn update(&self) -> usize {
        let Some(mut consumer) = self.queue.consumer() else {
            log::error!("Dispatcher: update() refused, another update is draining the queue");
            return 0;
        };

        let batch = self.queue.len();
        let mut delivered = 0;
        while delivered < batch {
            let Some(event) = consumer.pop() else { break };
            self.listeners.notify(&event);
            delivered += 1;
        }

        if delivered > 0 {
            log::trace!("Dispatcher: delivered {delivered} queued events");
        }
        delivered
    }

    /// Number of events waiting for the next update.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Capacity of the deferred queue.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Number of listeners registered for kind `K`.
    pub fn listener_count<K: EventKind<S>>(&self) -> usize {
        self.listeners.len_of::<K>()
    }
}

impl<S: EventSet> Default for Dispatcher<S> {
    fn default() -> Self {
        Self::new(&DispatcherConfig::default())
    }
}

impl<S: EventSet> fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listeners)
            .field("queue", &self.queue)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Hit {
        entity: i32,
        amount: i32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Key {
        code: i32,
    }

    crate::event_set! {
        enum TestEvent: TestEventKind {
            Hit(Hit),
            Key(Key),
        }
    }

    fn recorder<K: EventKind<TestEvent> + Send>(
        dispatcher: &mut Dispatcher<TestEvent>,
    ) -> Arc<Mutex<Vec<K>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatcher
            .subscribe(move |event: &K| sink.lock().unwrap().push(*event))
            .unwrap();
        seen
    }

    #[test]
    fn dispatch_is_immediate() {
        let mut dispatcher = Dispatcher::<TestEvent>::default();
        let hits = recorder::<Hit>(&mut dispatcher);

        dispatcher.dispatch(Hit {
            entity: 1,
            amount: 2,
        });
        assert_eq!(
            *hits.lock().unwrap(),
            vec![Hit {
                entity: 1,
                amount: 2
            }]
        );
        assert_eq!(dispatcher.queued_len(), 0);
    }

    #[test]
    fn queued_events_wait_for_update() {
        let mut dispatcher = Dispatcher::<TestEvent>::default();
        let hits = recorder::<Hit>(&mut dispatcher);

        dispatcher
            .queue_event(Hit {
                entity: 5,
                amount: 10,
            })
            .unwrap();
        assert!(hits.lock().unwrap().is_empty());
        assert_eq!(dispatcher.queued_len(), 1);

        assert_eq!(dispatcher.update(), 1);
        assert_eq!(
            *hits.lock().unwrap(),
            vec![Hit {
                entity: 5,
                amount: 10
            }]
        );

        assert_eq!(dispatcher.update(), 0);
        assert_eq!(hits.lock().unwrap().len(), 1);
    }

    #[test]
    fn update_preserves_fifo_across_kinds() {
        let mut dispatcher = Dispatcher::<TestEvent>::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let order = Arc::clone(&order);
            dispatcher
                .subscribe(move |hit: &Hit| order.lock().unwrap().push(hit.entity))
                .unwrap();
        }
        {
            let order = Arc::clone(&order);
            dispatcher
                .subscribe(move |key: &Key| order.lock().unwrap().push(-key.code))
                .unwrap();
        }

        dispatcher.queue_event(Hit { entity: 1, amount: 0 }).unwrap();
        dispatcher.queue_event(Key { code: 2 }).unwrap();
        dispatcher.queue_event(Hit { entity: 3, amount: 0 }).unwrap();

        assert_eq!(dispatcher.update(), 3);
        assert_eq!(*order.lock().unwrap(), vec![1, -2, 3]);
    }

    #[test]
    fn full_queue_is_reported() {
        let dispatcher = Dispatcher::<TestEvent>::new(&DispatcherConfig {
            max_listeners_per_kind: 1,
            queue_capacity: 2,
        });
        dispatcher.queue_event(Key { code: 1 }).unwrap();
        dispatcher.queue_event(Key { code: 2 }).unwrap();
        assert_eq!(
            dispatcher.queue_event(Key { code: 3 }),
            Err(CapacityExceeded::Queue { capacity: 2 })
        );

        assert_eq!(dispatcher.update(), 2);
        dispatcher.queue_event(Key { code: 4 }).unwrap();
    }

    #[test]
    fn subscribe_fails_past_the_limit() {
        let mut dispatcher = Dispatcher::<TestEvent>::new(&DispatcherConfig {
            max_listeners_per_kind: 1,
            queue_capacity: 4,
        });
        dispatcher.subscribe(|_: &Key| {}).unwrap();
        assert!(matches!(
            dispatcher.subscribe(|_: &Key| {}),
            Err(CapacityExceeded::Listeners { kind: "Key", limit: 1 })
        ));
        assert_eq!(dispatcher.listener_count::<Key>(), 1);
        assert_eq!(dispatcher.listener_count::<Hit>(), 0);
    }

    #[test]
    fn reentrant_update_is_refused() {
        let mut dispatcher = Dispatcher::<TestEvent>::default();
        let inner_result = Arc::new(AtomicUsize::new(usize::MAX));
        let dispatcher_slot: Arc<Mutex<Option<Arc<Dispatcher<TestEvent>>>>> =
            Arc::new(Mutex::new(None));
        {
            let inner_result = Arc::clone(&inner_result);
            let dispatcher_slot = Arc::clone(&dispatcher_slot);
            dispatcher
                .subscribe(move |_: &Key| {
                    let slot = dispatcher_slot.lock().unwrap();
                    if let Some(dispatcher) = slot.as_ref() {
                        inner_result.store(dispatcher.update(), Ordering::SeqCst);
                    }
                })
                .unwrap();
        }

        let dispatcher = Arc::new(dispatcher);
        *dispatcher_slot.lock().unwrap() = Some(Arc::clone(&dispatcher));

        dispatcher.queue_event(Key { code: 1 }).unwrap();
        assert_eq!(dispatcher.update(), 1);
        assert_eq!(inner_result.load(Ordering::SeqCst), 0);

        // Break the reference cycle.
        dispatcher_slot.lock().unwrap().take();
    }

    #[test]
    fn events_queued_by_listeners_wait_for_the_next_update() {
        let mut dispatcher = Dispatcher::<TestEvent>::default();
        let dispatcher_slot: Arc<Mutex<Option<Arc<Dispatcher<TestEvent>>>>> =
            Arc::new(Mutex::new(None));
        {
            let dispatcher_slot = Arc::clone(&dispatcher_slot);
            dispatcher
                .subscribe(move |key: &Key| {
                    let slot = dispatcher_slot.lock().unwrap();
                    if let Some(dispatcher) = slot.as_ref() {
                        dispatcher.queue_event(Key { code: key.code + 1 }).unwrap();
                    }
                })
                .unwrap();
        }
        let seen = recorder::<Key>(&mut dispatcher);

        let dispatcher = Arc::new(dispatcher);
        *dispatcher_slot.lock().unwrap() = Some(Arc::clone(&dispatcher));

        dispatcher.queue_event(Key { code: 1 }).unwrap();
        assert_eq!(dispatcher.update(), 1);
        assert_eq!(dispatcher.queued_len(), 1);
        assert_eq!(dispatcher.update(), 1);
        assert_eq!(dispatcher.queued_len(), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Key { code: 1 }, Key { code: 2 }]
        );

        // Break the reference cycle.
        dispatcher_slot.lock().unwrap().take();
    }

    #[test]
    fn producers_on_many_threads_are_all_delivered() {
        const THREADS: i32 = 4;
        const PER_THREAD: i32 = 8;

        let mut dispatcher = Dispatcher::<TestEvent>::default();
        let hits = recorder::<Hit>(&mut dispatcher);
        let dispatcher = Arc::new(dispatcher);

        let handles: Vec<_> = (0..THREADS)
            .map(|entity| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || {
                    for amount in 0..PER_THREAD {
                        dispatcher.queue_event(Hit { entity, amount }).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(dispatcher.update(), (THREADS * PER_THREAD) as usize);
        let hits = hits.lock().unwrap();
        for entity in 0..THREADS {
            let amounts: Vec<i32> = hits
                .iter()
                .filter(|hit| hit.entity == entity)
                .map(|hit| hit.amount)
                .collect();
            assert_eq!(amounts, (0..PER_THREAD).collect::<Vec<_>>());
        }
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let config: DispatcherConfig = serde_json::from_str(r#"{"queue_capacity": 16}"#).unwrap();
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.max_listeners_per_kind, DEFAULT_MAX_LISTENERS);
    }
}
