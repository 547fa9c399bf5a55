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

use gatherer_sdk::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

fn engine() -> Engine {
    gatherer_sdk::logging::init_with_default("warn");
    Engine::new(EngineConfig {
        pool: PoolConfig {
            num_threads: 4,
            ..PoolConfig::default()
        },
        events: DispatcherConfig::default(),
    })
    .expect("engine should start")
}

#[test]
fn test_queued_damage_is_delivered_once_per_tick() {
    let mut engine = engine();
    let hits = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&hits);
    engine
        .dispatcher_mut()
        .unwrap()
        .subscribe(move |e: &DamageEvent| sink.lock().unwrap().push(*e))
        .unwrap();

    engine
        .dispatcher()
        .queue_event(DamageEvent {
            entity: 5,
            amount: 10,
        })
        .unwrap();
    assert!(hits.lock().unwrap().is_empty());

    assert_eq!(engine.tick(), 1);
    assert_eq!(
        *hits.lock().unwrap(),
        vec![DamageEvent {
            entity: 5,
            amount: 10
        }]
    );

    // Nothing new was queued.
    assert_eq!(engine.tick(), 0);
    assert_eq!(hits.lock().unwrap().len(), 1);
}

#[test]
fn test_pool_jobs_queue_events_for_the_next_tick() {
    let mut engine = engine();
    let keys = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&keys);
    engine
        .dispatcher_mut()
        .unwrap()
        .subscribe(move |_: &KeyPressedEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    for keycode in 0..8 {
        let dispatcher = Arc::clone(engine.dispatcher());
        let done_tx = done_tx.clone();
        engine
            .context()
            .submit(move || {
                let queued = dispatcher.queue_event(KeyPressedEvent { keycode }).is_ok();
                done_tx.send(queued).unwrap();
            })
            .unwrap();
    }
    for _ in 0..8 {
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }

    assert_eq!(engine.tick(), 8);
    assert_eq!(keys.load(Ordering::SeqCst), 8);
}

#[test]
fn test_promise_published_by_a_job() {
    let engine = engine();
    let (promise, future) = promise::<u64>();

    engine
        .context()
        .submit(move || promise.set_value(42))
        .unwrap();

    assert_eq!(future.get(), 42);
    assert!(future.poll());
}

#[test]
fn test_task_graph_feeds_the_dispatcher() {
    let mut engine = engine();
    let damage_total = Arc::new(AtomicUsize::new(0));

    let total = Arc::clone(&damage_total);
    engine
        .dispatcher_mut()
        .unwrap()
        .subscribe(move |e: &DamageEvent| {
            total.fetch_add(e.amount as usize, Ordering::SeqCst);
        })
        .unwrap();

    let dispatcher = Arc::clone(engine.dispatcher());
    let physics = Task::from_fn("physics", move |_| {
        dispatcher.queue_event(DamageEvent {
            entity: 1,
            amount: 3,
        })?;
        Ok(3)
    });
    let update = Task::after("update", Await::on_pool(physics), |_, hits: TaskResult<i32>| {
        Ok(hits? * 2)
    });

    assert_eq!(update.run(engine.context()), Ok(6));
    engine.tick();
    assert_eq!(damage_total.load(Ordering::SeqCst), 3);
}

#[test]
fn test_full_queue_is_reported_to_the_producer() {
    let engine: Engine = Engine::new(EngineConfig {
        pool: PoolConfig {
            num_threads: 1,
            ..PoolConfig::default()
        },
        events: DispatcherConfig {
            queue_capacity: 2,
            ..DispatcherConfig::default()
        },
    })
    .unwrap();

    let dispatcher = engine.dispatcher();
    dispatcher.queue_event(KeyPressedEvent { keycode: 1 }).unwrap();
    dispatcher.queue_event(KeyPressedEvent { keycode: 2 }).unwrap();
    assert_eq!(
        dispatcher.queue_event(KeyPressedEvent { keycode: 3 }),
        Err(CapacityExceeded::Queue { capacity: 2 })
    );
}
