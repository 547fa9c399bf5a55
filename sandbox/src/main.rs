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

use anyhow::Result;
use gatherer_sdk::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TICKS: u64 = 10;
const TICK_BUDGET: Duration = Duration::from_millis(16);

/// Number of entities the fake physics step damages each tick.
const ENTITIES: i32 = 3;

fn subscribe_listeners(engine: &mut Engine) -> Result<()> {
    let dispatcher = engine
        .dispatcher_mut()
        .ok_or_else(|| anyhow::anyhow!("dispatcher already shared before setup"))?;

    dispatcher.subscribe(|e: &KeyPressedEvent| {
        log::info!("Key pressed: {}", e.keycode);
    })?;
    dispatcher.subscribe(|e: &DamageEvent| {
        log::info!("Entity {} took {} damage", e.entity, e.amount);
    })?;
    Ok(())
}

/// input -> physics -> ui -> game update, one frame's worth of systems.
///
/// Physics and the game update run on the pool; the ui step resumes inline
/// right after physics.
fn frame_graph(frame: u64, dispatcher: &Arc<Dispatcher<GameEvent>>) -> Task<u64> {
    let input_events = Arc::clone(dispatcher);
    let input = Task::from_fn("input", move |_| {
        // Every third frame the player presses space.
        if frame % 3 == 0 {
            input_events.queue_event(KeyPressedEvent { keycode: 32 })?;
        }
        Ok(frame % 3 == 0)
    });

    let physics_events = Arc::clone(dispatcher);
    let physics = Task::after(
        "physics",
        Await::on_pool(input),
        move |_, jumped: TaskResult<bool>| {
            let jumped = jumped?;
            let mut hits: u32 = 0;
            for entity in 0..ENTITIES {
                let amount = if jumped { 10 } else { 1 };
                match physics_events.queue_event(DamageEvent { entity, amount }) {
                    Ok(()) => hits += 1,
                    Err(e) => log::warn!("physics dropped a hit: {e}"),
                }
            }
            Ok(hits)
        },
    );

    let ui = Task::after("ui", Await::inline(physics), |_, hits: TaskResult<u32>| {
        let hits = hits?;
        log::debug!("ui: {hits} hit markers");
        Ok(hits)
    });

    Task::after(
        "game-update",
        Await::on_pool(ui),
        move |cx, hits: TaskResult<u32>| {
            // A failed ui frame is logged and the update still advances.
            let hits = hits.unwrap_or(0);
            log::debug!("{} finished frame {frame} on {:?}", cx.name(), thread::current().name());
            Ok(frame * 100 + u64::from(hits))
        },
    )
}

fn main() -> Result<()> {
    gatherer_sdk::logging::init();

    let mut engine: Engine = Engine::new(EngineConfig::default())?;
    subscribe_listeners(&mut engine)?;

    // A job publishes a value other threads read without a lock.
    let (promise, answer) = promise::<u32>();
    engine.context().submit(move || promise.set_value(42))?;

    // Jobs on the pool produce events concurrently for the first tick.
    for keycode in 0..4 {
        let dispatcher = Arc::clone(engine.dispatcher());
        engine.context().submit(move || {
            if let Err(e) = dispatcher.queue_event(KeyPressedEvent { keycode }) {
                log::warn!("job dropped key {keycode}: {e}");
            }
        })?;
    }

    for frame in 0..TICKS {
        let started = Instant::now();

        match frame_graph(frame, engine.dispatcher()).run(engine.context()) {
            Ok(summary) => log::debug!("frame {frame}: graph result {summary}"),
            Err(failure) => log::error!("frame {frame}: {failure}"),
        }

        let delivered = engine.tick();
        log::info!("Tick {frame}: {delivered} events delivered");

        if let Some(rest) = TICK_BUDGET.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    log::info!("Promised value: {}", answer.get());

    let stats = engine.pool_stats();
    log::info!(
        "Pool: {} workers, {} submitted, {} completed, {} panicked, success rate {:.0}%",
        stats.workers,
        stats.submitted,
        stats.completed,
        stats.panicked,
        stats.success_rate() * 100.0
    );

    engine.shutdown();
    Ok(())
}
