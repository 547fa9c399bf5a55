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

//! The public-facing SDK of Gatherer.
//!
//! [`Engine`] bundles a worker pool, the execution context tasks are
//! driven with, and an event dispatcher, all built from one
//! [`EngineConfig`]. The owning application loop calls [`Engine::tick`]
//! once per frame to drain the deferred event queue.

#![warn(missing_docs)]

pub mod events;
pub mod logging;

use anyhow::{Context, Result};
use gatherer_control::{ExecutionContext, PoolConfig, PoolStats, WorkerPool};
use gatherer_core::event::{Dispatcher, DispatcherConfig, EventSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use events::{DamageEvent, GameEvent, GameEventKind, KeyPressedEvent};

/// Everything an application usually needs, in one import.
pub mod prelude {
    pub use crate::events::{DamageEvent, GameEvent, GameEventKind, KeyPressedEvent};
    pub use crate::{Engine, EngineConfig};
    pub use gatherer_control::{
        Await, ExecutionContext, PoolConfig, PoolError, PoolStats, Resumption, Step, Task,
        TaskBody, TaskContext, TaskFailure, TaskResult, TaskState,
    };
    pub use gatherer_core::event::{Dispatcher, DispatcherConfig, EventKind, EventSet};
    pub use gatherer_core::sync::{promise, Future, Promise};
    pub use gatherer_core::{event_set, CapacityExceeded};
}

/// Configuration of an [`Engine`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker pool settings.
    pub pool: PoolConfig,
    /// Event dispatcher settings.
    pub events: DispatcherConfig,
}

/// The engine's concurrency services: a worker pool and an event
/// dispatcher over the event set `S`.
///
/// Dropping the engine shuts the pool down.
pub struct Engine<S: EventSet = GameEvent> {
    pool: WorkerPool,
    context: ExecutionContext,
    dispatcher: Arc<Dispatcher<S>>,
    ticks: u64,
}

impl<S: EventSet> Engine<S> {
    /// Starts the worker pool and creates the dispatcher.
    ///
    /// # Errors
    ///
    /// Fails if a worker thread cannot be spawned.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let pool = WorkerPool::new(&config.pool).context("failed to start the worker pool")?;
        let context = ExecutionContext::new(pool.handle());
        let dispatcher = Arc::new(Dispatcher::new(&config.events));

        log::info!("Engine ready.");
        Ok(Self {
            pool,
            context,
            dispatcher,
            ticks: 0,
        })
    }

    /// The execution context to start tasks with.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// The shared dispatcher. Clone the `Arc` to queue events from jobs.
    pub fn dispatcher(&self) -> &Arc<Dispatcher<S>> {
        &self.dispatcher
    }

    /// Mutable access for subscribing listeners.
    ///
    /// Only available during setup: returns `None` once the dispatcher has
    /// been shared through [`dispatcher`](Self::dispatcher).
    pub fn dispatcher_mut(&mut self) -> Option<&mut Dispatcher<S>> {
        Arc::get_mut(&mut self.dispatcher)
    }

    /// Drains the deferred event queue once. Returns the number of events
    /// delivered.
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;
        let delivered = self.dispatcher.update();
        log::trace!("Tick {}: {delivered} events delivered", self.ticks);
        delivered
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// A snapshot of the worker pool's counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Stops the worker pool, discarding queued work. Idempotent.
    pub fn shutdown(&mut self) {
        log::info!("Engine shutting down after {} ticks.", self.ticks);
        self.pool.shutdown();
    }
}
