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

//! The execution context handed to tasks and jobs.

use crate::error::PoolError;
use crate::pool::{PoolHandle, WorkItem};

/// Gives running work access to the engine's worker pool.
///
/// Cloning is cheap; every clone submits to the same pool.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pool: PoolHandle,
}

impl ExecutionContext {
    /// Wraps a pool handle.
    pub fn new(pool: PoolHandle) -> Self {
        Self { pool }
    }

    /// The pool this context submits to.
    pub fn pool(&self) -> &PoolHandle {
        &self.pool
    }

    /// Enqueues `work` on the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ShutDown`] once the pool is shutting down.
    pub fn submit<F>(&self, work: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.submit(work)
    }

    /// Schedules a task continuation on the pool, running it inline if the
    /// pool refuses it. A continuation is never silently lost.
    pub(crate) fn schedule(&self, what: &str, work: WorkItem) {
        if let Err(work) = self.pool.try_submit(work) {
            log::warn!("Pool refused continuation of task '{what}', resuming it inline.");
            work();
        }
    }
}
