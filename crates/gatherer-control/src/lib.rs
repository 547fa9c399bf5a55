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

//! # Gatherer Control
//!
//! The scheduling half of the engine: a fixed-size [`WorkerPool`] draining a
//! FIFO of work items, and [`Task`], an explicit suspend/resume state
//! machine that composes with other tasks either inline on the caller's
//! stack or by handing continuations to the pool.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod pool;
pub mod stats;
pub mod task;

pub use context::ExecutionContext;
pub use error::{PoolError, TaskFailure, TaskResult};
pub use pool::{PoolConfig, PoolHandle, WorkItem, WorkerPool};
pub use stats::PoolStats;
pub use task::{Await, Resumption, Step, Task, TaskBody, TaskContext, TaskState};
