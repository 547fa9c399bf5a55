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

//! Suspendable tasks composed through explicit awaits.
//!
//! A [`Task`] wraps a [`TaskBody`], a hand-written state machine stepped by
//! the runtime. A body suspends by returning [`Step::Await`] with another
//! task; it is stepped again once that dependency completes, and reads the
//! dependency's result with [`TaskContext::awaited`].
//!
//! The [`Resumption`] chosen at the await point decides where that happens:
//!
//! - [`Resumption::Inline`]: the dependency runs immediately on the current
//!   thread and the awaiter resumes right after it, on the same thread.
//! - [`Resumption::Pool`]: the dependency is submitted to the worker pool,
//!   and the awaiter is submitted again once the dependency completes. The
//!   thread that started the chain returns immediately.
//!
//! Failures travel as values. When a dependency fails the runtime logs it
//! and resumes the awaiter anyway; the body decides whether to carry on or
//! to propagate the [`TaskFailure`] with `?`.

mod handle;
mod scheduler;
mod step;

pub use self::handle::Task;
pub use self::step::{Await, Resumption, Step, TaskBody};

use self::scheduler::ErasedResult;
use crate::context::ExecutionContext;
use crate::error::TaskFailure;

/// Observable lifecycle state of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskState {
    /// Built but not started or awaited yet.
    Created = 0,
    /// A step of the body is executing.
    Running = 1,
    /// Waiting for an awaited dependency to complete.
    Suspended = 2,
    /// Finished with a value or a failure. Terminal.
    Completed = 3,
}

impl TaskState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Created,
            1 => TaskState::Running,
            2 => TaskState::Suspended,
            _ => TaskState::Completed,
        }
    }
}

/// What a [`TaskBody`] can reach while it is being stepped.
pub struct TaskContext<'a> {
    name: &'a str,
    execution: &'a ExecutionContext,
    awaited: &'a mut Option<ErasedResult>,
}

impl TaskContext<'_> {
    /// Name of the running task.
    pub fn name(&self) -> &str {
        self.name
    }

    /// The execution context the task is driven with.
    pub fn execution(&self) -> &ExecutionContext {
        self.execution
    }

    /// Takes the result of the dependency this task was last suspended on.
    ///
    /// # Errors
    ///
    /// Returns the dependency's failure. Also fails when no result is
    /// pending (never awaited, or already taken) or when `U` is not the
    /// dependency's output type.
    pub fn awaited<U: 'static>(&mut self) -> Result<U, TaskFailure> {
        match self.awaited.take() {
            Some(Ok(value)) => value.downcast::<U>().map(|value| *value).map_err(|_| {
                TaskFailure::new(
                    self.name,
                    format!(
                        "awaited result is not a {}",
                        std::any::type_name::<U>()
                    ),
                )
            }),
            Some(Err(failure)) => Err(failure),
            None => Err(TaskFailure::new(self.name, "no awaited result is pending")),
        }
    }

    /// `true` if a dependency result is waiting to be taken.
    pub fn has_awaited(&self) -> bool {
        self.awaited.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_its_tag() {
        for state in [
            TaskState::Created,
            TaskState::Running,
            TaskState::Suspended,
            TaskState::Completed,
        ] {
            assert_eq!(TaskState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn awaited_reports_misuse_as_failure() {
        let pool = crate::WorkerPool::new(&crate::PoolConfig {
            num_threads: 1,
            ..Default::default()
        })
        .unwrap();
        let execution = ExecutionContext::new(pool.handle());
        let mut pending: Option<ErasedResult> = Some(Ok(Box::new(5u8)));
        let mut cx = TaskContext {
            name: "sampler",
            execution: &execution,
            awaited: &mut pending,
        };

        assert!(cx.has_awaited());
        let wrong: Result<String, _> = cx.awaited();
        assert!(wrong.unwrap_err().message.contains("String"));
        assert_eq!(
            cx.awaited::<u8>().unwrap_err().message,
            "no awaited result is pending"
        );
    }
}
