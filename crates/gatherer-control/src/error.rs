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

//! Error types of the scheduling layer.

use thiserror::Error;

/// An error reported by the [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has committed its stop flag and accepts no more work.
    #[error("worker pool is shut down")]
    ShutDown,
    /// The operating system refused to spawn a worker thread.
    #[error("failed to spawn worker thread {index}")]
    Spawn {
        /// Index of the worker that could not be spawned.
        index: usize,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// The failure variant of a task's terminal state.
///
/// Every fault inside a task body, whether a returned error or a panic, is
/// converted into this value at the task boundary and travels up the await
/// chain as data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task '{task}' failed: {message}")]
pub struct TaskFailure {
    /// Name of the task that failed.
    pub task: String,
    /// Human-readable diagnostic.
    pub message: String,
}

impl TaskFailure {
    /// Creates a failure for `task`.
    pub fn new(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            message: message.into(),
        }
    }
}

/// The terminal state of a task: `success(value) | failure(message)`.
pub type TaskResult<T> = Result<T, TaskFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_names_the_task() {
        let failure = TaskFailure::new("physics", "solver diverged");
        assert_eq!(failure.to_string(), "task 'physics' failed: solver diverged");
    }

    #[test]
    fn failure_chains_through_anyhow() {
        let inner = TaskFailure::new("input", "device lost");
        let err = anyhow::Error::new(inner).context("while polling");
        assert_eq!(
            format!("{err:#}"),
            "while polling: task 'input' failed: device lost"
        );
    }
}
