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

use super::scheduler::{self, TaskCore, TaskStatus};
use super::step::{AfterBody, Await, FnBody, TaskBody};
use super::{TaskContext, TaskState};
use crate::context::ExecutionContext;
use crate::error::{TaskFailure, TaskResult};
use crossbeam_utils::Backoff;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Where a root task leaves its result for the handle to pick up.
struct ResultSlot<T> {
    value: Mutex<Option<TaskResult<T>>>,
}

impl<T> ResultSlot<T> {
    fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    fn put(&self, result: TaskResult<T>) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
    }

    fn take(&self) -> Option<TaskResult<T>> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// An owned handle to a suspendable computation producing a `T`.
///
/// A task is either started with [`start`](Task::start) (making it a root
/// whose result is read back through this handle) or awaited by another
/// task through [`Await`], which moves ownership of the computation to the
/// awaiter.
pub struct Task<T> {
    name: String,
    core: Option<Box<TaskCore>>,
    status: Arc<TaskStatus>,
    result: Arc<ResultSlot<T>>,
}

impl<T: Send + 'static> Task<T> {
    /// Creates a task from a body. Nothing runs until it is started or awaited.
    pub fn new<B>(name: impl Into<String>, body: B) -> Self
    where
        B: TaskBody<Output = T>,
    {
        let name = name.into();
        let status = Arc::new(TaskStatus::new());
        let core = TaskCore::new(name.clone(), body, Arc::clone(&status));
        Self {
            name,
            core: Some(Box::new(core)),
            status,
            result: Arc::new(ResultSlot::new()),
        }
    }

    /// Creates a leaf task that runs `f` once and completes with its result.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(&mut TaskContext<'_>) -> anyhow::Result<T> + Send + 'static,
    {
        Self::new(name, FnBody::new(f))
    }

    /// Creates a task that awaits `dependency`, then completes with
    /// `then(cx, dependency_result)`.
    pub fn after<U, F>(name: impl Into<String>, dependency: Await, then: F) -> Self
    where
        U: Send + 'static,
        F: FnOnce(&mut TaskContext<'_>, TaskResult<U>) -> anyhow::Result<T> + Send + 'static,
    {
        Self::new(name, AfterBody::new(dependency, then))
    }

    /// Drives the task on the calling thread until it completes or is
    /// handed over to the pool.
    ///
    /// Starting a task twice is a no-op apart from a warning.
    pub fn start(&mut self, execution: &ExecutionContext) {
        let Some(mut core) = self.core.take() else {
            log::warn!("Task '{}' was already started.", self.name);
            return;
        };

        let slot = Arc::clone(&self.result);
        let name = self.name.clone();
        core.sink = Some(Box::new(move |result| {
            let typed = result.and_then(|value| {
                value
                    .downcast::<T>()
                    .map(|value| *value)
                    .map_err(|_| TaskFailure::new(name, "task produced an unexpected output type"))
            });
            slot.put(typed);
        }));

        scheduler::resume(core, execution);
    }

    /// Blocks (spinning, then yielding) until the task completes and
    /// returns its result.
    ///
    /// # Errors
    ///
    /// Returns the task's failure, or a failure if the task was never
    /// started or its result was already taken.
    pub fn wait(&mut self) -> TaskResult<T> {
        if self.core.is_some() {
            return Err(TaskFailure::new(self.name.as_str(), "task was never started"));
        }

        let backoff = Backoff::new();
        while !self.is_done() {
            backoff.snooze();
        }

        self.take_result().unwrap_or_else(|| {
            Err(TaskFailure::new(
                self.name.as_str(),
                "task result was already taken",
            ))
        })
    }

    /// Starts the task and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns the task's failure.
    pub fn run(mut self, execution: &ExecutionContext) -> TaskResult<T> {
        self.start(execution);
        self.wait()
    }

    /// Takes the result of a completed task. `None` until then, and after
    /// the result has been taken once.
    pub fn take_result(&mut self) -> Option<TaskResult<T>> {
        if self.is_done() {
            self.result.take()
        } else {
            None
        }
    }
}

impl<T> Task<T> {
    /// The task's name, used in logs and failures.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.status.get()
    }

    /// `true` once the task reached [`TaskState::Completed`].
    pub fn is_done(&self) -> bool {
        self.state() == TaskState::Completed
    }

    pub(crate) fn into_core(self) -> (String, Option<Box<TaskCore>>) {
        (self.name, self.core)
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
