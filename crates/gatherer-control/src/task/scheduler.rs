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

//! The type-erased task state machine and the trampoline that drives it.
//!
//! A suspended task is owned by the dependency it awaits, stored as that
//! dependency's continuation. Completing a task therefore hands its awaiter
//! back to whoever completed it, who either keeps looping (inline) or
//! submits the awaiter to the pool.

use super::step::{Await, Resumption, Step, TaskBody};
use super::{TaskContext, TaskState};
use crate::context::ExecutionContext;
use crate::error::{TaskFailure, TaskResult};
use gatherer_core::utils::panic::panic_message;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// A task result with its success value boxed.
pub(crate) type ErasedResult = TaskResult<Box<dyn Any + Send>>;

/// Receives the result of a root task, i.e. one nobody awaits.
pub(crate) type Sink = Box<dyn FnOnce(ErasedResult) + Send>;

/// Shared, observable lifecycle state of one task.
#[derive(Debug)]
pub(crate) struct TaskStatus(AtomicU8);

impl TaskStatus {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(TaskState::Created as u8))
    }

    pub(crate) fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: TaskState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// [`TaskBody`] with its output type erased.
trait ErasedBody: Send {
    fn step_erased(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step<Box<dyn Any + Send>>>;
}

impl<B: TaskBody> ErasedBody for B {
    fn step_erased(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step<Box<dyn Any + Send>>> {
        Ok(match TaskBody::step(self, cx)? {
            Step::Complete(value) => Step::Complete(Box::new(value)),
            Step::Await(dependency) => Step::Await(dependency),
        })
    }
}

/// The task to resume when another one completes.
struct Continuation {
    task: Box<TaskCore>,
    resumption: Resumption,
}

enum Outcome {
    Done(ErasedResult),
    Suspend(Await),
}

/// Everything a task needs to run, independent of its output type.
pub(crate) struct TaskCore {
    name: String,
    body: Box<dyn ErasedBody>,
    status: Arc<TaskStatus>,
    continuation: Option<Continuation>,
    awaited: Option<ErasedResult>,
    pub(crate) sink: Option<Sink>,
}

impl TaskCore {
    pub(crate) fn new<B: TaskBody>(name: String, body: B, status: Arc<TaskStatus>) -> Self {
        Self {
            name,
            body: Box::new(body),
            status,
            continuation: None,
            awaited: None,
            sink: None,
        }
    }

    /// Runs the body once. Errors and panics become a failed result here,
    /// so nothing unwinds into the scheduler.
    fn step(&mut self, execution: &ExecutionContext) -> Outcome {
        self.status.set(TaskState::Running);

        let TaskCore {
            name,
            body,
            awaited,
            ..
        } = self;
        let mut cx = TaskContext {
            name: name.as_str(),
            execution,
            awaited,
        };

        let failure = match panic::catch_unwind(AssertUnwindSafe(|| body.step_erased(&mut cx))) {
            Ok(Ok(Step::Complete(value))) => return Outcome::Done(Ok(value)),
            Ok(Ok(Step::Await(dependency))) => return Outcome::Suspend(dependency),
            Ok(Err(err)) => TaskFailure::new(name.as_str(), format!("{err:#}")),
            Err(payload) => TaskFailure::new(
                name.as_str(),
                format!("panicked: {}", panic_message(payload.as_ref())),
            ),
        };

        log::error!("{failure}");
        Outcome::Done(Err(failure))
    }
}

/// Drives `core` and everything it awaits or resumes, without recursing.
///
/// Returns once the chain either completes a root task or has been handed
/// to the pool.
pub(crate) fn resume(core: Box<TaskCore>, execution: &ExecutionContext) {
    drive(core, None, execution);
}

/// Like [`resume`], but when `settled` is given `core` is completed with it
/// instead of running its body.
fn drive(mut core: Box<TaskCore>, mut settled: Option<ErasedResult>, execution: &ExecutionContext) {
    loop {
        let outcome = match settled.take() {
            Some(result) => Outcome::Done(result),
            None => core.step(execution),
        };
        match outcome {
            Outcome::Suspend(request) => {
                let Await {
                    name,
                    dependency,
                    resumption,
                } = request;

                let Some(mut dependency) = dependency else {
                    let failure = TaskFailure::new(name, "task was already started and cannot be awaited");
                    log::warn!("Task '{}' awaited a started task: {failure}", core.name);
                    core.awaited = Some(Err(failure));
                    continue;
                };

                log::trace!("Task '{}' suspended on '{}' ({resumption:?}).", core.name, dependency.name);
                core.status.set(TaskState::Suspended);
                dependency.continuation = Some(Continuation {
                    task: core,
                    resumption,
                });

                match resumption {
                    Resumption::Inline => core = dependency,
                    Resumption::Pool => return schedule(dependency, execution),
                }
            }
            Outcome::Done(result) => {
                let Some(Continuation {
                    task: mut next,
                    resumption,
                }) = core.continuation.take()
                else {
                    if let Some(sink) = core.sink.take() {
                        sink(result);
                    }
                    core.status.set(TaskState::Completed);
                    return;
                };

                if let Err(failure) = &result {
                    log::warn!(
                        "Task '{}' resumes after its dependency failed: {failure}",
                        next.name
                    );
                }
                next.awaited = Some(result);
                core.status.set(TaskState::Completed);

                match resumption {
                    Resumption::Inline => core = next,
                    Resumption::Pool => return schedule(next, execution),
                }
            }
        }
    }
}

/// A task handed to the pool. If the pool drops it unexecuted, the task is
/// failed instead so its awaiters and its root sink still complete.
struct Scheduled {
    core: Option<Box<TaskCore>>,
    execution: ExecutionContext,
}

impl Scheduled {
    fn run(mut self) {
        if let Some(core) = self.core.take() {
            resume(core, &self.execution);
        }
    }
}

impl Drop for Scheduled {
    fn drop(&mut self) {
        let Some(core) = self.core.take() else {
            return;
        };
        let failure = TaskFailure::new(core.name.as_str(), "discarded at pool shutdown");
        log::warn!("{failure}");
        drive(core, Some(Err(failure)), &self.execution);
    }
}

fn schedule(core: Box<TaskCore>, execution: &ExecutionContext) {
    let name = core.name.clone();
    let job = Scheduled {
        core: Some(core),
        execution: execution.clone(),
    };
    execution.schedule(&name, Box::new(move || job.run()));
}
