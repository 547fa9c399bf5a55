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

//! Task bodies and the values they return from each step.

use super::handle::Task;
use super::scheduler::TaskCore;
use super::TaskContext;
use crate::error::TaskResult;
use std::fmt;
use std::marker::PhantomData;

/// The user-supplied logic of a [`Task`].
///
/// A body is a hand-written state machine. The runtime calls [`step`] when
/// the task starts and again each time a dependency it awaited completes;
/// the body advances its own state and either finishes or awaits another
/// task.
///
/// [`step`]: TaskBody::step
pub trait TaskBody: Send + 'static {
    /// The success value of the task.
    type Output: Send + 'static;

    /// Advances the body. An `Err` or a panic completes the task with a
    /// [`TaskFailure`](crate::TaskFailure).
    fn step(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step<Self::Output>>;
}

/// What a body wants after a step.
pub enum Step<T> {
    /// The task is finished with this value.
    Complete(T),
    /// Suspend until the dependency completes, then step again.
    Await(Await),
}

impl<T> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Complete(_) => f.write_str("Complete(..)"),
            Step::Await(a) => f.debug_tuple("Await").field(a).finish(),
        }
    }
}

/// Where a suspended task resumes once its dependency completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resumption {
    /// On the thread that drove the dependency to completion, immediately.
    Inline,
    /// On a pool worker, via a submitted work item.
    Pool,
}

/// A request to suspend the current task on a dependency.
pub struct Await {
    pub(crate) name: String,
    pub(crate) dependency: Option<Box<TaskCore>>,
    pub(crate) resumption: Resumption,
}

impl Await {
    /// Runs `task` right away on the current thread and resumes the awaiter
    /// inline when it completes.
    pub fn inline<U: Send + 'static>(task: Task<U>) -> Self {
        Self::new(task, Resumption::Inline)
    }

    /// Starts `task` on a pool worker and resumes the awaiter on a pool
    /// worker when it completes.
    pub fn on_pool<U: Send + 'static>(task: Task<U>) -> Self {
        Self::new(task, Resumption::Pool)
    }

    /// Awaits `task` with an explicit resumption strategy.
    pub fn new<U: Send + 'static>(task: Task<U>, resumption: Resumption) -> Self {
        let (name, dependency) = task.into_core();
        Self {
            name,
            dependency,
            resumption,
        }
    }

    /// Name of the awaited task.
    pub fn dependency_name(&self) -> &str {
        &self.name
    }

    /// The resumption strategy.
    pub fn resumption(&self) -> Resumption {
        self.resumption
    }
}

impl fmt::Debug for Await {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Await")
            .field("dependency", &self.name)
            .field("resumption", &self.resumption)
            .finish()
    }
}

/// A leaf body built from a closure: it never awaits.
pub(crate) struct FnBody<F, T> {
    f: Option<F>,
    _output: PhantomData<fn() -> T>,
}

impl<F, T> FnBody<F, T> {
    pub(crate) fn new(f: F) -> Self {
        Self {
            f: Some(f),
            _output: PhantomData,
        }
    }
}

impl<F, T> TaskBody for FnBody<F, T>
where
    F: FnOnce(&mut TaskContext<'_>) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn step(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step<T>> {
        let Some(f) = self.f.take() else {
            anyhow::bail!("leaf task stepped after completion");
        };
        f(cx).map(Step::Complete)
    }
}

/// Awaits one dependency, then finishes with a closure over its result.
pub(crate) struct AfterBody<F, U, T> {
    dependency: Option<Await>,
    then: Option<F>,
    _types: PhantomData<fn(U) -> T>,
}

impl<F, U, T> AfterBody<F, U, T> {
    pub(crate) fn new(dependency: Await, then: F) -> Self {
        Self {
            dependency: Some(dependency),
            then: Some(then),
            _types: PhantomData,
        }
    }
}

impl<F, U, T> TaskBody for AfterBody<F, U, T>
where
    F: FnOnce(&mut TaskContext<'_>, TaskResult<U>) -> anyhow::Result<T> + Send + 'static,
    U: Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn step(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step<T>> {
        if let Some(dependency) = self.dependency.take() {
            return Ok(Step::Await(dependency));
        }
        let Some(then) = self.then.take() else {
            anyhow::bail!("task stepped after completion");
        };
        let awaited = cx.awaited::<U>();
        then(cx, awaited).map(Step::Complete)
    }
}
