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

//! The type-erased unit of work.

use crate::args::TaskArgs;
use crate::error::TaskError;
use crate::future::{Promise, TaskFuture};
use crate::system::Shared;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide, monotonically increasing task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn for_tests(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// What a [`Task`] erases: something that can report readiness and be run or
/// cancelled exactly once.
trait Runnable: Send {
    fn is_ready(&self) -> bool;
    fn run(self: Box<Self>, id: TaskId);
    fn cancel(self: Box<Self>, id: TaskId);
    fn bind(&self, scheduler: &Weak<Shared>);
}

/// A callable whose inputs are all available.
struct ReadyModel<F, R> {
    func: F,
    promise: Promise<R>,
}

impl<F, R> Runnable for ReadyModel<F, R>
where
    F: FnOnce() -> R + Send,
    R: Send + 'static,
{
    fn is_ready(&self) -> bool {
        true
    }

    fn run(self: Box<Self>, id: TaskId) {
        let Self { func, promise } = *self;
        promise.complete(invoke(id, func));
    }

    fn cancel(self: Box<Self>, id: TaskId) {
        self.promise.complete(Err(TaskError::Cancelled { task: id }));
    }

    fn bind(&self, scheduler: &Weak<Shared>) {
        self.promise.bind(scheduler);
    }
}

/// A callable waiting on futures produced by other tasks.
struct AwaitableModel<A, F, R> {
    args: A,
    func: F,
    promise: Promise<R>,
}

impl<A, F, R> Runnable for AwaitableModel<A, F, R>
where
    A: TaskArgs + Send,
    F: FnOnce(A::Output) -> R + Send,
    R: Send + 'static,
{
    fn is_ready(&self) -> bool {
        self.args.is_ready()
    }

    fn run(self: Box<Self>, id: TaskId) {
        let Self {
            args,
            func,
            promise,
        } = *self;
        // Resolving blocks (cooperatively) if the task is run before it is
        // ready; schedulers only run it once `is_ready` said so.
        let result = args.resolve().and_then(|inputs| invoke(id, move || func(inputs)));
        promise.complete(result);
    }

    fn cancel(self: Box<Self>, id: TaskId) {
        self.promise.complete(Err(TaskError::Cancelled { task: id }));
    }

    fn bind(&self, scheduler: &Weak<Shared>) {
        self.promise.bind(scheduler);
    }
}

fn invoke<R>(id: TaskId, func: impl FnOnce() -> R) -> Result<R, TaskError> {
    catch_unwind(AssertUnwindSafe(func)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        log::warn!("{id} panicked: {message}");
        TaskError::Panicked { task: id, message }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A type-erased, single-shot unit of work.
///
/// [`run`](Task::run) and [`cancel`](Task::cancel) consume the task, so the
/// wrapped callable runs at most once no matter how often the task is polled
/// for readiness or moved between queues. Dropping a task without running it
/// resolves its future with [`TaskError::Abandoned`].
pub struct Task {
    id: TaskId,
    runnable: Box<dyn Runnable>,
}

impl Task {
    /// The identifier assigned when the task was built.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// `true` once every input is available. Never regresses to `false`.
    pub fn is_ready(&self) -> bool {
        self.runnable.is_ready()
    }

    /// Runs the callable and publishes its result (or captured panic) to the
    /// task's future. Blocks if called before [`is_ready`](Task::is_ready).
    pub fn run(self) {
        self.runnable.run(self.id);
    }

    /// Resolves the future with [`TaskError::Cancelled`] without running.
    pub fn cancel(self) {
        self.runnable.cancel(self.id);
    }

    pub(crate) fn bind(&self, scheduler: &Weak<Shared>) {
        self.runnable.bind(scheduler);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Wraps a callable whose inputs are already captured.
pub fn make_ready_task<F, R>(func: F) -> (Task, TaskFuture<R>)
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let id = TaskId::next();
    let (promise, future) = Promise::new(id);
    let task = Task {
        id,
        runnable: Box::new(ReadyModel { func, promise }),
    };
    (task, future)
}

/// Wraps a callable that consumes the values of `args` once they resolve.
///
/// `args` is a [`TaskFuture`], a `Vec` of task arguments, or a tuple mixing
/// futures with [`Ready`](crate::Ready) values. The callable receives the
/// resolved values with the same shape. If an input failed, the callable is
/// skipped and the input's error is propagated.
pub fn make_awaitable_task<A, F, R>(args: A, func: F) -> (Task, TaskFuture<R>)
where
    A: TaskArgs + Send + 'static,
    F: FnOnce(A::Output) -> R + Send + 'static,
    R: Send + 'static,
{
    let id = TaskId::next();
    let (promise, future) = Promise::new(id);
    let task = Task {
        id,
        runnable: Box::new(AwaitableModel {
            args,
            func,
            promise,
        }),
    };
    (task, future)
}
