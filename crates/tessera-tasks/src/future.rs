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

//! Shared, single-assignment task results.

use crate::error::TaskError;
use crate::system::Shared;
use crate::task::TaskId;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::{Duration, Instant};

/// The cell shared by a task's promise and every copy of its future.
pub(crate) struct FutureState<T> {
    task: TaskId,
    outcome: Mutex<Option<Result<T, TaskError>>>,
    /// Mirrors `outcome.is_some()`. Stored with `Release` after the outcome
    /// is written so an `Acquire` load that sees `true` also sees the value.
    ready: AtomicBool,
    resolved: Condvar,
    scheduler: OnceLock<Weak<Shared>>,
}

impl<T> FutureState<T> {
    fn lock(&self) -> MutexGuard<'_, Option<Result<T, TaskError>>> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, result: Result<T, TaskError>) {
        let mut outcome = self.lock();
        if outcome.is_none() {
            *outcome = Some(result);
            self.ready.store(true, Ordering::Release);
        }
        drop(outcome);
        self.resolved.notify_all();
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// OS-blocks until resolved or until `deadline`. Returns readiness.
    fn block_until(&self, deadline: Option<Instant>) -> bool {
        let mut outcome = self.lock();
        while outcome.is_none() {
            match deadline {
                None => {
                    outcome = self
                        .resolved
                        .wait(outcome)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    outcome = self
                        .resolved
                        .wait_timeout(outcome, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
        true
    }

    /// Sleeps at most `pause`, waking early if the result lands.
    fn park(&self, pause: Duration) {
        let outcome = self.lock();
        if outcome.is_none() {
            let _ = self.resolved.wait_timeout(outcome, pause);
        }
    }
}

/// The producing side of a [`TaskFuture`], owned by the task model.
///
/// Dropping an unfulfilled promise resolves the future with
/// [`TaskError::Abandoned`], so waiters never hang on lost tasks.
pub(crate) struct Promise<T> {
    state: Arc<FutureState<T>>,
    fulfilled: bool,
}

impl<T> Promise<T> {
    pub(crate) fn new(task: TaskId) -> (Self, TaskFuture<T>) {
        let state = Arc::new(FutureState {
            task,
            outcome: Mutex::new(None),
            ready: AtomicBool::new(false),
            resolved: Condvar::new(),
            scheduler: OnceLock::new(),
        });
        let future = TaskFuture {
            state: Arc::clone(&state),
        };
        (
            Self {
                state,
                fulfilled: false,
            },
            future,
        )
    }

    pub(crate) fn complete(mut self, result: Result<T, TaskError>) {
        self.state.resolve(result);
        self.fulfilled = true;
    }

    /// Records which scheduler owns the task, for cooperative waiting and
    /// cancellation. The first binding wins.
    pub(crate) fn bind(&self, scheduler: &Weak<Shared>) {
        let _ = self.state.scheduler.set(scheduler.clone());
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.fulfilled {
            log::trace!("{} dropped without running", self.state.task);
            self.state
                .resolve(Err(TaskError::Abandoned {
                    task: self.state.task,
                }));
        }
    }
}

/// A shared handle to the eventual result of a task.
///
/// Clones observe the same result. Waiting from a thread owned by the task's
/// scheduler is cooperative: the thread keeps executing other ready tasks
/// until the result lands. Any other thread simply blocks.
pub struct TaskFuture<T> {
    state: Arc<FutureState<T>>,
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> TaskFuture<T> {
    /// The id of the task producing this result.
    pub fn task_id(&self) -> TaskId {
        self.state.task
    }

    /// Non-blocking readiness check. Once `true`, stays `true`.
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Waits until the task completed, failed, was cancelled or dropped.
    pub fn wait(&self) {
        self.wait_until(None);
    }

    /// Waits at most `timeout`. Returns whether the result is available.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now().checked_add(timeout))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        if self.is_ready() {
            return true;
        }
        match self.cooperative_scheduler() {
            Some((shared, index)) => shared.help_until(
                index,
                deadline,
                || self.is_ready(),
                |pause| self.state.park(pause),
            ),
            None => self.state.block_until(deadline),
        }
    }

    /// The scheduler to help, if the calling thread belongs to it.
    fn cooperative_scheduler(&self) -> Option<(Arc<Shared>, usize)> {
        let shared = self.state.scheduler.get()?.upgrade()?;
        let index = shared.current_thread_index()?;
        Some((shared, index))
    }

    /// Removes the task from its queue if it has not started yet. The
    /// future then resolves with [`TaskError::Cancelled`].
    pub fn cancel(&self) -> bool {
        if self.is_ready() {
            return false;
        }
        match self.state.scheduler.get().and_then(Weak::upgrade) {
            Some(shared) => shared.cancel(self.state.task),
            None => false,
        }
    }
}

impl<T: Clone> TaskFuture<T> {
    /// Waits for the task and returns a copy of its result.
    pub fn get(&self) -> Result<T, TaskError> {
        self.wait();
        self.peek()
            .unwrap_or(Err(TaskError::Abandoned { task: self.task_id() }))
    }

    /// Returns the result if it is already available.
    pub fn try_get(&self) -> Option<Result<T, TaskError>> {
        if self.is_ready() {
            self.peek()
        } else {
            None
        }
    }

    fn peek(&self) -> Option<Result<T, TaskError>> {
        self.state.lock().clone()
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("task", &self.state.task)
            .field("ready", &self.is_ready())
            .finish()
    }
}
