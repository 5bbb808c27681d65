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

//! The per-thread task queue.

use crate::task::{Task, TaskId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

/// How often a blocked `pop` re-checks a queue holding only tasks whose
/// inputs are still pending. Nothing signals the queue when an input
/// resolves, so that wait has to be polled.
const NOT_READY_POLL: Duration = Duration::from_millis(1);

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    done: bool,
    closed: bool,
}

impl QueueState {
    /// Pops the front task if it is ready. Otherwise moves the ready tasks to
    /// the front (stable partition) for the next attempt and fails.
    fn take_front(&mut self) -> Option<Task> {
        if self.tasks.front()?.is_ready() {
            return self.tasks.pop_front();
        }
        self.sort();
        None
    }

    /// Like [`take_front`](Self::take_front), retrying once after the sort.
    fn take_ready(&mut self) -> Option<Task> {
        if let Some(task) = self.take_front() {
            return Some(task);
        }
        if self.tasks.front()?.is_ready() {
            return self.tasks.pop_front();
        }
        None
    }

    fn sort(&mut self) {
        let (ready, waiting): (VecDeque<Task>, VecDeque<Task>) =
            self.tasks.drain(..).partition(Task::is_ready);
        self.tasks = ready;
        self.tasks.extend(waiting);
    }
}

/// A deque of pending tasks owned by one thread.
///
/// Ready tasks are served before tasks still waiting on inputs; within each
/// group arrival order is kept. A task whose inputs resolve may therefore
/// overtake older tasks that are still waiting.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    pending: AtomicUsize,
}

impl TaskQueue {
    /// Creates an open, empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            pending: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_lock(&self) -> Option<MutexGuard<'_, QueueState>> {
        match self.state.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Appends `task` unless the queue is contended or closed, in which case
    /// the task is handed back so the caller can try another queue.
    pub fn try_push(&self, task: Task) -> Result<(), Task> {
        let Some(mut state) = self.try_lock() else {
            return Err(task);
        };
        if state.closed {
            return Err(task);
        }
        state.tasks.push_back(task);
        self.pending.fetch_add(1, Ordering::Relaxed);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Appends `task`, waiting for the lock if needed. A closed queue hands
    /// the task back.
    pub fn push(&self, task: Task) -> Result<(), Task> {
        let mut state = self.lock();
        if state.closed {
            return Err(task);
        }
        state.tasks.push_back(task);
        self.pending.fetch_add(1, Ordering::Relaxed);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Non-blocking pop. Fails if the queue is contended, empty, or its front
    /// task is not ready; in the last case ready tasks are sorted to the
    /// front for the next call.
    pub fn try_pop(&self) -> Option<Task> {
        let task = self.try_lock()?.take_front()?;
        self.pending.fetch_sub(1, Ordering::Relaxed);
        Some(task)
    }

    /// Pops a ready task, waiting up to `timeout` for one to show up.
    ///
    /// `Duration::ZERO` never waits (but does wait for the lock) and
    /// `Duration::MAX` waits until a task is available or the queue is done
    /// and empty.
    pub fn pop(&self, timeout: Duration) -> Option<Task> {
        let deadline = match timeout {
            Duration::ZERO | Duration::MAX => None,
            timeout => Instant::now().checked_add(timeout),
        };
        let mut state = self.lock();
        loop {
            if let Some(task) = state.take_ready() {
                self.pending.fetch_sub(1, Ordering::Relaxed);
                return Some(task);
            }
            if timeout.is_zero() || (state.done && state.tasks.is_empty()) {
                return None;
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    deadline - now
                }
                None => Duration::MAX,
            };
            state = if state.tasks.is_empty() && pause == Duration::MAX {
                self.available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner)
            } else {
                let pause = if state.tasks.is_empty() {
                    pause
                } else {
                    pause.min(NOT_READY_POLL)
                };
                self.available
                    .wait_timeout(state, pause)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            };
        }
    }

    /// Removes the queued task `id` without running it and resolves its
    /// future as cancelled.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.lock();
        let Some(position) = state.tasks.iter().position(|task| task.id() == id) else {
            return false;
        };
        let task = state.tasks.remove(position);
        drop(state);
        match task {
            Some(task) => {
                self.pending.fetch_sub(1, Ordering::Relaxed);
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// Drops every queued task, abandoning their futures. Returns how many
    /// were dropped.
    pub fn clear(&self) -> usize {
        let dropped: Vec<Task> = self.lock().tasks.drain(..).collect();
        self.pending.fetch_sub(dropped.len(), Ordering::Relaxed);
        // Futures resolve (and wake their waiters) outside the queue lock.
        dropped.len()
    }

    /// Rejects every later push and drops the queued tasks, abandoning their
    /// futures. Returns how many were dropped.
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        state.done = true;
        let dropped: Vec<Task> = state.tasks.drain(..).collect();
        drop(state);
        self.pending.fetch_sub(dropped.len(), Ordering::Relaxed);
        self.available.notify_all();
        dropped.len()
    }

    /// Marks the queue done and wakes every blocked consumer. Pushes are
    /// still accepted so that finishing tasks can queue follow-up work.
    pub fn set_done(&self) {
        self.lock().done = true;
        self.available.notify_all();
    }

    /// `true` once [`set_done`](Self::set_done) was called.
    pub fn is_done(&self) -> bool {
        self.lock().done
    }

    /// Approximate number of queued tasks, read without locking.
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// `true` when no task is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}
