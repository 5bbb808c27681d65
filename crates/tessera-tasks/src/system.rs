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

//! The scheduler: worker threads, queue routing and work stealing.

use crate::args::TaskArgs;
use crate::config::TaskSystemConfig;
use crate::error::TaskSystemError;
use crate::future::TaskFuture;
use crate::queue::TaskQueue;
use crate::task::{make_awaitable_task, make_ready_task, Task, TaskId};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Index of the queue reserved for the owner thread.
const OWNER: usize = 0;

/// Lower bound of every idle wait, so a zero config value never spins.
const MIN_PAUSE: Duration = Duration::from_millis(1);

static NEXT_SYSTEM_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    /// `(system id, queue index)` for every system the running thread serves,
    /// innermost registration last. A thread may own one system while
    /// working for another.
    static CURRENT: RefCell<Vec<(usize, usize)>> = const { RefCell::new(Vec::new()) };
}

/// Registers the calling thread with one system until dropped.
struct ThreadScope {
    system: usize,
    index: usize,
}

impl ThreadScope {
    fn enter(system: usize, index: usize) -> Self {
        CURRENT.with(|current| current.borrow_mut().push((system, index)));
        Self { system, index }
    }

    fn lookup(system: usize) -> Option<usize> {
        CURRENT.with(|current| {
            current
                .borrow()
                .iter()
                .rev()
                .find(|(id, _)| *id == system)
                .map(|&(_, index)| index)
        })
    }
}

impl Drop for ThreadScope {
    fn drop(&mut self) {
        let entry = (self.system, self.index);
        CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            if let Some(position) = current.iter().rposition(|e| *e == entry) {
                current.remove(position);
            }
        });
    }
}

/// Where a pushed task should be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueTarget {
    /// A specific queue. Index 0 is the owner's.
    Thread(usize),
    /// Any worker queue, picked round-robin.
    AnyWorker,
    /// The owner queue, drained by [`TaskSystemHandle::run_on_owner_thread`].
    Owner,
}

/// Pending work in one queue, as reported by [`TaskSystemHandle::get_info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    /// Queue index. 0 is the owner queue.
    pub index: usize,
    /// Tasks waiting in the queue.
    pub pending_tasks: usize,
}

/// A diagnostics snapshot of the scheduler.
///
/// Counts are read without synchronizing with concurrent pushes and pops, so
/// they are only indicative under load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSystemInfo {
    /// Number of queues, owner included.
    pub threads_count: usize,
    /// Sum of every queue's pending count.
    pub pending_tasks: usize,
    /// Per-queue breakdown, ordered by index.
    pub queues: Vec<QueueInfo>,
}

/// State shared by the worker threads, the handles and bound futures.
pub(crate) struct Shared {
    id: usize,
    queues: Box<[TaskQueue]>,
    next_worker: AtomicUsize,
    stopping: AtomicBool,
    config: TaskSystemConfig,
}

impl Shared {
    fn new(config: TaskSystemConfig) -> Self {
        let queues = (0..config.threads_count).map(|_| TaskQueue::new()).collect();
        Self {
            id: NEXT_SYSTEM_ID.fetch_add(1, Ordering::Relaxed),
            queues,
            next_worker: AtomicUsize::new(0),
            stopping: AtomicBool::new(false),
            config,
        }
    }

    fn threads_count(&self) -> usize {
        self.queues.len()
    }

    /// Queue index of the calling thread, if it belongs to this scheduler.
    pub(crate) fn current_thread_index(&self) -> Option<usize> {
        ThreadScope::lookup(self.id)
    }

    /// Runs other tasks on behalf of thread `index` until `done` holds or the
    /// deadline passes. Between fruitless attempts the thread parks for at
    /// most one cooperative interval. Returns the final value of `done`.
    pub(crate) fn help_until(
        &self,
        index: usize,
        deadline: Option<Instant>,
        done: impl Fn() -> bool,
        park: impl Fn(Duration),
    ) -> bool {
        let interval = self.config.cooperative_wait_interval.max(MIN_PAUSE);
        loop {
            if done() {
                return true;
            }
            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                return done();
            }
            if let Some(task) = self.try_pop_for(index) {
                task.run();
                continue;
            }
            let pause = match deadline {
                Some(deadline) => interval.min(deadline - now),
                None => interval,
            };
            park(pause);
        }
    }

    /// A ready task for thread `index`: its own queue first, then the worker
    /// queues. The owner queue is only ever served by the owner.
    fn try_pop_for(&self, index: usize) -> Option<Task> {
        if let Some(task) = self.queues[index].try_pop() {
            return Some(task);
        }
        self.queues
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(victim, _)| *victim != index)
            .find_map(|(_, queue)| queue.try_pop())
    }

    /// Removes a queued task without running it.
    pub(crate) fn cancel(&self, id: TaskId) -> bool {
        let cancelled = self.queues.iter().any(|queue| queue.cancel(id));
        if cancelled {
            log::debug!("{id} cancelled");
        }
        cancelled
    }

    fn get_any_worker_thread_idx(&self) -> usize {
        let workers = self.threads_count() - 1;
        if workers == 0 {
            return OWNER;
        }
        1 + self.next_worker.fetch_add(1, Ordering::Relaxed) % workers
    }

    fn worker_queue_by(&self, prefer: impl Fn(usize, usize) -> bool) -> usize {
        let mut best: Option<(usize, usize)> = None;
        for (index, queue) in self.queues.iter().enumerate().skip(1) {
            let len = queue.len();
            match best {
                Some((_, best_len)) if !prefer(len, best_len) => {}
                _ => best = Some((index, len)),
            }
        }
        best.map_or(OWNER, |(index, _)| index)
    }

    fn get_most_free_queue_idx(&self) -> usize {
        self.worker_queue_by(|len, best| len < best)
    }

    fn get_most_busy_queue_idx(&self) -> usize {
        self.worker_queue_by(|len, best| len > best)
    }

    fn resolve(&self, target: QueueTarget) -> usize {
        match target {
            QueueTarget::Thread(index) if index < self.threads_count() => index,
            QueueTarget::Thread(index) => {
                let message = format!(
                    "queue index {index} out of range ({} queues)",
                    self.threads_count()
                );
                log::error!("{message}");
                panic!("{message}");
            }
            QueueTarget::AnyWorker => self.get_any_worker_thread_idx(),
            QueueTarget::Owner => OWNER,
        }
    }

    /// Queues `task`. Closed queues hand it back, and it is dropped so its
    /// future resolves as abandoned.
    fn enqueue(self: &Arc<Self>, target: QueueTarget, task: Task) {
        task.bind(&Arc::downgrade(self));
        let pushed = if target == QueueTarget::AnyWorker {
            self.push_any_worker(task)
        } else {
            let index = self.resolve(target);
            log::trace!("{} pushed to queue {index}", task.id());
            self.queues[index].push(task)
        };
        if let Err(rejected) = pushed {
            log::debug!("{} pushed after shutdown, dropping it", rejected.id());
        }
    }

    fn push_any_worker(&self, mut task: Task) -> Result<(), Task> {
        for _ in 0..self.threads_count() {
            match self.queues[self.get_any_worker_thread_idx()].try_push(task) {
                Ok(()) => return Ok(()),
                Err(rejected) => task = rejected,
            }
        }
        self.queues[self.get_most_free_queue_idx()].push(task)
    }

    fn info(&self) -> TaskSystemInfo {
        let queues: Vec<QueueInfo> = self
            .queues
            .iter()
            .enumerate()
            .map(|(index, queue)| QueueInfo {
                index,
                pending_tasks: queue.len(),
            })
            .collect();
        TaskSystemInfo {
            threads_count: self.threads_count(),
            pending_tasks: queues.iter().map(|queue| queue.pending_tasks).sum(),
            queues,
        }
    }

    fn next_task(&self, index: usize, rng: &mut SmallRng) -> Option<Task> {
        let own = &self.queues[index];
        let workers = self.threads_count() - 1;
        let steal_attempts = self.config.steal_rounds_per_thread * self.threads_count();
        let idle_timeout = self.config.worker_pop_timeout.max(MIN_PAUSE);
        loop {
            if self.stopping.load(Ordering::Acquire) && !self.config.wait_on_destruct {
                own.clear();
                return None;
            }
            if let Some(task) = own.try_pop() {
                return Some(task);
            }
            if workers > 1 {
                for _ in 0..steal_attempts {
                    let victim = rng.gen_range(1..=workers);
                    if victim == index {
                        continue;
                    }
                    if let Some(task) = self.queues[victim].try_pop() {
                        log::trace!("worker {index} stole {} from queue {victim}", task.id());
                        return Some(task);
                    }
                }
            }
            match own.pop(idle_timeout) {
                Some(task) => return Some(task),
                None if own.is_done() && own.is_empty() => return None,
                None => {}
            }
        }
    }

    fn worker_loop(self: Arc<Self>, index: usize) {
        let _scope = ThreadScope::enter(self.id, index);
        let mut rng = SmallRng::from_entropy();
        log::info!("task worker {index} started");
        let mut executed = 0usize;
        while let Some(task) = self.next_task(index, &mut rng) {
            task.run();
            executed += 1;
        }
        log::info!("task worker {index} stopped after {executed} tasks");
    }

    fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        for queue in self.queues.iter() {
            queue.set_done();
        }
    }

    /// Closes every queue, dropping what is still queued. Pushes racing
    /// with this either land before a queue closes (and are dropped here) or
    /// are handed back.
    fn close_all(&self) -> usize {
        self.queues.iter().map(TaskQueue::close).sum()
    }
}

/// A cloneable handle for pushing work into a [`TaskSystem`].
///
/// Handles may outlive the system. Tasks pushed after shutdown are dropped
/// and their futures resolve as abandoned.
#[derive(Clone)]
pub struct TaskSystemHandle {
    shared: Arc<Shared>,
}

impl TaskSystemHandle {
    /// Number of queues, the owner queue included.
    pub fn threads_count(&self) -> usize {
        self.shared.threads_count()
    }

    /// Queue index of the calling thread, or `None` for foreign threads.
    pub fn current_thread_index(&self) -> Option<usize> {
        self.shared.current_thread_index()
    }

    /// Next worker queue in round-robin order (0 when there are no workers).
    pub fn get_any_worker_thread_idx(&self) -> usize {
        self.shared.get_any_worker_thread_idx()
    }

    /// Worker queue with the fewest pending tasks (0 when there are no
    /// workers). The counts are a racy snapshot.
    pub fn get_most_free_queue_idx(&self) -> usize {
        self.shared.get_most_free_queue_idx()
    }

    /// Worker queue with the most pending tasks (0 when there are no
    /// workers). The counts are a racy snapshot.
    pub fn get_most_busy_queue_idx(&self) -> usize {
        self.shared.get_most_busy_queue_idx()
    }

    /// Queues a prebuilt task.
    ///
    /// # Panics
    ///
    /// Panics if `target` names a queue index out of range.
    pub fn push_task(&self, target: QueueTarget, task: Task) {
        self.shared.enqueue(target, task);
    }

    /// Like [`push_task`](Self::push_task), but runs a ready task inline when
    /// the target queue belongs to the calling thread.
    pub fn push_or_execute_task(&self, target: QueueTarget, task: Task) {
        let index = self.shared.resolve(target);
        if task.is_ready() && self.current_thread_index() == Some(index) {
            task.bind(&Arc::downgrade(&self.shared));
            task.run();
        } else {
            self.shared.enqueue(QueueTarget::Thread(index), task);
        }
    }

    /// Queues `func` on queue `index`.
    pub fn push_on_thread<F, R>(&self, index: usize, func: F) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.push_ready(QueueTarget::Thread(index), func, false)
    }

    /// Queues `func` on a worker queue.
    pub fn push_on_worker_thread<F, R>(&self, func: F) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.push_ready(QueueTarget::AnyWorker, func, false)
    }

    /// Queues `func` for the owner thread.
    pub fn push_on_owner_thread<F, R>(&self, func: F) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.push_ready(QueueTarget::Owner, func, false)
    }

    /// Runs `func` inline if the caller owns queue `index`, else queues it.
    pub fn push_or_execute_on_thread<F, R>(&self, index: usize, func: F) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.push_ready(QueueTarget::Thread(index), func, true)
    }

    /// Runs `func` inline on a worker thread, else queues it on a worker.
    pub fn push_or_execute_on_worker_thread<F, R>(&self, func: F) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match self.current_thread_index() {
            Some(index) if index != OWNER => {
                self.push_ready(QueueTarget::Thread(index), func, true)
            }
            _ => self.push_ready(QueueTarget::AnyWorker, func, false),
        }
    }

    /// Runs `func` inline on the owner thread, else queues it for the owner.
    pub fn push_or_execute_on_owner_thread<F, R>(&self, func: F) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.push_ready(QueueTarget::Owner, func, true)
    }

    fn push_ready<F, R>(&self, target: QueueTarget, func: F, inline: bool) -> TaskFuture<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, future) = make_ready_task(func);
        if inline {
            self.push_or_execute_task(target, task);
        } else {
            self.push_task(target, task);
        }
        future
    }

    /// Queues `func` on queue `index`, to run once every input in `args`
    /// resolved.
    pub fn push_awaitable_on_thread<A, F, R>(&self, index: usize, args: A, func: F) -> TaskFuture<R>
    where
        A: TaskArgs + Send + 'static,
        F: FnOnce(A::Output) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.push_awaitable(QueueTarget::Thread(index), args, func)
    }

    /// Queues `func` on a worker queue, to run once `args` resolved.
    pub fn push_awaitable_on_worker_thread<A, F, R>(&self, args: A, func: F) -> TaskFuture<R>
    where
        A: TaskArgs + Send + 'static,
        F: FnOnce(A::Output) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.push_awaitable(QueueTarget::AnyWorker, args, func)
    }

    /// Queues `func` for the owner thread, to run once `args` resolved.
    pub fn push_awaitable_on_owner_thread<A, F, R>(&self, args: A, func: F) -> TaskFuture<R>
    where
        A: TaskArgs + Send + 'static,
        F: FnOnce(A::Output) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.push_awaitable(QueueTarget::Owner, args, func)
    }

    fn push_awaitable<A, F, R>(&self, target: QueueTarget, args: A, func: F) -> TaskFuture<R>
    where
        A: TaskArgs + Send + 'static,
        F: FnOnce(A::Output) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, future) = make_awaitable_task(args, func);
        self.push_task(target, task);
        future
    }

    /// Executes ready tasks from the owner queue on the calling thread.
    ///
    /// Keeps pumping for up to `max_duration`. With `Duration::ZERO` it drains
    /// whatever is ready right now and returns immediately. Returns the
    /// number of tasks executed.
    pub fn run_on_owner_thread(&self, max_duration: Duration) -> usize {
        let _scope = ThreadScope::enter(self.shared.id, OWNER);
        let queue = &self.shared.queues[OWNER];
        let mut executed = 0;

        if max_duration.is_zero() {
            while let Some(task) = queue.pop(Duration::ZERO) {
                task.run();
                executed += 1;
            }
            return executed;
        }

        let deadline = Instant::now().checked_add(max_duration);
        loop {
            let timeout = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    deadline - now
                }
                None => Duration::MAX,
            };
            match queue.pop(timeout) {
                Some(task) => {
                    task.run();
                    executed += 1;
                }
                None if queue.is_done() && queue.is_empty() => break,
                None => {}
            }
        }
        executed
    }

    /// Removes a task that is still queued. Returns `false` if it already
    /// started, finished or was never queued here.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.shared.cancel(id)
    }

    /// A snapshot of the pending work per queue.
    pub fn get_info(&self) -> TaskSystemInfo {
        self.shared.info()
    }
}

impl std::fmt::Debug for TaskSystemHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSystemHandle")
            .field("threads_count", &self.threads_count())
            .finish()
    }
}

/// A work-stealing scheduler.
///
/// Queue 0 belongs to the *owner*, the thread that built the system; it is
/// only drained by [`run_on_owner_thread`](TaskSystemHandle::run_on_owner_thread)
/// and by cooperative waits on that thread. Queues `1..threads_count` each
/// have a worker thread that also steals ready tasks from its peers.
///
/// Dropping the system stops it. With `wait_on_destruct` every queued task
/// runs first (the owner queue on the dropping thread); otherwise queued
/// tasks are dropped and their futures resolve as abandoned.
pub struct TaskSystem {
    handle: TaskSystemHandle,
    threads: Vec<JoinHandle<()>>,
    owner: ThreadId,
    owner_scope: Option<ThreadScope>,
}

impl TaskSystem {
    /// Starts `config.threads_count - 1` worker threads and registers the
    /// calling thread as the owner.
    pub fn new(config: TaskSystemConfig) -> Result<Self, TaskSystemError> {
        if config.threads_count == 0 {
            return Err(TaskSystemError::InvalidThreadCount);
        }
        let shared = Arc::new(Shared::new(config));
        let mut threads = Vec::with_capacity(shared.threads_count() - 1);

        for index in 1..shared.threads_count() {
            let worker = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{index}", shared.config.thread_name_prefix))
                .spawn(move || worker.worker_loop(index));
            match spawned {
                Ok(thread) => threads.push(thread),
                Err(source) => {
                    log::error!("failed to spawn task worker {index}: {source}");
                    shared.stop();
                    shared.close_all();
                    for thread in threads {
                        let _ = thread.join();
                    }
                    return Err(TaskSystemError::Spawn { index, source });
                }
            }
        }

        log::info!(
            "task system started with {} threads ({} workers)",
            shared.threads_count(),
            threads.len()
        );
        let owner_scope = Some(ThreadScope::enter(shared.id, OWNER));
        Ok(Self {
            handle: TaskSystemHandle { shared },
            threads,
            owner: thread::current().id(),
            owner_scope,
        })
    }

    /// Shorthand for a default configuration with `threads_count` threads.
    pub fn with_threads(threads_count: usize) -> Result<Self, TaskSystemError> {
        Self::new(TaskSystemConfig::default().with_threads_count(threads_count))
    }

    /// A cloneable handle, e.g. for capturing in tasks.
    pub fn handle(&self) -> TaskSystemHandle {
        self.handle.clone()
    }

    /// The configuration the system was built with.
    pub fn config(&self) -> &TaskSystemConfig {
        &self.handle.shared.config
    }

    /// Pumps the owner queue until every worker has exited.
    fn drain_owner_queue(&self) {
        let interval = self.config().cooperative_wait_interval.max(MIN_PAUSE);
        let queue = &self.handle.shared.queues[OWNER];
        let _scope = ThreadScope::enter(self.handle.shared.id, OWNER);
        loop {
            if let Some(task) = queue.pop(interval) {
                task.run();
                continue;
            }
            if !queue.is_empty() {
                continue;
            }
            if self.threads.iter().all(JoinHandle::is_finished) {
                break;
            }
            thread::sleep(interval);
        }
    }
}

impl Deref for TaskSystem {
    type Target = TaskSystemHandle;

    fn deref(&self) -> &TaskSystemHandle {
        &self.handle
    }
}

impl std::fmt::Debug for TaskSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSystem")
            .field("config", self.config())
            .field("workers", &self.threads.len())
            .finish()
    }
}

impl Drop for TaskSystem {
    fn drop(&mut self) {
        let shared = Arc::clone(&self.handle.shared);
        let pending = shared.info().pending_tasks;
        shared.stop();

        if shared.config.wait_on_destruct {
            log::debug!("task system shutting down, draining {pending} pending tasks");
            self.drain_owner_queue();
        } else {
            let dropped = shared.close_all();
            log::debug!("task system shutting down, dropped {dropped} pending tasks");
        }

        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                log::error!("task worker panicked outside of a task");
            }
        }
        // Late pushes from the final tasks may still hold handles to us.
        shared.close_all();

        // Another thread's registration cannot be undone from here; the stale
        // entry names a dead system id and never matches again.
        let scope = self.owner_scope.take();
        if thread::current().id() == self.owner {
            drop(scope);
        } else {
            std::mem::forget(scope);
        }
        log::info!("task system stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use std::sync::Mutex;

    fn threads(threads_count: usize) -> TaskSystemConfig {
        TaskSystemConfig::default().with_threads_count(threads_count)
    }

    #[test]
    fn test_zero_threads_is_rejected() {
        assert!(matches!(
            TaskSystem::new(threads(0)),
            Err(TaskSystemError::InvalidThreadCount)
        ));
    }

    #[test]
    fn test_any_worker_round_robins_over_workers_only() {
        let shared = Shared::new(threads(4));
        let picks: Vec<usize> = (0..6).map(|_| shared.get_any_worker_thread_idx()).collect();
        assert_eq!(picks, vec![1, 2, 3, 1, 2, 3]);

        let single = Shared::new(threads(1));
        assert_eq!(single.get_any_worker_thread_idx(), 0);
    }

    #[test]
    fn test_load_selection_ignores_the_owner_queue() {
        let shared = Shared::new(threads(3));
        for _ in 0..5 {
            shared.queues[0].push(make_ready_task(|| ()).0).unwrap();
        }
        shared.queues[2].push(make_ready_task(|| ()).0).unwrap();
        assert_eq!(shared.get_most_free_queue_idx(), 1);
        assert_eq!(shared.get_most_busy_queue_idx(), 2);

        let single = Shared::new(threads(1));
        assert_eq!(single.get_most_free_queue_idx(), 0);
        assert_eq!(single.get_most_busy_queue_idx(), 0);
    }

    #[test]
    fn test_info_reports_per_queue_counts() {
        let shared = Shared::new(threads(3));
        shared.queues[0].push(make_ready_task(|| ()).0).unwrap();
        shared.queues[2].push(make_ready_task(|| ()).0).unwrap();
        shared.queues[2].push(make_ready_task(|| ()).0).unwrap();

        let info = shared.info();
        assert_eq!(info.threads_count, 3);
        assert_eq!(info.pending_tasks, 3);
        assert_eq!(
            info.queues.iter().map(|q| q.pending_tasks).collect::<Vec<_>>(),
            vec![1, 0, 2]
        );
        shared.close_all();
    }

    #[test]
    fn test_thread_index_is_scoped_to_one_system() {
        let system = TaskSystem::with_threads(1).unwrap();
        assert_eq!(system.current_thread_index(), Some(0));

        let other = Shared::new(threads(1));
        assert_eq!(other.current_thread_index(), None);

        let foreign = system.handle();
        let seen = thread::spawn(move || foreign.current_thread_index())
            .join()
            .unwrap();
        assert_eq!(seen, None);
    }

    #[test]
    fn test_workers_report_their_index() {
        let system = TaskSystem::with_threads(3).unwrap();
        let handle = system.handle();
        let future = system.push_on_thread(2, move || handle.current_thread_index());
        // Waiting on the owner thread could run the task here, so wait
        // from a foreign thread instead.
        let index = thread::spawn(move || future.get()).join().unwrap();
        assert_eq!(index, Ok(Some(2)));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_pushing_to_a_missing_queue_panics() {
        let system = TaskSystem::with_threads(2).unwrap();
        let _ = system.push_on_thread(5, || ());
    }

    #[test]
    fn test_owner_tasks_wait_for_the_pump() {
        let system = TaskSystem::with_threads(2).unwrap();
        let future = system.push_on_owner_thread(|| thread::current().id());
        thread::sleep(Duration::from_millis(20));
        assert!(!future.is_ready());
        assert_eq!(system.run_on_owner_thread(Duration::ZERO), 1);
        assert_eq!(future.get(), Ok(thread::current().id()));
    }

    #[test]
    fn test_inline_execution_on_the_calling_thread() {
        let system = TaskSystem::with_threads(2).unwrap();
        let future = system.push_or_execute_on_owner_thread(|| thread::current().id());
        assert!(future.is_ready());
        assert_eq!(future.get(), Ok(thread::current().id()));
        assert_eq!(system.get_info().pending_tasks, 0);
    }

    #[test]
    fn test_cancel_only_hits_queued_tasks() {
        let system = TaskSystem::with_threads(1).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let future = system.push_on_owner_thread(move || sink.lock().unwrap().push(1));

        assert!(system.cancel(future.task_id()));
        assert!(!system.cancel(future.task_id()));
        assert_eq!(system.run_on_owner_thread(Duration::ZERO), 0);
        assert_eq!(
            future.get(),
            Err(TaskError::Cancelled {
                task: future.task_id()
            })
        );
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_two_live_systems_on_one_thread_keep_their_owner() {
        let first = TaskSystem::with_threads(1).unwrap();
        let second = TaskSystem::with_threads(1).unwrap();
        assert_eq!(first.current_thread_index(), Some(0));
        assert_eq!(second.current_thread_index(), Some(0));

        // `get` on the owner pumps the owner queue of its own system.
        let future = first.push_on_owner_thread(|| 7);
        assert!(future.wait_for(Duration::from_secs(1)));
        assert_eq!(future.get(), Ok(7));

        drop(second);
        assert_eq!(first.current_thread_index(), Some(0));
        let future = first.push_on_owner_thread(|| 8);
        assert_eq!(future.get(), Ok(8));
    }

    #[test]
    fn test_zero_cooperative_interval_still_parks() {
        let shared = Shared::new(threads(1).with_cooperative_wait_interval(Duration::ZERO));
        let pauses = Mutex::new(Vec::new());
        let deadline = Instant::now() + Duration::from_millis(20);
        let done = shared.help_until(0, Some(deadline), || false, |pause| {
            pauses.lock().unwrap().push(pause);
            thread::sleep(pause);
        });

        assert!(!done);
        let pauses = pauses.into_inner().unwrap();
        assert!(!pauses.is_empty());
        assert!(pauses.len() < 100, "spun {} times", pauses.len());
        assert!(pauses.iter().all(|pause| !pause.is_zero()));
    }

    #[test]
    fn test_push_after_close_abandons_the_future() {
        let shared = Arc::new(Shared::new(threads(2)));
        assert_eq!(shared.close_all(), 0);
        let (task, future) = make_ready_task(|| 1);
        shared.enqueue(QueueTarget::AnyWorker, task);
        assert_eq!(shared.info().pending_tasks, 0);
        assert!(matches!(future.get(), Err(TaskError::Abandoned { .. })));
    }
}
