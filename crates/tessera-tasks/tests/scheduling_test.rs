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

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tessera_tasks::{Ready, TaskError, TaskFuture, TaskSystem, TaskSystemConfig};

/// Waits from a thread outside the scheduler, so the wait cannot end up
/// running the task itself.
fn get_off_scheduler<T: Clone + Send + 'static>(future: TaskFuture<T>) -> Result<T, TaskError> {
    thread::spawn(move || future.get())
        .join()
        .expect("waiter thread panicked")
}

fn system(threads_count: usize) -> Result<TaskSystem> {
    Ok(TaskSystem::new(
        TaskSystemConfig::default().with_threads_count(threads_count),
    )?)
}

#[test]
fn test_awaitable_chain_on_a_single_thread() -> Result<()> {
    // Only the owner queue exists: waiting must run the work itself.
    let tasks = system(1)?;
    let a = tasks.push_on_worker_thread(|| 6);
    let b = tasks.push_on_worker_thread(|| 7);
    let product = tasks.push_awaitable_on_worker_thread((a, b), |(a, b)| a * b);
    let described =
        tasks.push_awaitable_on_owner_thread((product.clone(), Ready("answer")), |(v, label)| {
            format!("{label}={v}")
        });

    assert_eq!(described.get(), Ok("answer=42".to_string()));
    assert_eq!(product.get(), Ok(42));
    Ok(())
}

#[test]
fn test_awaitable_chain_with_one_worker() -> Result<()> {
    let tasks = system(2)?;
    let leaves: Vec<TaskFuture<u64>> = (1..=10)
        .map(|i| tasks.push_on_worker_thread(move || i * i))
        .collect();
    let total = tasks.push_awaitable_on_worker_thread(leaves, |values: Vec<u64>| {
        values.into_iter().sum::<u64>()
    });
    assert_eq!(total.get(), Ok(385));
    Ok(())
}

#[test]
fn test_worker_waiting_on_its_own_subtasks_does_not_deadlock() -> Result<()> {
    let tasks = system(2)?;
    let handle = tasks.handle();
    let outer = tasks.push_on_worker_thread(move || {
        // Both subtasks land on the only worker queue, which is ours.
        let left = handle.push_on_worker_thread(|| 20);
        let right = handle.push_on_worker_thread(|| 22);
        left.get().unwrap_or_default() + right.get().unwrap_or_default()
    });
    assert_eq!(outer.get(), Ok(42));
    Ok(())
}

#[test]
fn test_foreign_thread_blocks_until_ready() -> Result<()> {
    let tasks = system(3)?;
    let future = tasks.push_on_worker_thread(|| {
        thread::sleep(Duration::from_millis(20));
        "loaded"
    });
    let waiter = {
        let future = future.clone();
        thread::spawn(move || future.get())
    };
    assert_eq!(waiter.join().expect("waiter thread"), Ok("loaded"));
    Ok(())
}

#[test]
fn test_every_task_runs_exactly_once() -> Result<()> {
    let tasks = system(4)?;
    let counters: Arc<Vec<AtomicUsize>> = Arc::new((0..500).map(|_| AtomicUsize::new(0)).collect());
    let futures: Vec<TaskFuture<()>> = (0..500)
        .map(|i| {
            let counters = Arc::clone(&counters);
            tasks.push_on_worker_thread(move || {
                counters[i].fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    for future in &futures {
        future.wait();
    }
    assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    Ok(())
}

#[test]
fn test_panicking_task_does_not_kill_its_worker() -> Result<()> {
    let tasks = system(2)?;
    let failed = tasks.push_on_thread(1, || -> u32 { panic!("shader compile error") });
    let after = tasks.push_on_thread(1, || 5u32);

    let error = failed.get().unwrap_err();
    assert!(matches!(
        &error,
        TaskError::Panicked { message, .. } if message == "shader compile error"
    ));
    assert_eq!(after.get(), Ok(5));

    let dependent = tasks.push_awaitable_on_worker_thread(failed, |v| v + 1);
    assert_eq!(dependent.get(), Err(error));
    Ok(())
}

#[test]
fn test_cancel_a_queued_task() -> Result<()> {
    let tasks = system(2)?;
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();
    let blocker = tasks.push_on_thread(1, move || {
        let _ = started_tx.send(());
        let _ = release_rx.recv();
    });
    started_rx.recv()?;

    let ran = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&ran);
    let victim = tasks.push_on_thread(1, move || {
        flag.fetch_add(1, Ordering::SeqCst);
    });
    assert!(victim.cancel());
    assert!(!victim.cancel());

    release_tx.send(())?;
    blocker.wait();
    assert_eq!(
        victim.get(),
        Err(TaskError::Cancelled {
            task: victim.task_id()
        })
    );
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_push_or_execute_runs_inline_on_the_owner() -> Result<()> {
    let tasks = system(2)?;
    let owner = thread::current().id();
    let future = tasks.push_or_execute_on_owner_thread(move || thread::current().id() == owner);
    assert!(future.is_ready());
    assert_eq!(future.get(), Ok(true));

    // From a worker, the owner variant has to queue.
    let handle = tasks.handle();
    let queued = get_off_scheduler(
        tasks.push_on_thread(1, move || handle.push_or_execute_on_owner_thread(|| 1).is_ready()),
    );
    assert_eq!(queued, Ok(false));
    assert_eq!(tasks.run_on_owner_thread(Duration::ZERO), 1);
    Ok(())
}

#[test]
fn test_push_or_execute_on_worker_from_a_worker() -> Result<()> {
    let tasks = system(3)?;
    let handle = tasks.handle();
    let inner = get_off_scheduler(tasks.push_on_thread(2, move || {
        let me = handle.current_thread_index();
        let check = handle.clone();
        let nested = handle.push_or_execute_on_worker_thread(move || check.current_thread_index());
        (nested.is_ready(), nested.get().ok().flatten() == me)
    }));
    assert_eq!(inner, Ok((true, true)));
    Ok(())
}

#[test]
fn test_owner_pump_respects_its_budget() -> Result<()> {
    let tasks = system(2)?;
    for _ in 0..3 {
        let _ = tasks.push_on_owner_thread(|| ());
    }
    let start = Instant::now();
    assert_eq!(tasks.run_on_owner_thread(Duration::from_millis(30)), 3);
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(tasks.run_on_owner_thread(Duration::ZERO), 0);
    Ok(())
}

#[test]
fn test_owner_pump_from_another_thread() -> Result<()> {
    let tasks = system(1)?;
    let handle = tasks.handle();
    let future = tasks.push_on_owner_thread(|| thread::current().name().map(str::to_owned));
    let executed = thread::Builder::new()
        .name("render".into())
        .spawn(move || handle.run_on_owner_thread(Duration::ZERO))?
        .join()
        .expect("render thread");
    assert_eq!(executed, 1);
    assert_eq!(future.get(), Ok(Some("render".to_string())));
    Ok(())
}

#[test]
fn test_info_tracks_owner_backlog() -> Result<()> {
    let tasks = system(3)?;
    for _ in 0..4 {
        let _ = tasks.push_on_owner_thread(|| ());
    }
    let info = tasks.get_info();
    assert_eq!(info.threads_count, 3);
    assert_eq!(info.queues.len(), 3);
    assert_eq!(info.queues[0].pending_tasks, 4);
    assert!(info.pending_tasks >= 4);

    let json = serde_json::to_string(&info)?;
    assert!(json.contains("\"pending_tasks\""));

    tasks.run_on_owner_thread(Duration::ZERO);
    assert_eq!(tasks.get_info().queues[0].pending_tasks, 0);
    Ok(())
}
