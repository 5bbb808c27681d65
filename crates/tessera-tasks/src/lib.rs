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

//! # Tessera Tasks
//!
//! A work-stealing task system with one queue per worker thread plus one
//! queue reserved for the *owner* thread (the thread that built the system
//! and pumps it from its main loop).
//!
//! Tasks come in two flavours: *ready* tasks whose inputs are all available,
//! and *awaitable* tasks whose inputs include [`TaskFuture`]s produced by
//! other tasks. Queues move ready work to the front so that waiting tasks
//! never block a worker, and a scheduler thread that waits on a future keeps
//! executing other tasks instead of sleeping.
//!
//! ```rust
//! use tessera_tasks::{TaskSystem, TaskSystemConfig};
//!
//! let tasks = TaskSystem::new(TaskSystemConfig::default().with_threads_count(3)).unwrap();
//! let a = tasks.push_on_worker_thread(|| 20);
//! let b = tasks.push_on_worker_thread(|| 22);
//! let sum = tasks.push_awaitable_on_worker_thread((a, b), |(a, b)| a + b);
//! assert_eq!(sum.get(), Ok(42));
//! ```

#![warn(missing_docs)]

pub mod args;
pub mod config;
pub mod error;
pub mod future;
pub mod queue;
pub mod system;
pub mod task;

pub use args::{Ready, TaskArg, TaskArgs};
pub use config::TaskSystemConfig;
pub use error::{TaskError, TaskSystemError};
pub use future::TaskFuture;
pub use queue::TaskQueue;
pub use system::{QueueInfo, QueueTarget, TaskSystem, TaskSystemHandle, TaskSystemInfo};
pub use task::{make_awaitable_task, make_ready_task, Task, TaskId};
