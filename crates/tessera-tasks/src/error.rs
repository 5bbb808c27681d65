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

//! Error types of the task system.

use crate::task::TaskId;
use thiserror::Error;

/// Why a [`TaskFuture`](crate::TaskFuture) holds no value.
///
/// Cloneable so that every copy of a shared future observes the same
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task body panicked. The panic never escapes the worker loop.
    #[error("{task} panicked: {message}")]
    Panicked {
        /// The failing task.
        task: TaskId,
        /// The panic payload, if it was a string.
        message: String,
    },
    /// The task was removed from its queue before it started.
    #[error("{task} was cancelled before it started")]
    Cancelled {
        /// The cancelled task.
        task: TaskId,
    },
    /// The task was dropped without running, e.g. discarded at shutdown.
    #[error("{task} was dropped without running")]
    Abandoned {
        /// The dropped task.
        task: TaskId,
    },
}

impl TaskError {
    /// The task this error originated from. For an awaitable task whose
    /// input failed, this is the input's task.
    pub fn task(&self) -> TaskId {
        match self {
            TaskError::Panicked { task, .. }
            | TaskError::Cancelled { task }
            | TaskError::Abandoned { task } => *task,
        }
    }
}

/// An error raised while building a [`TaskSystem`](crate::TaskSystem).
#[derive(Debug, Error)]
pub enum TaskSystemError {
    /// `threads_count` was zero. The owner queue always exists.
    #[error("a task system needs at least one thread (the owner)")]
    InvalidThreadCount,
    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread {index}")]
    Spawn {
        /// Queue index of the worker that failed to start.
        index: usize,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
