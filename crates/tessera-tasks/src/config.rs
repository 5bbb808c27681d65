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

//! Configuration of a [`TaskSystem`](crate::TaskSystem).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs of the task system.
///
/// Durations are (de)serialized as whole milliseconds so the config can be
/// kept in a hand-edited JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSystemConfig {
    /// Number of queues, including the owner queue at index 0. One worker
    /// thread is spawned per queue except the owner's.
    pub threads_count: usize,
    /// When `true`, dropping the system runs every pending task first.
    /// Otherwise pending tasks are discarded and their futures abandoned.
    pub wait_on_destruct: bool,
    /// How long an idle worker blocks on its own queue before re-checking
    /// for shutdown.
    #[serde(with = "millis")]
    pub worker_pop_timeout: Duration,
    /// How long a cooperative waiter sleeps when it found no task to run.
    #[serde(with = "millis")]
    pub cooperative_wait_interval: Duration,
    /// A worker makes `steal_rounds_per_thread * threads_count` steal
    /// attempts before blocking on its own queue.
    pub steal_rounds_per_thread: usize,
    /// Worker threads are named `"{prefix}-{index}"`.
    pub thread_name_prefix: String,
}

impl Default for TaskSystemConfig {
    fn default() -> Self {
        Self {
            threads_count: std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1),
            wait_on_destruct: true,
            worker_pop_timeout: Duration::from_millis(10),
            cooperative_wait_interval: Duration::from_millis(1),
            steal_rounds_per_thread: 10,
            thread_name_prefix: "tessera-worker".to_string(),
        }
    }
}

impl TaskSystemConfig {
    /// Parses a JSON config. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sets the number of queues (owner included).
    #[must_use]
    pub fn with_threads_count(mut self, threads_count: usize) -> Self {
        self.threads_count = threads_count;
        self
    }

    /// Sets the shutdown policy.
    #[must_use]
    pub fn with_wait_on_destruct(mut self, wait: bool) -> Self {
        self.wait_on_destruct = wait;
        self
    }

    /// Sets the idle timeout of the worker loop.
    #[must_use]
    pub fn with_worker_pop_timeout(mut self, timeout: Duration) -> Self {
        self.worker_pop_timeout = timeout;
        self
    }

    /// Sets the sleep interval of cooperative waiters.
    #[must_use]
    pub fn with_cooperative_wait_interval(mut self, interval: Duration) -> Self {
        self.cooperative_wait_interval = interval;
        self
    }

    /// Sets the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = TaskSystemConfig::default();
        assert!(config.threads_count >= 1);
        assert!(config.wait_on_destruct);
        assert_eq!(config.steal_rounds_per_thread, 10);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            TaskSystemConfig::from_json(r#"{ "threads_count": 3, "worker_pop_timeout": 25 }"#)
                .unwrap();
        assert_eq!(config.threads_count, 3);
        assert_eq!(config.worker_pop_timeout, Duration::from_millis(25));
        assert_eq!(config.cooperative_wait_interval, Duration::from_millis(1));
        assert_eq!(config.thread_name_prefix, "tessera-worker");
    }

    #[test]
    fn test_json_round_trip() {
        let config = TaskSystemConfig::default()
            .with_threads_count(2)
            .with_wait_on_destruct(false)
            .with_thread_name_prefix("jobs");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"worker_pop_timeout\":10"));
        assert_eq!(TaskSystemConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(TaskSystemConfig::from_json("{ threads_count: }").is_err());
    }
}
