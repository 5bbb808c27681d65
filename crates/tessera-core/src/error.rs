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

//! Error types for handle sets and object pools.

use thiserror::Error;

/// An error raised by a handle set or object pool.
///
/// Only recoverable conditions are reported through this type. Stale handle
/// use is absorbed into `false`/`None` returns, and overflows of the version
/// or index space are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Every slot of a fixed-capacity set is alive.
    #[error("pool '{pool}' is at capacity ({capacity} slots)")]
    CapacityExhausted {
        /// The label of the exhausted pool.
        pool: &'static str,
        /// Its fixed capacity.
        capacity: usize,
    },
}

/// An error raised when wiring subsystems through an
/// [`EngineContext`](crate::EngineContext).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A subsystem asked for a service nobody registered.
    #[error("no service of type `{type_name}` is registered")]
    MissingService {
        /// The requested type.
        type_name: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message_names_the_pool() {
        let err = PoolError::CapacityExhausted {
            pool: "meshes",
            capacity: 16,
        };
        assert_eq!(err.to_string(), "pool 'meshes' is at capacity (16 slots)");
    }

    #[test]
    fn test_missing_service_message_names_the_type() {
        let err = ContextError::MissingService { type_name: "Foo" };
        assert_eq!(err.to_string(), "no service of type `Foo` is registered");
    }
}
