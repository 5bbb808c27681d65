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

//! # Tessera Core
//!
//! Foundational crate containing generational handles, the handle sets that
//! allocate and validate them, and the explicit engine context used to wire
//! subsystems together.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod handle;
pub mod service_registry;

pub use context::EngineContext;
pub use error::{ContextError, PoolError};
pub use handle::{DynamicHandleSet, Handle, HandleIter, HandleSet, HandleSource};
pub use service_registry::ServiceRegistry;
