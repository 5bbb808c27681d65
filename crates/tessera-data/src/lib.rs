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

//! # Tessera Data
//!
//! Typed object pools keyed by generational handles.
//!
//! [`HandleObjectSet`] stores up to `N` objects in storage allocated once at
//! construction. [`DynamicHandleObjectSet`] grows in fixed-size chunks.
//! Both delegate liveness to a handle set from `tessera-core` and hand out
//! lock guards instead of raw pointers, so an object can never be destroyed
//! while someone is still reading it.

#![warn(missing_docs)]

pub mod pool;

pub use pool::{DynamicHandleObjectSet, HandleObjectSet, PoolMut, PoolRef};
pub use tessera_core::{Handle, PoolError};
