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

//! Generational handles and the sets that allocate them.
//!
//! A [`Handle`] pairs a slot index with a version counter. The low bit of the
//! version encodes liveness: odd means the slot is alive, even means it is
//! dead. Freeing a slot bumps its version to the next even number and reusing
//! it bumps it again to the next odd number, so a stale handle pointing at a
//! recycled index never compares equal to the new occupant (the "ABA
//! problem").

mod set;

pub use set::{DynamicHandleSet, HandleSet};

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque reference to a pooled object.
///
/// Two handles with the same index are equal iff their versions match. The
/// handle whose index is [`Handle::INVALID_INDEX`] is never alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    index: u32,
    version: u32,
}

impl Handle {
    /// The sentinel index marking an invalid handle. Also bounds the index
    /// space and the version space of every handle set.
    pub const INVALID_INDEX: u32 = u32::MAX;

    /// A handle that never refers to anything.
    pub const INVALID: Handle = Handle {
        index: Self::INVALID_INDEX,
        version: 0,
    };

    /// Builds a handle from its raw parts.
    pub const fn new(index: u32, version: u32) -> Self {
        Self { index, version }
    }

    /// The slot index this handle points at.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// The version this handle was issued with.
    pub const fn version(self) -> u32 {
        self.version
    }

    /// Returns `false` for [`Handle::INVALID`] (or any handle carrying the
    /// sentinel index). A valid handle may still be dead.
    pub const fn is_valid(self) -> bool {
        self.index != Self::INVALID_INDEX
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}v{}", self.index, self.version)
        } else {
            f.write_str("#invalid")
        }
    }
}

/// The liveness bookkeeping contract shared by [`HandleSet`] and
/// [`DynamicHandleSet`].
///
/// Object pools are generic over this trait so the fixed and growable
/// variants share a single storage implementation.
pub trait HandleSource: Send + Sync {
    /// Allocates a fresh alive handle, or [`Handle::INVALID`] when the set is
    /// at capacity.
    fn create(&self) -> Handle;

    /// Returns `true` if `handle` is currently alive.
    fn is_alive(&self, handle: Handle) -> bool;

    /// Kills `handle`. Returns `false` if it was not alive.
    fn free(&self, handle: Handle) -> bool;

    /// Number of currently alive handles.
    fn size(&self) -> usize;

    /// Kills every handle. Requires exclusive access.
    fn clear(&mut self);

    /// The first alive handle whose index is `>= from`, if any.
    fn next_alive(&self, from: u32) -> Option<Handle>;

    /// The label used in capacity diagnostics.
    fn label(&self) -> &'static str;
}

/// Iterator over the alive handles of a [`HandleSource`].
///
/// Each step locks the set once, so every yielded handle was alive when it
/// was yielded. The walk as a whole is weakly consistent: handles created or
/// freed concurrently may or may not be observed.
pub struct HandleIter<'a, S: HandleSource + ?Sized> {
    source: &'a S,
    cursor: u32,
}

impl<'a, S: HandleSource + ?Sized> HandleIter<'a, S> {
    /// Starts a walk at index 0.
    pub fn new(source: &'a S) -> Self {
        Self { source, cursor: 0 }
    }
}

impl<S: HandleSource + ?Sized> Iterator for HandleIter<'_, S> {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        if self.cursor == Handle::INVALID_INDEX {
            return None;
        }
        let handle = self.source.next_alive(self.cursor)?;
        self.cursor = handle.index() + 1;
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_handle_is_default() {
        assert_eq!(Handle::default(), Handle::INVALID);
        assert!(!Handle::INVALID.is_valid());
        assert!(Handle::new(0, 1).is_valid());
    }

    #[test]
    fn test_equality_requires_matching_version() {
        assert_eq!(Handle::new(3, 5), Handle::new(3, 5));
        assert_ne!(Handle::new(3, 5), Handle::new(3, 7));
        assert_ne!(Handle::new(3, 5), Handle::new(4, 5));
    }

    #[test]
    fn test_display_format() {
        assert_eq!(Handle::new(2, 3).to_string(), "#2v3");
        assert_eq!(Handle::INVALID.to_string(), "#invalid");
    }

    #[test]
    fn test_serde_round_trip_keeps_version() {
        let handle = Handle::new(7, 11);
        let json = serde_json::to_string(&handle).unwrap();
        let back: Handle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
        assert_eq!(back.version(), 11);
    }
}
