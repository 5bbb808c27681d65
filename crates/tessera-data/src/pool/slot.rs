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

//! A single storage slot and the guards that borrow it.

use std::ops::{Deref, DerefMut};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tessera_core::{Handle, HandleSource};

/// The object living in a slot, tagged with the version of the handle that
/// created it.
struct Occupant<T> {
    version: u32,
    value: T,
}

/// One pool entry. Holds a constructed `T` iff the matching handle is alive.
pub(crate) struct Slot<T> {
    cell: RwLock<Option<Occupant<T>>>,
}

impl<T> Slot<T> {
    pub(crate) fn vacant() -> Self {
        Self {
            cell: RwLock::new(None),
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, Option<Occupant<T>>> {
        self.cell.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, Option<Occupant<T>>> {
        self.cell.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` for a handle that was just allocated.
    pub(crate) fn construct(&self, handle: Handle, value: T) {
        let mut cell = self.write_lock();
        debug_assert!(cell.is_none(), "constructing over a live object");
        *cell = Some(Occupant {
            version: handle.version(),
            value,
        });
    }

    pub(crate) fn read(&self, handle: Handle) -> Option<PoolRef<'_, T>> {
        let guard = self.read_lock();
        match guard.as_ref() {
            Some(occupant) if occupant.version == handle.version() => Some(PoolRef { guard }),
            _ => None,
        }
    }

    pub(crate) fn write(&self, handle: Handle) -> Option<PoolMut<'_, T>> {
        let guard = self.write_lock();
        match guard.as_ref() {
            Some(occupant) if occupant.version == handle.version() => Some(PoolMut { guard }),
            _ => None,
        }
    }

    /// Drops the object owned by `handle`, then releases the handle.
    ///
    /// The write lock is held across both steps: outstanding guards finish
    /// first, and a concurrent `create` that recycles the index cannot store
    /// its object before the old one is gone.
    pub(crate) fn destroy<S: HandleSource + ?Sized>(&self, handle: Handle, source: &S) -> bool {
        let mut cell = self.write_lock();
        match cell.as_ref() {
            Some(occupant) if occupant.version == handle.version() => {}
            _ => return false,
        }
        drop(cell.take());
        source.free(handle)
    }

    /// Drops whatever object is stored, regardless of version.
    pub(crate) fn evict(&self) -> bool {
        self.write_lock().take().is_some()
    }
}

/// Shared access to a pooled object.
///
/// While the guard lives, `free` on the same handle blocks. Drop the guard
/// before freeing the handle from the same thread.
pub struct PoolRef<'a, T> {
    guard: RwLockReadGuard<'a, Option<Occupant<T>>>,
}

impl<T> Deref for PoolRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.guard.as_ref() {
            Some(occupant) => &occupant.value,
            None => unreachable!("PoolRef is only built over an occupied slot"),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PoolRef<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&**self, f)
    }
}

/// Exclusive access to a pooled object.
pub struct PoolMut<'a, T> {
    guard: RwLockWriteGuard<'a, Option<Occupant<T>>>,
}

impl<T> Deref for PoolMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.guard.as_ref() {
            Some(occupant) => &occupant.value,
            None => unreachable!("PoolMut is only built over an occupied slot"),
        }
    }
}

impl<T> DerefMut for PoolMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.guard.as_mut() {
            Some(occupant) => &mut occupant.value,
            None => unreachable!("PoolMut is only built over an occupied slot"),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PoolMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&**self, f)
    }
}
