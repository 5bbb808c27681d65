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

//! Fixed-capacity object pool.

use super::slot::{PoolMut, PoolRef, Slot};
use super::FreeOnUnwind;
use std::fmt;
use tessera_core::{Handle, HandleIter, HandleSet, PoolError};

/// A pool of at most `N` objects of type `T`, keyed by [`Handle`].
///
/// All storage is allocated up front. Every operation except
/// [`clear`](HandleObjectSet::clear) takes `&self` and may be called from
/// several threads at once.
pub struct HandleObjectSet<T, const N: usize> {
    handles: HandleSet<N>,
    slots: Box<[Slot<T>]>,
}

impl<T, const N: usize> HandleObjectSet<T, N> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::with_label(std::any::type_name::<T>())
    }

    /// Creates an empty pool whose diagnostics mention `label`.
    pub fn with_label(label: &'static str) -> Self {
        Self {
            handles: HandleSet::with_label(label),
            slots: (0..N).map(|_| Slot::vacant()).collect(),
        }
    }

    /// Stores `value` and returns its handle.
    ///
    /// Returns [`Handle::INVALID`] and drops `value` when the pool is full.
    pub fn create(&self, value: T) -> Handle {
        self.create_with(|| value)
    }

    /// Like [`create`](Self::create), reporting a full pool as an error.
    pub fn try_create(&self, value: T) -> Result<Handle, PoolError> {
        self.try_create_with(|| Ok(value))
    }

    /// Allocates a handle, then builds the object in its slot.
    ///
    /// `make` is not called when the pool is full. If it panics, the handle
    /// is released before the panic propagates.
    pub fn create_with(&self, make: impl FnOnce() -> T) -> Handle {
        let handle = self.handles.create();
        if !handle.is_valid() {
            return handle;
        }
        let guard = FreeOnUnwind::new(&self.handles, handle);
        let value = make();
        guard.disarm();
        self.slots[handle.index() as usize].construct(handle, value);
        handle
    }

    /// Allocates a handle, then runs a fallible constructor. The handle is
    /// released again when `make` fails or panics.
    pub fn try_create_with<E: From<PoolError>>(
        &self,
        make: impl FnOnce() -> Result<T, E>,
    ) -> Result<Handle, E> {
        let handle = self.handles.try_create()?;
        let guard = FreeOnUnwind::new(&self.handles, handle);
        let value = make()?;
        guard.disarm();
        self.slots[handle.index() as usize].construct(handle, value);
        Ok(handle)
    }

    /// Shared access to the object behind `handle`, or `None` if it is dead.
    pub fn fetch(&self, handle: Handle) -> Option<PoolRef<'_, T>> {
        self.slots.get(handle.index() as usize)?.read(handle)
    }

    /// Exclusive access to the object behind `handle`, or `None` if it is dead.
    pub fn fetch_mut(&self, handle: Handle) -> Option<PoolMut<'_, T>> {
        self.slots.get(handle.index() as usize)?.write(handle)
    }

    /// Returns `true` if `handle` is alive.
    pub fn is_alive(&self, handle: Handle) -> bool {
        self.handles.is_alive(handle)
    }

    /// Drops the object behind `handle` and recycles its slot. Returns
    /// `false` for dead or foreign handles.
    ///
    /// Blocks until outstanding guards on this object are released.
    pub fn free(&self, handle: Handle) -> bool {
        match self.slots.get(handle.index() as usize) {
            Some(slot) => slot.destroy(handle, &self.handles),
            None => false,
        }
    }

    /// Drops every live object and empties the pool. Handles issued before
    /// the clear stay dead.
    pub fn clear(&mut self) {
        let mut dropped = 0usize;
        for slot in self.slots.iter() {
            if slot.evict() {
                dropped += 1;
            }
        }
        self.handles.clear();
        log::debug!("Pool '{}' cleared ({dropped} objects dropped)", self.label());
    }

    /// Number of live objects.
    pub fn size(&self) -> usize {
        self.handles.size()
    }

    /// Returns `true` when the pool holds no object.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// The maximum number of live objects.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// The label used in diagnostics.
    pub fn label(&self) -> &'static str {
        tessera_core::HandleSource::label(&self.handles)
    }

    /// Walks the handles of live objects.
    pub fn iter(&self) -> HandleIter<'_, HandleSet<N>> {
        self.handles.iter()
    }
}

impl<T, const N: usize> Default for HandleObjectSet<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a HandleObjectSet<T, N> {
    type Item = Handle;
    type IntoIter = HandleIter<'a, HandleSet<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, const N: usize> fmt::Debug for HandleObjectSet<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleObjectSet")
            .field("label", &self.label())
            .field("size", &self.size())
            .field("capacity", &N)
            .finish()
    }
}
