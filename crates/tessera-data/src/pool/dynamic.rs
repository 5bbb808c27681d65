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

//! Growable object pool backed by fixed-size chunks.

use super::slot::{PoolMut, PoolRef, Slot};
use super::FreeOnUnwind;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tessera_core::{DynamicHandleSet, Handle, HandleIter, HandleSource};

type Chunk<T> = Arc<[Slot<T>]>;

/// A pool of objects of type `T` that grows in chunks of `CHUNK` slots.
///
/// Handle index `i` lives in chunk `i / CHUNK` at offset `i % CHUNK`. The
/// chunk directory sits behind its own read-write lock, separate from the
/// handle set's mutex. Lookups only take the read side, and new chunks are
/// built before the write lock is taken, so growth holds it just long enough
/// to append a pointer. Chunks are never moved or released while the pool is
/// shared.
pub struct DynamicHandleObjectSet<T, const CHUNK: usize = 64> {
    handles: DynamicHandleSet,
    chunks: RwLock<Vec<Chunk<T>>>,
    chunk_count: AtomicUsize,
}

impl<T, const CHUNK: usize> DynamicHandleObjectSet<T, CHUNK> {
    /// Creates an empty pool. No chunk is allocated until the first `create`.
    pub fn new() -> Self {
        Self::with_label(std::any::type_name::<T>())
    }

    /// Creates an empty pool whose diagnostics mention `label`.
    ///
    /// # Panics
    ///
    /// If `CHUNK` is zero.
    pub fn with_label(label: &'static str) -> Self {
        assert!(CHUNK > 0, "pool '{label}': chunk size must be non-zero");
        Self {
            handles: DynamicHandleSet::with_label(label),
            chunks: RwLock::new(Vec::new()),
            chunk_count: AtomicUsize::new(0),
        }
    }

    /// Makes sure the chunk holding `index` exists.
    fn reserve(&self, index: u32) {
        let needed = index as usize / CHUNK + 1;
        while self.chunk_count.load(Ordering::Acquire) < needed {
            let fresh: Chunk<T> = (0..CHUNK).map(|_| Slot::vacant()).collect();
            let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
            // Another thread may have grown the directory meanwhile, in which
            // case `fresh` is dropped unused.
            if chunks.len() < needed {
                chunks.push(fresh);
                self.chunk_count.store(chunks.len(), Ordering::Release);
                log::trace!(
                    "Pool '{}' grew to {} chunks",
                    self.handles.label(),
                    chunks.len()
                );
            }
        }
    }

    fn slot(&self, index: u32) -> Option<&Slot<T>> {
        let index = index as usize;
        let chunks = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
        let slot: *const Slot<T> = chunks.get(index / CHUNK)?.get(index % CHUNK)?;
        drop(chunks);
        // SAFETY: the slot lives in the heap block of an `Arc<[Slot<T>]>`.
        // Growing the directory moves the `Arc` pointers, never the blocks,
        // and chunks are only dropped together with `self`, so the block
        // outlives the `&self` borrow the returned reference is tied to.
        Some(unsafe { &*slot })
    }

    /// Stores `value` and returns its handle, growing the pool if needed.
    pub fn create(&self, value: T) -> Handle {
        self.create_with(|| value)
    }

    /// Allocates a handle, grows storage if needed, then builds the object.
    /// If `make` panics, the handle is released before the panic propagates.
    pub fn create_with(&self, make: impl FnOnce() -> T) -> Handle {
        let handle = self.handles.create();
        let guard = FreeOnUnwind::new(&self.handles, handle);
        self.reserve(handle.index());
        let value = make();
        guard.disarm();
        self.construct(handle, value);
        handle
    }

    /// Allocates a handle and runs a fallible constructor, releasing the
    /// handle again if it fails or panics.
    pub fn try_create_with<E>(&self, make: impl FnOnce() -> Result<T, E>) -> Result<Handle, E> {
        let handle = self.handles.create();
        let guard = FreeOnUnwind::new(&self.handles, handle);
        self.reserve(handle.index());
        let value = make()?;
        guard.disarm();
        self.construct(handle, value);
        Ok(handle)
    }

    fn construct(&self, handle: Handle, value: T) {
        match self.slot(handle.index()) {
            Some(slot) => slot.construct(handle, value),
            None => unreachable!("storage for {handle} was reserved before construction"),
        }
    }

    /// Shared access to the object behind `handle`, or `None` if it is dead.
    pub fn fetch(&self, handle: Handle) -> Option<PoolRef<'_, T>> {
        self.slot(handle.index())?.read(handle)
    }

    /// Exclusive access to the object behind `handle`, or `None` if it is dead.
    pub fn fetch_mut(&self, handle: Handle) -> Option<PoolMut<'_, T>> {
        self.slot(handle.index())?.write(handle)
    }

    /// Returns `true` if `handle` is alive.
    pub fn is_alive(&self, handle: Handle) -> bool {
        self.handles.is_alive(handle)
    }

    /// Drops the object behind `handle` and recycles its slot. Blocks until
    /// outstanding guards on this object are released.
    pub fn free(&self, handle: Handle) -> bool {
        match self.slot(handle.index()) {
            Some(slot) => slot.destroy(handle, &self.handles),
            None => false,
        }
    }

    /// Drops every live object and empties the pool. Allocated chunks are
    /// kept for reuse.
    pub fn clear(&mut self) {
        let dropped = self
            .chunks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flat_map(|chunk| chunk.iter())
            .filter(|slot| slot.evict())
            .count();
        self.handles.clear();
        log::debug!(
            "Pool '{}' cleared ({dropped} objects dropped)",
            self.handles.label()
        );
    }

    /// Number of live objects.
    pub fn size(&self) -> usize {
        self.handles.size()
    }

    /// Returns `true` when the pool holds no object.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Number of allocated chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunk_count.load(Ordering::Acquire)
    }

    /// Number of objects that fit without growing.
    pub fn reserved_capacity(&self) -> usize {
        self.chunk_count() * CHUNK
    }

    /// The label used in diagnostics.
    pub fn label(&self) -> &'static str {
        self.handles.label()
    }

    /// Walks the handles of live objects.
    pub fn iter(&self) -> HandleIter<'_, DynamicHandleSet> {
        self.handles.iter()
    }
}

impl<T, const CHUNK: usize> Default for DynamicHandleObjectSet<T, CHUNK> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T, const CHUNK: usize> IntoIterator for &'a DynamicHandleObjectSet<T, CHUNK> {
    type Item = Handle;
    type IntoIter = HandleIter<'a, DynamicHandleSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, const CHUNK: usize> fmt::Debug for DynamicHandleObjectSet<T, CHUNK> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicHandleObjectSet")
            .field("label", &self.label())
            .field("size", &self.size())
            .field("chunks", &self.chunk_count())
            .finish()
    }
}
