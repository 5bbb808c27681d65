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

//! Fixed-capacity and growable handle sets.

use super::{Handle, HandleIter, HandleSource};
use crate::error::PoolError;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Version bookkeeping shared by both set flavours.
///
/// Every index below `versions.len()` is either on `free` (even version) or
/// allocated (odd version), never both.
#[derive(Debug)]
struct SlotTable {
    versions: Vec<u32>,
    free: Vec<u32>,
    alive: usize,
}

impl SlotTable {
    fn fixed(capacity: usize) -> Self {
        Self {
            versions: vec![0; capacity],
            // Reversed so that index 0 is handed out first.
            free: (0..capacity as u32).rev().collect(),
            alive: 0,
        }
    }

    fn growable() -> Self {
        Self {
            versions: Vec::new(),
            free: Vec::new(),
            alive: 0,
        }
    }

    fn is_alive(&self, handle: Handle) -> bool {
        self.versions
            .get(handle.index() as usize)
            .is_some_and(|&version| version & 1 == 1 && version == handle.version())
    }

    /// Marks a dead slot alive again and returns its new handle.
    fn revive(&mut self, index: u32, label: &'static str) -> Handle {
        let slot = &mut self.versions[index as usize];
        debug_assert_eq!(*slot & 1, 0, "reviving a live slot");
        let next = match slot.checked_add(1) {
            Some(next) if next != u32::MAX => next,
            _ => fatal(label, &format!("version overflow on slot {index}")),
        };
        *slot = next;
        self.alive += 1;
        Handle::new(index, next)
    }

    fn release(&mut self, handle: Handle) -> bool {
        if !self.is_alive(handle) {
            return false;
        }
        self.versions[handle.index() as usize] += 1;
        self.free.push(handle.index());
        self.alive -= 1;
        true
    }

    fn next_alive(&self, from: u32) -> Option<Handle> {
        self.versions
            .iter()
            .enumerate()
            .skip(from as usize)
            .find(|(_, version)| **version & 1 == 1)
            .map(|(index, version)| Handle::new(index as u32, *version))
    }

    /// Kills every alive slot. Versions are bumped rather than reset so that
    /// handles issued before the clear stay dead forever.
    fn kill_all(&mut self) {
        for version in &mut self.versions {
            if *version & 1 == 1 {
                *version += 1;
            }
        }
        self.free = (0..self.versions.len() as u32).rev().collect();
        self.alive = 0;
    }
}

fn fatal(label: &'static str, what: &str) -> ! {
    log::error!("Handle set '{label}': {what}");
    panic!("handle set '{label}': {what}");
}

fn lock(table: &Mutex<SlotTable>) -> MutexGuard<'_, SlotTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A thread-safe handle set with room for exactly `N` simultaneously alive
/// handles.
///
/// Every operation except [`clear`](HandleSet::clear) takes `&self` and is
/// serialized by an internal mutex, so the set can be shared across threads
/// without external locking.
#[derive(Debug)]
pub struct HandleSet<const N: usize> {
    label: &'static str,
    table: Mutex<SlotTable>,
}

impl<const N: usize> HandleSet<N> {
    /// Creates an empty set labelled after its capacity.
    pub fn new() -> Self {
        Self::with_label("HandleSet")
    }

    /// Creates an empty set whose capacity diagnostics mention `label`.
    ///
    /// # Panics
    ///
    /// If `N` does not fit below [`Handle::INVALID_INDEX`].
    pub fn with_label(label: &'static str) -> Self {
        if N >= Handle::INVALID_INDEX as usize {
            fatal(label, &format!("capacity {N} exceeds the index space"));
        }
        Self {
            label,
            table: Mutex::new(SlotTable::fixed(N)),
        }
    }

    /// Allocates a handle, or returns [`Handle::INVALID`] when all `N` slots
    /// are alive. Callers must check the result.
    pub fn create(&self) -> Handle {
        let mut table = lock(&self.table);
        match table.free.pop() {
            Some(index) => table.revive(index, self.label),
            None => Handle::INVALID,
        }
    }

    /// Like [`create`](Self::create), but reports exhaustion as an error.
    pub fn try_create(&self) -> Result<Handle, PoolError> {
        let handle = self.create();
        if handle.is_valid() {
            Ok(handle)
        } else {
            Err(PoolError::CapacityExhausted {
                pool: self.label,
                capacity: N,
            })
        }
    }

    /// Returns `true` if `handle` is currently alive. The answer may be stale
    /// as soon as the lock is released.
    pub fn is_alive(&self, handle: Handle) -> bool {
        lock(&self.table).is_alive(handle)
    }

    /// Kills `handle` and recycles its index. A double free is harmless and
    /// returns `false`.
    pub fn free(&self, handle: Handle) -> bool {
        lock(&self.table).release(handle)
    }

    /// Number of currently alive handles.
    pub fn size(&self) -> usize {
        lock(&self.table).alive
    }

    /// Returns `true` when no handle is alive.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The maximum number of simultaneously alive handles.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Kills every handle. Handles issued before the clear stay dead.
    ///
    /// Takes `&mut self`: this is the one operation that is not safe against
    /// concurrent `create`/`free`.
    pub fn clear(&mut self) {
        self.table
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .kill_all();
    }

    /// Walks the alive handles, locking once per step.
    pub fn iter(&self) -> HandleIter<'_, Self> {
        HandleIter::new(self)
    }
}

impl<const N: usize> Default for HandleSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> HandleSource for HandleSet<N> {
    fn create(&self) -> Handle {
        HandleSet::create(self)
    }

    fn is_alive(&self, handle: Handle) -> bool {
        HandleSet::is_alive(self, handle)
    }

    fn free(&self, handle: Handle) -> bool {
        HandleSet::free(self, handle)
    }

    fn size(&self) -> usize {
        HandleSet::size(self)
    }

    fn clear(&mut self) {
        HandleSet::clear(self)
    }

    fn next_alive(&self, from: u32) -> Option<Handle> {
        lock(&self.table).next_alive(from)
    }

    fn label(&self) -> &'static str {
        self.label
    }
}

impl<'a, const N: usize> IntoIterator for &'a HandleSet<N> {
    type Item = Handle;
    type IntoIter = HandleIter<'a, HandleSet<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A thread-safe handle set that grows on demand.
///
/// Same semantics as [`HandleSet`] without a capacity check: only the
/// invalid sentinel bounds the index space, and reaching it is fatal.
#[derive(Debug)]
pub struct DynamicHandleSet {
    label: &'static str,
    table: Mutex<SlotTable>,
}

impl DynamicHandleSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::with_label("DynamicHandleSet")
    }

    /// Creates an empty set whose diagnostics mention `label`.
    pub fn with_label(label: &'static str) -> Self {
        Self {
            label,
            table: Mutex::new(SlotTable::growable()),
        }
    }

    /// Allocates a handle, recycling a dead index when one is available and
    /// appending a new slot otherwise.
    ///
    /// # Panics
    ///
    /// When the index space (every index below [`Handle::INVALID_INDEX`]) or
    /// the version space of a recycled slot is exhausted.
    pub fn create(&self) -> Handle {
        let mut table = lock(&self.table);
        let index = match table.free.pop() {
            Some(index) => index,
            None => {
                let index = table.versions.len();
                if index >= Handle::INVALID_INDEX as usize {
                    fatal(self.label, "index space exhausted");
                }
                table.versions.push(0);
                index as u32
            }
        };
        table.revive(index, self.label)
    }

    /// Returns `true` if `handle` is currently alive.
    pub fn is_alive(&self, handle: Handle) -> bool {
        lock(&self.table).is_alive(handle)
    }

    /// Kills `handle` and recycles its index. A double free returns `false`.
    pub fn free(&self, handle: Handle) -> bool {
        lock(&self.table).release(handle)
    }

    /// Number of currently alive handles.
    pub fn size(&self) -> usize {
        lock(&self.table).alive
    }

    /// Returns `true` when no handle is alive.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of slots ever allocated (alive or dead).
    pub fn allocated_slots(&self) -> usize {
        lock(&self.table).versions.len()
    }

    /// Kills every handle. Requires exclusive access.
    pub fn clear(&mut self) {
        self.table
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .kill_all();
    }

    /// Walks the alive handles, locking once per step.
    pub fn iter(&self) -> HandleIter<'_, Self> {
        HandleIter::new(self)
    }
}

impl Default for DynamicHandleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleSource for DynamicHandleSet {
    fn create(&self) -> Handle {
        DynamicHandleSet::create(self)
    }

    fn is_alive(&self, handle: Handle) -> bool {
        DynamicHandleSet::is_alive(self, handle)
    }

    fn free(&self, handle: Handle) -> bool {
        DynamicHandleSet::free(self, handle)
    }

    fn size(&self) -> usize {
        DynamicHandleSet::size(self)
    }

    fn clear(&mut self) {
        DynamicHandleSet::clear(self)
    }

    fn next_alive(&self, from: u32) -> Option<Handle> {
        lock(&self.table).next_alive(from)
    }

    fn label(&self) -> &'static str {
        self.label
    }
}

impl<'a> IntoIterator for &'a DynamicHandleSet {
    type Item = Handle;
    type IntoIter = HandleIter<'a, DynamicHandleSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_create_yields_odd_versions() {
        let set = HandleSet::<4>::new();
        let handle = set.create();
        assert_eq!(handle.index(), 0);
        assert_eq!(handle.version() & 1, 1);
        assert!(set.is_alive(handle));
        assert_eq!(set.size(), 1);
    }

    #[test]
    fn test_double_free_returns_false() {
        let set = HandleSet::<2>::new();
        let handle = set.create();
        assert!(set.free(handle));
        assert!(!set.free(handle));
        assert!(!set.is_alive(handle));
        assert_eq!(set.size(), 0);
    }

    #[test]
    fn test_recycled_index_gets_strictly_greater_version() {
        let set = HandleSet::<1>::new();
        let first = set.create();
        assert!(set.free(first));
        let second = set.create();
        assert_eq!(second.index(), first.index());
        assert!(second.version() > first.version());
        assert!(!set.is_alive(first));
        assert!(set.is_alive(second));
    }

    #[test]
    fn test_fixed_capacity_boundary() {
        let set = HandleSet::<3>::with_label("boundary");
        let handles: Vec<_> = (0..3).map(|_| set.create()).collect();
        assert!(handles.iter().all(|h| h.is_valid()));

        assert_eq!(set.create(), Handle::INVALID);
        assert_eq!(set.size(), 3);
        assert_eq!(
            set.try_create(),
            Err(PoolError::CapacityExhausted {
                pool: "boundary",
                capacity: 3
            })
        );

        assert!(set.free(handles[1]));
        let again = set.create();
        assert!(again.is_valid());
        assert_eq!(again.index(), handles[1].index());
    }

    #[test]
    fn test_zero_capacity_set_never_allocates() {
        let set = HandleSet::<0>::new();
        assert!(!set.create().is_valid());
        assert!(set.is_empty());
    }

    #[test]
    fn test_stale_and_foreign_handles_are_not_alive() {
        let set = HandleSet::<2>::new();
        assert!(!set.is_alive(Handle::INVALID));
        assert!(!set.is_alive(Handle::new(1, 1)));
        assert!(!set.is_alive(Handle::new(57, 1)));
        let handle = set.create();
        assert!(!set.is_alive(Handle::new(handle.index(), handle.version() + 2)));
        assert!(!set.free(Handle::new(99, 1)));
    }

    #[test]
    fn test_iteration_skips_dead_slots() {
        let set = HandleSet::<5>::new();
        let handles: Vec<_> = (0..5).map(|_| set.create()).collect();
        set.free(handles[0]);
        set.free(handles[3]);

        let alive: Vec<_> = set.iter().collect();
        assert_eq!(alive, vec![handles[1], handles[2], handles[4]]);
    }

    #[test]
    fn test_clear_kills_outstanding_handles_forever() {
        let mut set = HandleSet::<2>::new();
        let a = set.create();
        let b = set.create();
        set.clear();
        assert_eq!(set.size(), 0);
        assert!(!set.is_alive(a));
        assert!(!set.is_alive(b));

        let c = set.create();
        let d = set.create();
        assert!(c.is_valid() && d.is_valid());
        assert_ne!(c, a);
        assert_ne!(d, b);
        assert!(!set.is_alive(a));
    }

    #[test]
    #[should_panic(expected = "version overflow")]
    fn test_version_overflow_is_fatal() {
        let set = HandleSet::<1>::with_label("overflow");
        lock(&set.table).versions[0] = u32::MAX - 1;
        let _ = set.create();
    }

    #[test]
    fn test_dynamic_set_grows_and_recycles() {
        let set = DynamicHandleSet::new();
        let handles: Vec<_> = (0..100).map(|_| set.create()).collect();
        assert_eq!(set.size(), 100);
        assert_eq!(set.allocated_slots(), 100);

        for handle in &handles[..50] {
            assert!(set.free(*handle));
        }
        let recycled: Vec<_> = (0..50).map(|_| set.create()).collect();
        assert_eq!(set.allocated_slots(), 100);
        assert!(recycled.iter().all(|h| h.index() < 50 && h.version() == 3));
        assert!(handles[..50].iter().all(|h| !set.is_alive(*h)));
    }

    #[test]
    fn test_dynamic_clear_then_iterate_is_empty() {
        let mut set = DynamicHandleSet::with_label("dyn");
        for _ in 0..10 {
            set.create();
        }
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.iter().count(), 0);
    }

    #[test]
    fn test_concurrent_create_free_never_duplicates_live_handles() {
        let set = Arc::new(DynamicHandleSet::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let set = Arc::clone(&set);
                thread::spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..1000 {
                        let handle = set.create();
                        if i % 3 == 0 {
                            assert!(set.free(handle));
                        } else {
                            kept.push(handle);
                        }
                    }
                    kept
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            for handle in worker.join().expect("worker panicked") {
                assert!(set.is_alive(handle));
                assert!(seen.insert(handle.index()), "index handed out twice");
            }
        }
        assert_eq!(set.size(), seen.len());
    }
}
