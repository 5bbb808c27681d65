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

//! Object pools keyed by generational handles.

mod dynamic;
mod fixed;
mod slot;

pub use dynamic::DynamicHandleObjectSet;
pub use fixed::HandleObjectSet;
pub use slot::{PoolMut, PoolRef};

use tessera_core::{Handle, HandleSource};

/// Frees a freshly allocated handle unless construction completes.
///
/// Guards the window between "identity allocated" and "object stored" so a
/// panicking constructor does not leak the slot.
struct FreeOnUnwind<'a, S: HandleSource + ?Sized> {
    source: &'a S,
    handle: Handle,
    armed: bool,
}

impl<'a, S: HandleSource + ?Sized> FreeOnUnwind<'a, S> {
    fn new(source: &'a S, handle: Handle) -> Self {
        Self {
            source,
            handle,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<S: HandleSource + ?Sized> Drop for FreeOnUnwind<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!(
                "Pool '{}': constructor failed, releasing {}",
                self.source.label(),
                self.handle
            );
            self.source.free(self.handle);
        }
    }
}
