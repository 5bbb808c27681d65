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

//! A type-keyed registry of shared engine services.
//!
//! The [`ServiceRegistry`] replaces process-wide subsystem singletons: it is
//! built once at startup, stored inside an [`EngineContext`](crate::EngineContext)
//! and handed explicitly to the constructors that need a service.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// A registry of shared services keyed by [`TypeId`].
///
/// Services are stored as `Arc<dyn Any + Send + Sync>`, so a lookup hands out
/// a cheap clone that may outlive the registry itself.
///
/// # Example
///
/// ```rust
/// use tessera_core::service_registry::ServiceRegistry;
///
/// struct AudioMixer { voices: usize }
///
/// let mut registry = ServiceRegistry::new();
/// registry.insert(AudioMixer { voices: 32 });
///
/// let mixer = registry.get::<AudioMixer>().unwrap();
/// assert_eq!(mixer.voices, 32);
/// ```
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, (&'static str, Arc<dyn Any + Send + Sync>)>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Wraps `service` in an `Arc` and registers it, replacing any previous
    /// service of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, service: T) {
        self.insert_shared(Arc::new(service));
    }

    /// Registers an already shared service.
    pub fn insert_shared<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        log::debug!("Registering service `{}`", type_name::<T>());
        self.services
            .insert(TypeId::of::<T>(), (type_name::<T>(), service));
    }

    /// Returns a shared handle to the service of type `T`, if registered.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let (_, service) = self.services.get(&TypeId::of::<T>())?;
        Arc::clone(service).downcast::<T>().ok()
    }

    /// Returns `true` if a service of type `T` is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Type names of every registered service, sorted for stable output.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.services.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}
