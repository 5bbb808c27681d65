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

//! The engine context handed to subsystem constructors.

use crate::error::ContextError;
use crate::service_registry::ServiceRegistry;
use std::any::type_name;
use std::sync::Arc;

/// Explicit dependency-injection root.
///
/// Subsystems (the task scheduler, object pools, asset loaders, ...) are
/// registered once while the engine boots, then the context is passed to
/// whatever needs them. Nothing is stored in process-wide state.
#[derive(Debug, Default, Clone)]
pub struct EngineContext {
    services: ServiceRegistry,
}

impl EngineContext {
    /// Creates a context with no services.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with_service<T: Send + Sync + 'static>(mut self, service: T) -> Self {
        self.services.insert(service);
        self
    }

    /// Registers a service that the caller keeps a handle to.
    pub fn register_shared<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert_shared(service);
    }

    /// Looks up an optional service.
    pub fn service<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services.get::<T>()
    }

    /// Looks up a service the caller cannot work without.
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ContextError> {
        self.services
            .get::<T>()
            .ok_or(ContextError::MissingService {
                type_name: type_name::<T>(),
            })
    }

    /// The underlying registry.
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }
}
