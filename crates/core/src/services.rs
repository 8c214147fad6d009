//! Service configuration metadata
//!
//! Explicit registration data for dependency-injection containers: each
//! registered type carries one [`ServiceConfiguration`] naming the lifetime
//! a container should register it with. A type without its own entry
//! inherits the configuration of its nearest configured base.

use std::any::TypeId;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ReflectError, Result};
use crate::type_names;
use crate::types::{type_of, Reflect, TypeHandle, TypeInfo};

/// Lifetime of a registered service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceLifetime {
    /// A new instance per resolution
    Transient,
    /// One instance per scope
    Scoped,
    /// One instance per container
    Singleton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    pub lifetime: ServiceLifetime,
}

impl ServiceConfiguration {
    pub fn new(lifetime: ServiceLifetime) -> Self {
        Self { lifetime }
    }
}

/// Registered service configurations, in registration order
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: HashMap<TypeId, ServiceConfiguration>,
    order: Vec<TypeHandle>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a configuration to `T`
    ///
    /// # Errors
    ///
    /// [`ReflectError::DuplicateServiceConfiguration`] if `T` already has one.
    pub fn register<T: Reflect>(&mut self, lifetime: ServiceLifetime) -> Result<()> {
        let handle = TypeHandle::of::<T>();
        if self.entries.contains_key(&handle.id()) {
            return Err(ReflectError::DuplicateServiceConfiguration(
                type_names::of::<T>().to_string(),
            ));
        }
        self.entries
            .insert(handle.id(), ServiceConfiguration::new(lifetime));
        self.order.push(handle);
        Ok(())
    }

    /// Configuration declared on `T` itself
    pub fn declared_configuration_of<T: Reflect>(&self) -> Option<ServiceConfiguration> {
        self.entries.get(&TypeId::of::<T>()).copied()
    }

    /// Configuration of `T`, inherited from its bases when not declared
    pub fn configuration_of<T: Reflect>(&self) -> Option<ServiceConfiguration> {
        self.configuration_for(type_of::<T>())
    }

    pub fn configuration_for(&self, info: &TypeInfo) -> Option<ServiceConfiguration> {
        info.lineage()
            .find_map(|ty| self.entries.get(&ty.id()).copied())
    }

    /// Registered types with their configurations, in registration order
    pub fn iter(&self) -> impl Iterator<Item = (TypeHandle, ServiceConfiguration)> + '_ {
        self.order
            .iter()
            .filter_map(|handle| self.entries.get(&handle.id()).map(|config| (*handle, *config)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
