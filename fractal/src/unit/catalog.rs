//! Static registration of route providers and shared-module values.
//!
//! The directory layout says which units and shared modules exist; the
//! catalog binds them to code.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::UnitLocation;
use crate::surface::RouteProvider;

#[derive(Clone, Default)]
pub struct UnitCatalog {
    providers: HashMap<UnitLocation, Arc<dyn RouteProvider>>,
    instances: HashMap<(UnitLocation, String), Arc<dyn Any + Send + Sync>>,
}

impl UnitCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the route provider of the unit at `location`. A second
    /// registration for the same location replaces the first.
    pub fn register(
        &mut self,
        location: UnitLocation,
        provider: impl RouteProvider + 'static,
    ) -> &mut Self {
        if self
            .providers
            .insert(location.clone(), Arc::new(provider))
            .is_some()
        {
            tracing::warn!(unit = %location, "route provider registered twice; keeping the latest");
        }
        self
    }

    /// Bind a value to the shared module `name` declared by the unit at `location`.
    pub fn provide<T: Any + Send + Sync>(
        &mut self,
        location: UnitLocation,
        name: impl Into<String>,
        value: Arc<T>,
    ) -> &mut Self {
        self.instances.insert((location, name.into()), value);
        self
    }

    pub fn provider(&self, location: &UnitLocation) -> Option<Arc<dyn RouteProvider>> {
        self.providers.get(location).cloned()
    }

    pub fn instance(&self, location: &UnitLocation, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.instances
            .get(&(location.clone(), name.to_string()))
            .cloned()
    }

    pub fn contains(&self, location: &UnitLocation) -> bool {
        self.providers.contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
