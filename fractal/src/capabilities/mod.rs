//! Capabilities: shared modules a unit exposes to itself and its descendants.

pub mod cascade;

pub use cascade::cascade;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::unit::UnitLocation;

/// One declaration of a shared module.
///
/// Two refs with the same name occupy the same slot regardless of where they
/// were declared; the nearer declaration shadows the farther one.
#[derive(Clone)]
pub struct CapabilityRef {
    name: String,
    declared_at: UnitLocation,
    origin: Option<PathBuf>,
    instance: Option<Arc<dyn Any + Send + Sync>>,
}

impl CapabilityRef {
    pub fn new(name: impl Into<String>, declared_at: UnitLocation) -> Self {
        Self {
            name: name.into(),
            declared_at,
            origin: None,
            instance: None,
        }
    }

    /// Canonical on-disk location of the module, used for cycle checks.
    pub fn with_origin(mut self, origin: PathBuf) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_instance<T: Any + Send + Sync>(self, value: Arc<T>) -> Self {
        self.with_erased_instance(value)
    }

    pub fn with_erased_instance(mut self, value: Arc<dyn Any + Send + Sync>) -> Self {
        self.instance = Some(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_at(&self) -> &UnitLocation {
        &self.declared_at
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.clone()?.downcast::<T>().ok()
    }
}

impl fmt::Debug for CapabilityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRef")
            .field("name", &self.name)
            .field("declared_at", &self.declared_at)
            .field("origin", &self.origin)
            .field("bound", &self.instance.is_some())
            .finish()
    }
}

// Bound values are opaque; identity is the slot name plus where it was declared.
impl PartialEq for CapabilityRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.declared_at == other.declared_at
    }
}

impl Eq for CapabilityRef {}

/// Capabilities visible to a unit, keyed and ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    slots: BTreeMap<String, CapabilityRef>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// This set with `declared` layered on top. A declared name replaces the
    /// inherited slot wholesale; a name repeated within `declared` keeps its
    /// first occurrence.
    pub fn with_declared(&self, declared: &[CapabilityRef]) -> Self {
        let mut slots = self.slots.clone();
        let mut layered: Vec<&str> = Vec::with_capacity(declared.len());
        for capability in declared {
            if layered.contains(&capability.name()) {
                tracing::warn!(
                    capability = capability.name(),
                    unit = %capability.declared_at(),
                    "capability declared twice by the same unit; keeping the first declaration"
                );
                continue;
            }
            layered.push(capability.name());
            slots.insert(capability.name().to_string(), capability.clone());
        }
        Self { slots }
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityRef> {
        self.slots.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityRef> {
        self.slots.values()
    }
}
