//! In-memory unit trees for embedded applications and tests.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ResolveError, RoutingSurfaceRef, UnitDescriptor, UnitLocation, UnitResolver};
use crate::capabilities::CapabilityRef;
use crate::surface::{validate_prefix, RouteProvider};

/// A unit declared in code. Children are kept sorted and unique by name.
pub struct StaticUnit {
    name: String,
    description: Option<String>,
    router: Option<RoutingSurfaceRef>,
    shared: Vec<(String, Option<Arc<dyn Any + Send + Sync>>)>,
    features: BTreeMap<String, StaticUnit>,
}

impl StaticUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            router: None,
            shared: Vec::new(),
            features: BTreeMap::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Give the unit a routing surface mounted under `prefix`.
    pub fn router(mut self, prefix: impl Into<String>, provider: impl RouteProvider + 'static) -> Self {
        self.router = Some(RoutingSurfaceRef {
            prefix: prefix.into(),
            tags: Vec::new(),
            provider: Arc::new(provider),
        });
        self
    }

    /// Tags of the routing surface; ignored for units without one.
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        if let Some(router) = self.router.as_mut() {
            router.tags = tags.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Declare a shared module with no bound value.
    pub fn shared(mut self, name: impl Into<String>) -> Self {
        self.shared.push((name.into(), None));
        self
    }

    /// Declare a shared module bound to `value`.
    pub fn provide<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: Arc<T>) -> Self {
        let value: Arc<dyn Any + Send + Sync> = value;
        self.shared.push((name.into(), Some(value)));
        self
    }

    /// Add a child unit, replacing any child with the same name.
    pub fn feature(mut self, unit: StaticUnit) -> Self {
        self.features.insert(unit.name.clone(), unit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct StaticResolver {
    root: StaticUnit,
}

impl StaticResolver {
    pub fn new(root: StaticUnit) -> Self {
        Self { root }
    }

    pub fn root_location(&self) -> UnitLocation {
        UnitLocation::root(self.root.name.as_str())
    }

    fn find(&self, location: &UnitLocation) -> Option<&StaticUnit> {
        if location.root_name() != self.root.name {
            return None;
        }
        location
            .segments()
            .iter()
            .try_fold(&self.root, |unit, segment| unit.features.get(segment))
    }
}

impl UnitResolver for StaticResolver {
    fn resolve(&self, location: &UnitLocation) -> Result<UnitDescriptor, ResolveError> {
        let unit = self.find(location).ok_or_else(|| ResolveError::MissingUnit {
            location: location.clone(),
        })?;

        let mut descriptor = UnitDescriptor::new(location.clone(), location.to_string());
        descriptor.description = unit.description.clone();
        descriptor.child_locations = unit.features.keys().map(|name| location.child(name.as_str())).collect();
        descriptor.declared_capabilities = unit
            .shared
            .iter()
            .map(|(name, value)| {
                let capability = CapabilityRef::new(name.as_str(), location.clone());
                match value {
                    Some(value) => capability.with_erased_instance(value.clone()),
                    None => capability,
                }
            })
            .collect();

        if let Some(router) = &unit.router {
            if let Err(reason) = validate_prefix(&router.prefix) {
                return Err(ResolveError::MalformedUnit {
                    location: location.clone(),
                    reason: format!("invalid router prefix: {}", reason),
                    partial: Box::new(descriptor),
                });
            }
            descriptor.surface = Some(router.clone());
        }
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{from_fn, RouteSurface, SurfaceError, UnitContext};

    fn empty_provider() -> impl RouteProvider {
        from_fn(|_ctx: &UnitContext<'_>| -> Result<RouteSurface, SurfaceError> {
            Ok(RouteSurface::new())
        })
    }

    #[test]
    fn test_children_sorted_regardless_of_registration_order() {
        let resolver = StaticResolver::new(
            StaticUnit::new("app")
                .feature(StaticUnit::new("gamma"))
                .feature(StaticUnit::new("alpha"))
                .feature(StaticUnit::new("beta")),
        );
        let descriptor = resolver.resolve(&resolver.root_location()).unwrap();
        let names: Vec<&str> = descriptor.child_locations.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_nested_lookup_and_missing() {
        let resolver = StaticResolver::new(
            StaticUnit::new("app").feature(
                StaticUnit::new("a")
                    .router("/a", empty_provider())
                    .tags(["a"])
                    .feature(StaticUnit::new("b").shared("config")),
            ),
        );
        let root = resolver.root_location();
        let b = resolver.resolve(&root.child("a").child("b")).unwrap();
        assert_eq!(b.declared_capabilities.len(), 1);
        assert!(!b.has_routing_surface());

        let a = resolver.resolve(&root.child("a")).unwrap();
        assert_eq!(a.surface.as_ref().map(|s| s.prefix.as_str()), Some("/a"));

        assert!(matches!(
            resolver.resolve(&root.child("nope")),
            Err(ResolveError::MissingUnit { .. })
        ));
        assert!(matches!(
            resolver.resolve(&UnitLocation::root("other")),
            Err(ResolveError::MissingUnit { .. })
        ));
    }

    #[test]
    fn test_invalid_prefix_is_malformed() {
        let resolver = StaticResolver::new(
            StaticUnit::new("app")
                .feature(StaticUnit::new("x").router("x", empty_provider()).feature(StaticUnit::new("y"))),
        );
        match resolver.resolve(&UnitLocation::root("app").child("x")) {
            Err(ResolveError::MalformedUnit { partial, .. }) => {
                assert_eq!(partial.child_locations.len(), 1);
                assert!(!partial.has_routing_surface());
            }
            other => panic!("expected malformed unit, got {:?}", other),
        }
    }
}
