//! Routing-surface contract between units and the composition engine.
//!
//! A unit with routes exposes a [`RouteProvider`]. During composition the
//! engine hands it a [`UnitContext`] carrying the unit's resolved capability
//! set, and the provider answers with a [`RouteSurface`]: the unit's routes,
//! relative to the unit's own prefix.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{self, MethodRouter};
use thiserror::Error;

use crate::capabilities::CapabilitySet;
use crate::unit::UnitLocation;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("invalid route path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("route {method} '{path}' is declared twice")]
    DuplicateRoute { method: Method, path: String },

    #[error("capability '{0}' is not visible to this unit")]
    MissingCapability(String),

    #[error("capability '{name}' is not bound to a value of type {expected}")]
    CapabilityType { name: String, expected: &'static str },

    #[error("{0}")]
    Other(String),
}

/// Typed entry point of a unit's routes.
pub trait RouteProvider: Send + Sync {
    fn routes(&self, ctx: &UnitContext<'_>) -> Result<RouteSurface, SurfaceError>;
}

/// Adapter turning a closure into a [`RouteProvider`].
pub struct FnProvider<F>(F);

/// Build a [`RouteProvider`] from a closure.
pub fn from_fn<F>(f: F) -> FnProvider<F>
where
    F: Fn(&UnitContext<'_>) -> Result<RouteSurface, SurfaceError> + Send + Sync,
{
    FnProvider(f)
}

impl<F> RouteProvider for FnProvider<F>
where
    F: Fn(&UnitContext<'_>) -> Result<RouteSurface, SurfaceError> + Send + Sync,
{
    fn routes(&self, ctx: &UnitContext<'_>) -> Result<RouteSurface, SurfaceError> {
        (self.0)(ctx)
    }
}

/// What a unit receives while its routes are built.
pub struct UnitContext<'a> {
    location: &'a UnitLocation,
    capabilities: &'a CapabilitySet,
}

impl<'a> UnitContext<'a> {
    pub fn new(location: &'a UnitLocation, capabilities: &'a CapabilitySet) -> Self {
        Self {
            location,
            capabilities,
        }
    }

    pub fn location(&self) -> &UnitLocation {
        self.location
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        self.capabilities
    }

    /// Value bound to the winning declaration of `name`, if it has one of type `T`.
    pub fn capability<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.capabilities.get(name)?.downcast::<T>()
    }

    pub fn require<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, SurfaceError> {
        let slot = self
            .capabilities
            .get(name)
            .ok_or_else(|| SurfaceError::MissingCapability(name.to_string()))?;
        slot.downcast::<T>().ok_or_else(|| SurfaceError::CapabilityType {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }
}

pub(crate) struct RouteSpec {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) handler: MethodRouter,
}

/// Routes of one unit, relative to its prefix.
#[derive(Default)]
pub struct RouteSurface {
    routes: Vec<RouteSpec>,
}

impl RouteSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route with an explicit method router. `handler` must only answer `method`.
    pub fn route(mut self, method: Method, path: impl Into<String>, handler: MethodRouter) -> Self {
        self.routes.push(RouteSpec {
            method,
            path: path.into(),
            handler,
        });
        self
    }

    pub fn get<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Method::GET, path, routing::get(handler))
    }

    pub fn post<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Method::POST, path, routing::post(handler))
    }

    pub fn put<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Method::PUT, path, routing::put(handler))
    }

    pub fn patch<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Method::PATCH, path, routing::patch(handler))
    }

    pub fn delete<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Method::DELETE, path, routing::delete(handler))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// `(method, relative path)` pairs in declaration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|r| (&r.method, r.path.as_str()))
    }

    /// Reject paths axum cannot hold and routes declared twice.
    pub fn validate(&self) -> Result<(), SurfaceError> {
        let mut seen: Vec<(&Method, &str)> = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            validate_route_path(&route.path).map_err(|reason| SurfaceError::InvalidPath {
                path: route.path.clone(),
                reason,
            })?;
            if seen.contains(&(&route.method, route.path.as_str())) {
                return Err(SurfaceError::DuplicateRoute {
                    method: route.method.clone(),
                    path: route.path.clone(),
                });
            }
            seen.push((&route.method, route.path.as_str()));
        }
        Ok(())
    }

    pub(crate) fn into_routes(self) -> Vec<RouteSpec> {
        self.routes
    }
}

impl fmt::Debug for RouteSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes().map(|(m, p)| format!("{} {}", m, p)))
            .finish()
    }
}

/// A relative route path: empty, or `/`-rooted segments where `:param` and
/// `*wildcard` span a whole segment and a wildcard comes last.
pub fn validate_route_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Ok(());
    }
    if !path.starts_with('/') {
        return Err("must start with '/'".to_string());
    }
    if path.contains("//") {
        return Err("contains an empty segment".to_string());
    }
    let segments: Vec<&str> = path[1..].split('/').collect();
    let last = segments.len() - 1;
    let mut names: Vec<&str> = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        if let Some(rest) = segment.strip_prefix(':').or_else(|| segment.strip_prefix('*')) {
            if rest.is_empty() {
                return Err(format!("parameter in segment '{}' has no name", segment));
            }
            if names.contains(&rest) {
                return Err(format!("parameter '{}' appears twice", rest));
            }
            names.push(rest);
            if rest.contains(':') || rest.contains('*') {
                return Err(format!("segment '{}' holds more than one parameter", segment));
            }
            if segment.starts_with('*') && index != last {
                return Err("a wildcard must be the last segment".to_string());
            }
        } else if segment.contains(':') || segment.contains('*') {
            return Err(format!(
                "parameter in segment '{}' must span the whole segment",
                segment
            ));
        }
    }
    Ok(())
}

/// A unit prefix follows route path rules, never ends with `/` and holds no
/// `*wildcard`, since routes and child units are mounted after it.
pub fn validate_prefix(prefix: &str) -> Result<(), String> {
    validate_route_path(prefix)?;
    if prefix.ends_with('/') {
        return Err(format!("prefix '{}' must not end with '/'", prefix));
    }
    if prefix.split('/').any(|segment| segment.starts_with('*')) {
        return Err(format!("prefix '{}' must not contain a wildcard", prefix));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_path_rules() {
        assert!(validate_route_path("").is_ok());
        assert!(validate_route_path("/").is_ok());
        assert!(validate_route_path("/status").is_ok());
        assert!(validate_route_path("/:conversation_id").is_ok());
        assert!(validate_route_path("/files/*rest").is_ok());

        assert!(validate_route_path("status").is_err());
        assert!(validate_route_path("/a//b").is_err());
        assert!(validate_route_path("/:").is_err());
        assert!(validate_route_path("/*rest/more").is_err());
        assert!(validate_route_path("/a:b").is_err());
        assert!(validate_route_path("/:id/items/:id").is_err());
        assert!(validate_route_path("/:id/*id").is_err());
    }

    #[test]
    fn test_prefix_rules() {
        assert!(validate_prefix("").is_ok());
        assert!(validate_prefix("/users").is_ok());
        assert!(validate_prefix("/").is_err());
        assert!(validate_prefix("/users/").is_err());
        assert!(validate_prefix("users").is_err());
        assert!(validate_prefix("/conversations/:id").is_ok());
        assert!(validate_prefix("/files/*rest").is_err());
    }

    #[test]
    fn test_duplicate_routes_rejected() {
        let surface = RouteSurface::new()
            .get("/status", || async { "a" })
            .get("/status", || async { "b" });
        assert!(matches!(
            surface.validate(),
            Err(SurfaceError::DuplicateRoute { .. })
        ));

        let surface = RouteSurface::new()
            .get("/status", || async { "a" })
            .post("/status", || async { "b" });
        assert!(surface.validate().is_ok());
        assert_eq!(surface.len(), 2);
    }

    #[test]
    fn test_context_capability_lookup() {
        let location = UnitLocation::root("app");
        let declared = vec![crate::capabilities::CapabilityRef::new("config", location.clone())
            .with_instance(Arc::new(42u32))];
        let set = CapabilitySet::new().with_declared(&declared);
        let ctx = UnitContext::new(&location, &set);

        assert_eq!(ctx.capability::<u32>("config").as_deref(), Some(&42));
        assert!(ctx.capability::<String>("config").is_none());
        assert!(matches!(
            ctx.require::<String>("config"),
            Err(SurfaceError::CapabilityType { .. })
        ));
        assert!(matches!(
            ctx.require::<u32>("database"),
            Err(SurfaceError::MissingCapability(_))
        ));
    }
}
