//! Composition engine.
//!
//! Walks a unit tree top-down from an entry unit. For every unit it:
//! - resolves the descriptor (a malformed unit keeps its children),
//! - checks the discovery path for cycles,
//! - cascades the parent's capabilities into the unit's own set,
//! - mounts the unit's routes beneath the parent's mount path,
//! - composes the children in name order beneath the unit's mount path.
//!
//! Failures below the entry unit are collected into the registry. Only a
//! failure of the entry unit, or an abort, ends the pass with an error.

use crate::capabilities::{cascade, CapabilitySet};
use crate::registry::{FailureReason, MountNode, MountRegistry, MountedSurface, UnitFailure};
use crate::surface::{validate_route_path, UnitContext};
use crate::unit::{
    ResolveError, RoutingSurfaceRef, UnitLocation, UnitResolver, FEATURES_DIR, SHARED_DIR,
};

use super::cycle_detector::CycleDetector;
use super::route_table::{display_mount, join_mount, RouteTable};
use super::{AbortSignal, ComposeError, ComposedApp, DEFAULT_MAX_DEPTH};

pub struct Composer<R> {
    resolver: R,
    max_depth: usize,
    abort: AbortSignal,
    verbose: bool,
}

impl<R: UnitResolver> Composer<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            max_depth: DEFAULT_MAX_DEPTH,
            abort: AbortSignal::new(),
            verbose: false,
        }
    }

    /// Deepest feature nesting composed below the entry unit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Log every resolve/mount/skip decision at `info` instead of `debug`.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run one composition pass starting at `entry`.
    pub fn compose(&self, entry: &UnitLocation) -> Result<ComposedApp, ComposeError> {
        let mut pass = Pass {
            resolver: &self.resolver,
            entry,
            abort: &self.abort,
            verbose: self.verbose,
            table: RouteTable::new(),
            failures: Vec::new(),
        };
        let detector = CycleDetector::new(self.max_depth);
        let root = pass
            .compose_unit(entry, &CapabilitySet::new(), "", &detector)?
            .ok_or_else(|| ComposeError::RootUnresolvable {
                location: entry.clone(),
                reason: FailureReason::MissingUnit,
            })?;

        tracing::info!(
            target: "fractal::discovery",
            root = %entry,
            paths = pass.table.len(),
            failures = pass.failures.len(),
            "composition pass complete"
        );

        Ok(ComposedApp {
            router: pass.table.into_router(),
            registry: MountRegistry::new(root, pass.failures),
        })
    }
}

struct Pass<'a, R> {
    resolver: &'a R,
    entry: &'a UnitLocation,
    abort: &'a AbortSignal,
    verbose: bool,
    table: RouteTable,
    failures: Vec<UnitFailure>,
}

impl<'a, R: UnitResolver> Pass<'a, R> {
    /// Record a failed unit. A failure of the entry unit ends the pass.
    fn reject(&mut self, location: &UnitLocation, reason: FailureReason) -> Result<(), ComposeError> {
        if location == self.entry {
            return Err(ComposeError::RootUnresolvable {
                location: location.clone(),
                reason,
            });
        }
        tracing::warn!(
            target: "fractal::discovery",
            unit = %location,
            kind = reason.kind(),
            "skipping unit: {}",
            reason
        );
        self.failures.push(UnitFailure {
            location: location.clone(),
            reason,
        });
        Ok(())
    }

    fn compose_unit(
        &mut self,
        location: &UnitLocation,
        parent_capabilities: &CapabilitySet,
        base: &str,
        detector: &CycleDetector,
    ) -> Result<Option<MountNode>, ComposeError> {
        if self.abort.is_raised() {
            return Err(ComposeError::Aborted);
        }

        let (descriptor, defect) = match self.resolver.resolve(location) {
            Ok(descriptor) => (descriptor, None),
            Err(ResolveError::MalformedUnit { reason, partial, .. }) => (*partial, Some(reason)),
            Err(ResolveError::MissingUnit { .. }) => {
                self.reject(location, FailureReason::MissingUnit)?;
                return Ok(None);
            }
        };

        if let Some(target) = detector.visited_by(&descriptor.identity).cloned() {
            let via = format!("{}/{}", FEATURES_DIR, location.name());
            self.reject(location, FailureReason::CapabilityCycle { via, target })?;
            return Ok(None);
        }
        for capability in &descriptor.declared_capabilities {
            let Some(origin) = capability.origin() else {
                continue;
            };
            let origin = origin.display().to_string();
            let target = if origin == descriptor.identity {
                Some(location.clone())
            } else {
                detector.visited_by(&origin).cloned()
            };
            if let Some(target) = target {
                let via = format!("{}/{}", SHARED_DIR, capability.name());
                self.reject(location, FailureReason::CapabilityCycle { via, target })?;
                return Ok(None);
            }
        }

        if let Some(reason) = defect {
            self.reject(location, FailureReason::MalformedUnit { reason })?;
        }

        let capabilities = cascade(parent_capabilities, &descriptor);
        discovery_event!(
            self.verbose,
            unit = %location,
            routing_surface = descriptor.has_routing_surface(),
            capabilities = capabilities.len(),
            children = descriptor.child_locations.len(),
            "resolved unit"
        );

        let mounted = match &descriptor.surface {
            Some(surface) => self.mount_surface(location, surface, &capabilities, base)?,
            None => None,
        };
        let child_base = match &mounted {
            Some((_, mount_base)) => mount_base.clone(),
            None => base.to_string(),
        };

        let mut inner = detector.go_deeper();
        inner.visit(&descriptor.identity, location);

        let mut child_locations = descriptor.child_locations.clone();
        child_locations.sort();
        let mut children = Vec::with_capacity(child_locations.len());
        for child in &child_locations {
            if !detector.can_go_deeper() {
                let limit = detector.max_depth();
                self.reject(child, FailureReason::DepthExceeded { limit })?;
                continue;
            }
            if let Some(node) = self.compose_unit(child, &capabilities, &child_base, &inner)? {
                children.push(node);
            }
        }

        Ok(Some(MountNode {
            location: location.clone(),
            description: descriptor.description,
            mounted: mounted.map(|(surface, _)| surface),
            children,
            capabilities,
        }))
    }

    /// Build and mount the unit's routes. `Ok(None)` when they were rejected.
    fn mount_surface(
        &mut self,
        location: &UnitLocation,
        surface: &RoutingSurfaceRef,
        capabilities: &CapabilitySet,
        base: &str,
    ) -> Result<Option<(MountedSurface, String)>, ComposeError> {
        let ctx = UnitContext::new(location, capabilities);
        let routes = match surface
            .provider
            .routes(&ctx)
            .and_then(|routes| routes.validate().map(|_| routes))
        {
            Ok(routes) => routes,
            Err(e) => {
                self.reject(location, FailureReason::MalformedUnit { reason: e.to_string() })?;
                return Ok(None);
            }
        };

        let mount_base = join_mount(base, &surface.prefix);
        let joined = routes
            .routes()
            .map(|(_, path)| join_mount(&mount_base, path))
            .find_map(|path| validate_route_path(&path).err().map(|reason| (path, reason)));
        if let Some((path, reason)) = joined {
            let reason = format!("route '{}' cannot be mounted: {}", path, reason);
            self.reject(location, FailureReason::MalformedUnit { reason })?;
            return Ok(None);
        }

        match self.table.mount(location, &mount_base, routes.into_routes()) {
            Ok(routes) => {
                discovery_event!(
                    self.verbose,
                    unit = %location,
                    mount_path = %display_mount(&mount_base),
                    routes = routes.len(),
                    "mounted unit"
                );
                let mounted = MountedSurface {
                    mount_path: display_mount(&mount_base),
                    tags: surface.tags.clone(),
                    routes,
                };
                Ok(Some((mounted, mount_base)))
            }
            Err(conflict) => {
                self.reject(
                    location,
                    FailureReason::RouteConflict {
                        route: conflict.route,
                        existing: conflict.existing,
                    },
                )?;
                Ok(None)
            }
        }
    }
}
