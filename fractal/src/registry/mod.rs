//! Mount registry: the tree of mounted units produced by one composition pass.
//!
//! The registry is a startup artifact for operators and tooling. Requests are
//! dispatched by the axum router built alongside it, never through it.

pub mod report;

pub use report::{ReportCapability, ReportEntry, ReportFailure, StructureReport};

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::capabilities::CapabilitySet;
use crate::unit::UnitLocation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountedRoute {
    pub method: String,
    pub path: String,
}

impl fmt::Display for MountedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A unit's routing surface as attached beneath its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountedSurface {
    pub mount_path: String,
    pub tags: Vec<String>,
    pub routes: Vec<MountedRoute>,
}

#[derive(Debug, Clone)]
pub struct MountNode {
    pub location: UnitLocation,
    pub description: Option<String>,
    /// `None` for units without an accepted routing surface.
    pub mounted: Option<MountedSurface>,
    pub children: Vec<MountNode>,
    pub capabilities: CapabilitySet,
}

impl MountNode {
    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }
}

/// Why a unit was left unmounted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("malformed unit: {reason}")]
    MalformedUnit { reason: String },

    #[error("missing unit: no discoverable content")]
    MissingUnit,

    #[error("capability cycle: {via} re-enters {target}")]
    CapabilityCycle { via: String, target: UnitLocation },

    #[error("route conflict: {route} collides with {existing}")]
    RouteConflict { route: String, existing: String },

    #[error("depth limit of {limit} exceeded")]
    DepthExceeded { limit: usize },
}

impl FailureReason {
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::MalformedUnit { .. } => "malformed_unit",
            FailureReason::MissingUnit => "missing_unit",
            FailureReason::CapabilityCycle { .. } => "capability_cycle",
            FailureReason::RouteConflict { .. } => "route_conflict",
            FailureReason::DepthExceeded { .. } => "depth_exceeded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub location: UnitLocation,
    pub reason: FailureReason,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.reason)
    }
}

/// Read-only result of a completed composition pass.
#[derive(Debug, Clone)]
pub struct MountRegistry {
    root: MountNode,
    failures: Vec<UnitFailure>,
}

impl MountRegistry {
    pub(crate) fn new(root: MountNode, failures: Vec<UnitFailure>) -> Self {
        Self { root, failures }
    }

    pub fn root(&self) -> &MountNode {
        &self.root
    }

    /// Failed locations in the order they were met.
    pub fn failures(&self) -> &[UnitFailure] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Pre-order traversal: a unit, then its children in mount order.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![&self.root],
        }
    }

    pub fn find(&self, location: &UnitLocation) -> Option<&MountNode> {
        self.walk().find(|node| &node.location == location)
    }

    /// Every mounted route, in mount order.
    pub fn mounted_routes(&self) -> Vec<&MountedRoute> {
        self.walk()
            .filter_map(|node| node.mounted.as_ref())
            .flat_map(|surface| surface.routes.iter())
            .collect()
    }

    pub fn report(&self) -> StructureReport {
        StructureReport::from_registry(self)
    }
}

pub struct Walk<'a> {
    stack: Vec<&'a MountNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a MountNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(location: UnitLocation, children: Vec<MountNode>) -> MountNode {
        MountNode {
            location,
            description: None,
            mounted: None,
            children,
            capabilities: CapabilitySet::new(),
        }
    }

    #[test]
    fn test_walk_is_pre_order() {
        let root = UnitLocation::root("app");
        let a = root.child("a");
        let tree = node(
            root.clone(),
            vec![
                node(a.clone(), vec![node(a.child("x"), vec![])]),
                node(root.child("b"), vec![]),
            ],
        );
        let registry = MountRegistry::new(tree, vec![]);
        let order: Vec<String> = registry.walk().map(|n| n.location.to_string()).collect();
        assert_eq!(order, vec!["app", "app/a", "app/a/x", "app/b"]);
        assert!(registry.find(&a.child("x")).is_some());
        assert!(registry.find(&root.child("zzz")).is_none());
        assert!(registry.is_clean());
    }

    #[test]
    fn test_failure_display_and_kind() {
        let failure = UnitFailure {
            location: UnitLocation::root("app").child("x"),
            reason: FailureReason::MalformedUnit {
                reason: "bad prefix".to_string(),
            },
        };
        assert_eq!(failure.to_string(), "app/x: malformed unit: bad prefix");
        assert_eq!(failure.reason.kind(), "malformed_unit");
    }
}
