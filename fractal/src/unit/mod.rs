//! Units and their resolution.
//!
//! A unit is one self-similar node of the application tree: the root, a
//! feature, or a nested feature. Resolving a unit yields a [`UnitDescriptor`]:
//! its routing surface (if any), the capabilities it declares for its
//! descendants, and the locations of its child units.

pub mod catalog;
pub mod directory;
pub mod location;
pub mod static_tree;

pub use catalog::UnitCatalog;
pub use directory::DirectoryResolver;
pub use location::UnitLocation;
pub use static_tree::{StaticResolver, StaticUnit};

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::capabilities::CapabilityRef;
use crate::surface::RouteProvider;

/// Manifest file of a unit directory.
pub const MANIFEST_FILE: &str = "unit.toml";
/// Directory holding a unit's child units.
pub const FEATURES_DIR: &str = "features";
/// Directory holding a unit's shared modules.
pub const SHARED_DIR: &str = "shared";

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The unit exists but its routing surface is not in the expected shape.
    /// `partial` still lists the unit's children and capabilities, with no
    /// routing surface, so discovery can carry on below it.
    #[error("malformed unit {location}: {reason}")]
    MalformedUnit {
        location: UnitLocation,
        reason: String,
        partial: Box<UnitDescriptor>,
    },

    #[error("no unit found at {location}")]
    MissingUnit { location: UnitLocation },
}

/// Source of unit descriptors. Resolution is a pure read.
pub trait UnitResolver {
    fn resolve(&self, location: &UnitLocation) -> Result<UnitDescriptor, ResolveError>;
}

impl<R: UnitResolver + ?Sized> UnitResolver for &R {
    fn resolve(&self, location: &UnitLocation) -> Result<UnitDescriptor, ResolveError> {
        (**self).resolve(location)
    }
}

/// Handle on a unit's routes plus the prefix the unit owns.
#[derive(Clone)]
pub struct RoutingSurfaceRef {
    pub prefix: String,
    pub tags: Vec<String>,
    pub provider: Arc<dyn RouteProvider>,
}

impl fmt::Debug for RoutingSurfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingSurfaceRef")
            .field("prefix", &self.prefix)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// Resolved metadata of one unit for a single discovery pass.
#[derive(Debug, Clone)]
pub struct UnitDescriptor {
    pub location: UnitLocation,
    /// Stable identity used for cycle detection (canonical directory for
    /// on-disk units).
    pub identity: String,
    pub description: Option<String>,
    pub surface: Option<RoutingSurfaceRef>,
    pub declared_capabilities: Vec<CapabilityRef>,
    pub child_locations: Vec<UnitLocation>,
}

impl UnitDescriptor {
    pub fn new(location: UnitLocation, identity: impl Into<String>) -> Self {
        Self {
            location,
            identity: identity.into(),
            description: None,
            surface: None,
            declared_capabilities: Vec::new(),
            child_locations: Vec::new(),
        }
    }

    pub fn has_routing_surface(&self) -> bool {
        self.surface.is_some()
    }
}
