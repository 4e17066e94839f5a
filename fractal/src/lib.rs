// Fractal Library
// Recursive unit discovery and route composition for self-similar HTTP API trees

/// Emit a discovery trace event.
///
/// Verbose discovery raises the events from `debug` to `info` so they show up
/// under the default filter; the composition outcome never depends on it.
macro_rules! discovery_event {
    ($verbose:expr, $($arg:tt)+) => {{
        if $verbose {
            tracing::info!(target: "fractal::discovery", $($arg)+);
        } else {
            tracing::debug!(target: "fractal::discovery", $($arg)+);
        }
    }};
}

pub mod capabilities;
pub mod compose;
pub mod config;
pub mod registry;
#[cfg(feature = "server")]
pub mod server;
pub mod surface;
pub mod unit;

pub use crate::capabilities::{cascade, CapabilityRef, CapabilitySet};
pub use crate::compose::{AbortSignal, ComposeError, ComposedApp, Composer};
pub use crate::config::Settings;
pub use crate::registry::{FailureReason, MountNode, MountRegistry, StructureReport, UnitFailure};
pub use crate::surface::{from_fn, RouteProvider, RouteSurface, SurfaceError, UnitContext};
pub use crate::unit::{
    DirectoryResolver, ResolveError, StaticResolver, StaticUnit, UnitCatalog, UnitDescriptor,
    UnitLocation, UnitResolver,
};
