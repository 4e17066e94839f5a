//! Composition pass: discover units, cascade capabilities, mount routes.

pub mod cycle_detector;
pub mod engine;
pub mod route_table;

pub use cycle_detector::CycleDetector;
pub use engine::Composer;
pub use route_table::{RouteConflict, RouteTable};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::Router;
use thiserror::Error;

use crate::registry::{FailureReason, MountRegistry};
use crate::unit::UnitLocation;

/// Default limit on feature nesting below the entry unit.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum ComposeError {
    /// The entry unit itself could not be composed; nothing can be served.
    #[error("root unit {location} is unresolvable: {reason}")]
    RootUnresolvable {
        location: UnitLocation,
        reason: FailureReason,
    },

    /// The pass was interrupted; its partial results are discarded.
    #[error("composition aborted before it completed")]
    Aborted,
}

/// Flag that interrupts a composition pass from another thread.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Output of a completed composition pass.
pub struct ComposedApp {
    pub registry: MountRegistry,
    pub router: Router,
}

impl ComposedApp {
    pub fn into_parts(self) -> (MountRegistry, Router) {
        (self.registry, self.router)
    }
}
