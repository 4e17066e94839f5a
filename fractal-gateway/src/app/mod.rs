//! Route providers and capability values of the bundled demo tree.
//!
//! The tree itself lives on disk under `fractal-gateway/app/`; this module
//! registers what the directory layout cannot express.

use std::sync::Arc;

use axum::Json;
use fractal::{
    from_fn, RouteProvider, RouteSurface, Settings, SurfaceError, UnitCatalog, UnitContext,
    UnitLocation,
};
use serde::Serialize;
use serde_json::{json, Value};

/// Feature units with a `/status` route, relative to the root.
pub const FEATURES: &[&[&str]] = &[
    &["bots"],
    &["users"],
    &["conversations"],
    &["conversations", "messages"],
    &["conversations", "participants"],
];

#[derive(Debug, Clone, Serialize)]
pub struct FeatureStatus {
    pub message: String,
    pub app: String,
    pub capabilities: Vec<String>,
}

/// Catalog for the demo tree rooted at `root`. The settings are bound to the
/// root's `config` capability.
pub fn catalog(root: &UnitLocation, settings: Arc<Settings>) -> UnitCatalog {
    let mut catalog = UnitCatalog::new();
    catalog.register(root.clone(), health());
    for path in FEATURES {
        let location = path
            .iter()
            .fold(root.clone(), |location, name| location.child(*name));
        catalog.register(location, feature_status());
    }
    catalog.provide(root.clone(), "config", settings);
    catalog
}

fn health() -> impl RouteProvider {
    from_fn(|_ctx: &UnitContext<'_>| -> Result<RouteSurface, SurfaceError> {
        Ok(RouteSurface::new().get("/health", || async {
            Json(json!({ "status": "healthy" }))
        }))
    })
}

fn feature_status() -> impl RouteProvider {
    from_fn(|ctx: &UnitContext<'_>| -> Result<RouteSurface, SurfaceError> {
        let settings = ctx.require::<Settings>("config")?;
        let status = FeatureStatus {
            message: format!("Feature {} is ready!", ctx.location().name()),
            app: settings.app_name.clone(),
            capabilities: ctx.capabilities().names().map(str::to_string).collect(),
        };
        let body = serde_json::to_value(&status).map_err(|e| SurfaceError::Other(e.to_string()))?;
        Ok(RouteSurface::new().get("/status", move || status_handler(body.clone())))
    })
}

async fn status_handler(body: Value) -> Json<Value> {
    Json(body)
}
