//! Serving a composed app over HTTP.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::compose::ComposedApp;
use crate::config::Settings;
use crate::registry::StructureReport;

/// Path of the structure endpoint when `expose_structure` is set.
pub const STRUCTURE_PATH: &str = "/_structure";

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Final application router: the composed routes plus the not-found
/// fallback, the optional structure endpoint and request tracing.
pub fn build_router(app: ComposedApp, settings: &Settings) -> Router {
    let (registry, mut router) = app.into_parts();

    if settings.expose_structure {
        let taken = registry
            .mounted_routes()
            .iter()
            .any(|route| route.path == STRUCTURE_PATH);
        if taken {
            tracing::warn!(
                path = STRUCTURE_PATH,
                "a unit already mounts the structure path; not exposing the report"
            );
        } else {
            let report = Arc::new(registry.report());
            let endpoint: Router = Router::new()
                .route(STRUCTURE_PATH, get(structure))
                .with_state(report);
            router = router.merge(endpoint);
        }
    }

    router.fallback(not_found).layer(TraceLayer::new_for_http())
}

async fn structure(State(report): State<Arc<StructureReport>>) -> Json<StructureReport> {
    Json(report.as_ref().clone())
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" })))
}

/// Serve `router` on `bind` until ctrl-c.
pub async fn serve(router: Router, bind: &str) -> Result<(), ServeError> {
    let listener = TcpListener::bind(bind).await.map_err(|source| ServeError::Bind {
        addr: bind.to_string(),
        source,
    })?;
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on http://{}", addr);
    }

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Server)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
