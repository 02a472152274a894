//! HTTP serving surface.
//!
//! Two endpoints: `GET /metrics` renders the text exposition of all
//! registered series, and `GET /healthz` always answers 200 with an empty
//! body. Health is deliberately decoupled from scrape outcome: a process
//! whose scrapes all fail still reports healthy and keeps serving its
//! last-published series.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::Registry;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::metrics;

/// Shared serving state.
#[derive(Clone)]
pub struct AppState {
    /// Registry the scrape task writes to; reads here are lock-free.
    pub registry: Registry,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(app_state)
}

/// Text exposition of all registered series.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match metrics::render(&state.registry) {
        Ok(body) => body.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics rendering failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Liveness probe; does not reflect scrape health.
async fn healthz_handler() -> StatusCode {
    StatusCode::OK
}
