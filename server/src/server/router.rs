use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::run::run_routes;
use crate::view::view_routes;

use super::state::AppState;

/// GET /health - Liveness probe
async fn health() -> &'static str {
    "OK"
}

#[derive(Serialize)]
struct MetricsResponse {
    /// Server uptime in seconds
    uptime_seconds: u64,
    /// Server version
    version: &'static str,
    /// Runs pending or executing
    active_runs: usize,
    /// Runs started since the server came up
    total_runs: usize,
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let tracker = state.runs.tracker();
    Json(MetricsResponse {
        uptime_seconds: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
        active_runs: tracker.active_count(),
        total_runs: tracker.total_count(),
    })
}

/// Build the full application router.
///
/// Run artifacts are served read-only under `/static`.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(state.presenter.static_dir());

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(run_routes())
        .merge(view_routes())
        .nest_service("/static", static_files)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
