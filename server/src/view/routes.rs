//! HTTP route handlers for viewing run results

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::run::{RunErrorResponse, RunId, RunOutcome, RunState};
use crate::server::AppState;

/// Identifier that renders the run listing instead of a single run
const LIST_TOKEN: &str = "list";

/// Query parameters for `GET /view?uuid=...`
#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub uuid: Option<String>,
}

/// GET /view/:id - Results page, progress page, or run listing for `list`
pub async fn view_run(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    present(&state, &id).await
}

/// GET /view?uuid=:id - Same as `/view/:id`
pub async fn view_run_query(
    State(state): State<AppState>,
    Query(params): Query<ViewQuery>,
) -> Response {
    match params.uuid.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => present(&state, id).await,
        _ => RunErrorResponse::new(StatusCode::BAD_REQUEST, "Requires UUID").into_response(),
    }
}

async fn present(state: &AppState, raw_id: &str) -> Response {
    tracing::info!("View request: {}", raw_id);

    if raw_id == LIST_TOKEN {
        return match state.presenter.render_list().await {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                tracing::error!("Failed to list runs: {}", e);
                RunErrorResponse::from(e).into_response()
            }
        };
    }

    let id: RunId = match raw_id.parse() {
        Ok(id) => id,
        Err(e) => return RunErrorResponse::from(e).into_response(),
    };

    // Runs started by this process report their live state; anything else is
    // served straight from disk.
    if let Some(record) = state.runs.tracker().get(id) {
        match record.state {
            RunState::Pending | RunState::Running => {
                return match state.presenter.render_progress(&record) {
                    Ok(html) => Html(html).into_response(),
                    Err(e) => RunErrorResponse::from(e).into_response(),
                };
            }
            RunState::Failed => {
                return (StatusCode::GONE, Json(RunOutcome::from_record(&record))).into_response();
            }
            RunState::Error | RunState::Exception => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(RunOutcome::from_record(&record)),
                )
                    .into_response();
            }
            RunState::Succeeded => {}
        }
    }

    match state.presenter.render_results(id).await {
        Ok(html) => {
            tracing::info!("{}: html returned", id);
            Html(html).into_response()
        }
        Err(e) => {
            tracing::warn!("Failed to render results for {}: {}", id, e);
            RunErrorResponse::from(e).into_response()
        }
    }
}

/// Build result viewing routes
pub fn view_routes() -> Router<AppState> {
    Router::new()
        .route("/view", get(view_run_query))
        .route("/view/:id", get(view_run))
}
