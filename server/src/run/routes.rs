//! HTTP route handlers for starting runs and polling their status

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::server::AppState;

use super::types::{RunError, RunId, RunOutcome, RunRecord, RunRequest};

/// Error body shared by the JSON endpoints: `{"status": "error", "message": ...}`
#[derive(Debug, Serialize)]
pub struct RunErrorResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip)]
    pub code: StatusCode,
}

impl RunErrorResponse {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            code,
        }
    }
}

impl From<RunError> for RunErrorResponse {
    fn from(e: RunError) -> Self {
        match &e {
            RunError::InvalidId(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "Request requires valid uuid as path param (e.g. view/<uuid>)",
            ),
            RunError::Validation(_) => Self::new(StatusCode::BAD_REQUEST, e.to_string()),
            RunError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl IntoResponse for RunErrorResponse {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}

/// POST /init-test - Materialize a config and queue a load test
///
/// Returns 202 with the view URL once `config.yaml` is written. The load
/// test itself runs in the background; poll `/view/:id` or `/status/:id`.
pub async fn init_test(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> (StatusCode, Json<RunOutcome>) {
    let payload = match body {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            tracing::debug!("Rejected init-test body: {}", rejection);
            return (
                StatusCode::BAD_REQUEST,
                Json(RunOutcome::error(rejection.body_text())),
            );
        }
    };

    let request = match RunRequest::from_json(payload) {
        Ok(request) => request,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(RunOutcome::error(e.to_string()))),
    };

    match state.runs.start(request).await {
        Ok(id) => {
            let outcome = RunOutcome::accepted(id);
            tracing::info!("Init output for {}: {:?}", id, outcome);
            (StatusCode::ACCEPTED, Json(outcome))
        }
        Err(e) => {
            tracing::error!("Failed to start load test: {}", e);
            let code = match e {
                RunError::Validation(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (code, Json(RunOutcome::error(e.to_string())))
        }
    }
}

/// GET /status/:id - Lifecycle record of a run started by this process
pub async fn run_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunRecord>, RunErrorResponse> {
    let id: RunId = id.parse()?;
    state
        .runs
        .tracker()
        .get(id)
        .map(Json)
        .ok_or_else(|| RunErrorResponse::new(StatusCode::NOT_FOUND, format!("Unknown run {}", id)))
}

/// Build run API routes
pub fn run_routes() -> Router<AppState> {
    Router::new()
        .route("/init-test", post(init_test))
        .route("/status/:id", get(run_status))
}
