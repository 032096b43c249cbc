//! Run API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use dbexport_core::{Run, RunSelection, UserContext};

use crate::state::AppState;

/// Request body for starting a run
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRunBody {
    /// Who asked for the export, and against which database
    pub user_context: UserContext,
    /// Which groups and scripts to export
    pub selection: RunSelection,
}

/// Response for listing runs
#[derive(Debug, Serialize)]
pub struct ListRunsResponse {
    pub runs: Vec<Run>,
    pub total: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct RunErrorResponse {
    pub error: String,
}

fn not_found(run_id: &str) -> (StatusCode, Json<RunErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(RunErrorResponse {
            error: format!("Run not found: {run_id}"),
        }),
    )
}

/// Start a new run.
///
/// The run is accepted in Queued state; execution happens in the background
/// and progress is observable via GET and the WebSocket stream.
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartRunBody>,
) -> (StatusCode, Json<Run>) {
    let run = state
        .engine()
        .start_run(body.user_context, body.selection)
        .await;
    (StatusCode::ACCEPTED, Json(run))
}

/// List all known runs, newest first.
pub async fn list_runs(State(state): State<Arc<AppState>>) -> Json<ListRunsResponse> {
    let runs = state.engine().list_runs().await;
    let total = runs.len();
    Json(ListRunsResponse { runs, total })
}

/// Get a single run by id.
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<Run>, (StatusCode, Json<RunErrorResponse>)> {
    match state.engine().get_run(&run_id).await {
        Some(run) => Ok(Json(run)),
        None => Err(not_found(&run_id)),
    }
}

/// Cancel a run.
///
/// Returns 409 when the run exists but already reached a terminal status.
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<Run>, (StatusCode, Json<RunErrorResponse>)> {
    if state.engine().cancel_run(&run_id).await {
        match state.engine().get_run(&run_id).await {
            Some(run) => Ok(Json(run)),
            None => Err(not_found(&run_id)),
        }
    } else {
        match state.engine().get_run(&run_id).await {
            Some(run) => Err((
                StatusCode::CONFLICT,
                Json(RunErrorResponse {
                    error: format!("Run {run_id} already finished: {:?}", run.status),
                }),
            )),
            None => Err(not_found(&run_id)),
        }
    }
}
