use crate::{
    AppState,
    runs::RunSummary,
    types::{CancelResponse, Result, RunCreated, RunRequest},
};
use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

/// Start a run, or return a fresh cached run for the same company
pub async fn create_run(
    State(state): State<AppState>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunCreated>> {
    let company = payload.into_company()?;
    Ok(Json(state.orchestrator.start_run(company)?))
}

/// Run history, newest first
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunSummary>> {
    Json(state.store.list())
}

/// Current state of a run, terminal or not
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse> {
    let body = state.store.read(&run_id)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

/// Download a finished run; same bytes as [`get_run`]
pub async fn export_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse> {
    let body = state.store.export(&run_id)?;
    let disposition = format!("attachment; filename=\"run-{}.json\"", run_id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<CancelResponse>> {
    Ok(Json(state.orchestrator.cancel(&run_id)?))
}
