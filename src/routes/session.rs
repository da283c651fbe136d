use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use uuid::Uuid;

use crate::overlay::{DebugReadout, OverlaySnapshot, TargetMarker};
use crate::response::{accepted, ok, AppError};
use crate::state::AppState;
use crate::types::{SessionPhase, Viewport};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_session))
        .route("/restart", post(restart_session))
        .route("/abort", post(abort_session))
        .route("/debug", post(toggle_debug))
        .route("/report", get(get_report))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub overlay: OverlaySnapshot,
    pub marker: Option<TargetMarker>,
    pub debug: Option<DebugReadout>,
}

impl SessionView {
    pub fn new(id: Uuid, overlay: OverlaySnapshot, viewport: Viewport) -> Self {
        Self {
            id,
            phase: overlay.phase,
            marker: overlay.target_marker(viewport),
            debug: overlay.debug_readout(),
            overlay,
        }
    }
}

pub fn session_view(state: &AppState) -> SessionView {
    let session = state.session();
    SessionView::new(session.session_id(), session.snapshot(), state.viewport())
}

async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    ok(session_view(&state))
}

async fn restart_session(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.session().restart().await?;
    Ok(accepted(serde_json::json!({ "restarting": true })))
}

async fn abort_session(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.session().abort().await?;
    Ok(accepted(serde_json::json!({ "aborting": true })))
}

async fn toggle_debug(State(state): State<AppState>) -> impl IntoResponse {
    let enabled = state.session().toggle_debug();
    ok(serde_json::json!({ "debug": enabled }))
}

async fn get_report(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = state
        .session()
        .report()
        .ok_or_else(|| AppError::not_found("Session has not completed yet"))?;
    Ok(ok(report))
}
