use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

/// Liveness response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// GET /api/health -- reports the relay alive without contacting upstream.
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    state.upstream()?;
    Ok(Json(HealthResponse { ok: true }))
}
