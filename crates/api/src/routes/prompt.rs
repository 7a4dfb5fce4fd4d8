use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;

use crate::error::{AppError, AppResult};
use crate::routes::relay_json;
use crate::state::AppState;

/// POST /api/prompt -- forward a job submission verbatim.
///
/// The body must be JSON; it is checked but sent upstream byte for byte.
pub async fn submit(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    let upstream = state.upstream()?;

    serde_json::from_slice::<serde_json::Value>(&body)
        .map_err(|e| AppError::BadRequest(format!("Request body is not valid JSON: {e}")))?;

    let url = upstream.url("/prompt");
    tracing::info!(url = %url, bytes = body.len(), "Forwarding job submission");

    let response = upstream
        .client
        .post(&url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await?;

    relay_json(&url, response).await
}
