pub mod health;
pub mod history;
pub mod prompt;
pub mod view;

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Build the relay route table.
///
/// Route tree:
/// ```text
/// /api/health                 GET   liveness, no upstream contact
/// /api/prompt                 POST  -> {upstream}/prompt
/// /api/history/{prompt_id}    GET   -> {upstream}/history/{prompt_id} (one escaped segment)
/// /api/view                   GET   -> {upstream}/view?filename=&subfolder=&type=
/// ```
///
/// Every other method on these paths, and every other path, goes to
/// [`fallback`].
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health::health).fallback(fallback))
        .route("/api/prompt", post(prompt::submit).fallback(fallback))
        .route(
            "/api/history/{prompt_id}",
            get(history::fetch).fallback(fallback),
        )
        .route("/api/view", get(view::fetch).fallback(fallback))
        .fallback(fallback)
}

/// Preflight and not-found handler.
///
/// `OPTIONS` answers 204 before the configuration check; anything else is
/// a 404 once the upstream is known to be configured.
pub async fn fallback(method: Method, State(state): State<AppState>) -> AppResult<StatusCode> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::NO_CONTENT);
    }
    state.upstream()?;
    Err(AppError::NotFound)
}

/// Pass an upstream JSON answer through with its status code.
pub(crate) async fn relay_json(url: &str, response: reqwest::Response) -> AppResult<Response> {
    let status = response.status();
    let body = response.bytes().await?;
    tracing::debug!(url, status = status.as_u16(), bytes = body.len(), "Upstream answered");

    let value: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        AppError::Upstream(format!(
            "Upstream returned invalid JSON (HTTP {status}): {e}"
        ))
    })?;

    Ok((status, Json(value)).into_response())
}
