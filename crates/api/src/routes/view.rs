use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Content type assumed when the engine declares none.
const FALLBACK_CONTENT_TYPE: &str = "image/png";

/// Artifact type assumed when the caller sends none.
const DEFAULT_TYPE: &str = "output";

/// GET /api/view -- relay an artifact's bytes.
///
/// `filename` is required; `subfolder` defaults to `""` and `type` to
/// `output`.
pub async fn fetch(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Response> {
    let upstream = state.upstream()?;

    let filename = query
        .get("filename")
        .filter(|f| !f.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing filename".to_string()))?;
    let subfolder = query.get("subfolder").map(String::as_str).unwrap_or("");
    let kind = query
        .get("type")
        .map(String::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TYPE);

    let url = upstream.url("/view");
    let response = upstream
        .client
        .get(&url)
        .query(&[
            ("filename", filename.as_str()),
            ("subfolder", subfolder),
            ("type", kind),
        ])
        .send()
        .await?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));
    let bytes = response.bytes().await?;

    tracing::debug!(
        url = %url,
        filename = %filename,
        status = status.as_u16(),
        bytes = bytes.len(),
        "Relayed artifact"
    );

    Ok((status, [(CONTENT_TYPE, content_type)], bytes).into_response())
}
