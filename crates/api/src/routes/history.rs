use axum::extract::{Path, State};
use axum::response::Response;

use crate::error::{AppError, AppResult};
use crate::routes::relay_json;
use crate::state::AppState;

/// GET /api/history/{prompt_id} -- relay the engine's history record.
///
/// The identifier is forwarded as a single path segment below `/history/`.
pub async fn fetch(
    State(state): State<AppState>,
    Path(prompt_id): Path<String>,
) -> AppResult<Response> {
    let upstream = state.upstream()?;
    validate_prompt_id(&prompt_id)?;
    let url = upstream.segment_url("history", &prompt_id)?;

    let response = upstream.client.get(url.clone()).send().await?;
    relay_json(url.as_str(), response).await
}

/// Dot segments would be dropped from the path and address `/history` itself.
fn validate_prompt_id(prompt_id: &str) -> AppResult<()> {
    if prompt_id.is_empty() || prompt_id == "." || prompt_id == ".." {
        return Err(AppError::BadRequest("Invalid prompt id".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Upstream;

    fn upstream(base: &str) -> Upstream {
        Upstream::new(reqwest::Client::new(), base).unwrap()
    }

    #[test]
    fn dot_segments_are_rejected() {
        assert!(validate_prompt_id("..").is_err());
        assert!(validate_prompt_id(".").is_err());
        assert!(validate_prompt_id("").is_err());
        assert!(validate_prompt_id("abc123").is_ok());
        assert!(validate_prompt_id("..abc").is_ok());
    }

    #[test]
    fn identifier_stays_one_segment() {
        let up = upstream("http://engine:8188");
        let url = up.segment_url("history", "../queue").unwrap();
        assert_eq!(url.path(), "/history/..%2Fqueue");

        let url = up.segment_url("history", "abc?max_items=1#x").unwrap();
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert!(url.path().starts_with("/history/abc%3Fmax_items"));
    }

    #[test]
    fn base_path_is_kept() {
        let up = upstream("http://engine:8188/comfy");
        let url = up.segment_url("history", "abc123").unwrap();
        assert_eq!(url.as_str(), "http://engine:8188/comfy/history/abc123");
    }
}
