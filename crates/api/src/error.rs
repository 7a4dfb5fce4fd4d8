use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Relay error type for HTTP handlers.
///
/// Implements [`IntoResponse`] so every fault becomes a JSON envelope
/// `{"error": message, "code": CODE}` instead of reaching the transport.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The upstream engine address is not configured.
    #[error("{0}")]
    Configuration(String),

    /// A bad request with a human-readable message.
    #[error("{0}")]
    BadRequest(String),

    /// No route matches the method and path.
    #[error("Not Found")]
    NotFound,

    /// The upstream engine answered with something the relay cannot pass on.
    #[error("{0}")]
    Upstream(String),

    /// The upstream engine could not be reached.
    #[error("Upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR"),
            AppError::Request(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, code, "Relay request failed");
        }

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
