use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

/// Message returned on every route while no upstream address is set.
pub const NOT_CONFIGURED: &str = "COMFY_BASE_URL not configured";

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable. Holds no per-request or per-job data.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Upstream engine, `None` while unconfigured.
    upstream: Option<Upstream>,
}

/// Outbound side of the relay: one connection pool to one engine.
#[derive(Clone)]
pub struct Upstream {
    pub client: reqwest::Client,
    base_url: Arc<str>,
    base: reqwest::Url,
}

impl Upstream {
    pub fn new(client: reqwest::Client, base_url: &str) -> AppResult<Self> {
        let base = reqwest::Url::parse(base_url)
            .map_err(|e| AppError::Configuration(format!("Invalid COMFY_BASE_URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(AppError::Configuration(format!(
                "Invalid COMFY_BASE_URL: {base_url} cannot carry a path"
            )));
        }
        Ok(Self {
            client,
            base_url: Arc::from(base_url),
            base,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute upstream URL for `path` (which starts with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Upstream URL for `prefix` followed by `segment` as one path segment.
    ///
    /// `/`, `?`, `#` and `%` in `segment` are percent-encoded, so the result
    /// always stays below `prefix`.
    pub fn segment_url(&self, prefix: &str, segment: &str) -> AppResult<reqwest::Url> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| AppError::Configuration("COMFY_BASE_URL cannot carry a path".into()))?
            .pop_if_empty()
            .push(prefix)
            .push(segment);
        Ok(url)
    }
}

impl AppState {
    /// Build state from configuration, creating the outbound HTTP client.
    pub fn new(config: ServerConfig) -> AppResult<Self> {
        let upstream = match config.comfy_base_url.as_deref() {
            Some(base_url) => {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.upstream_timeout_secs))
                    .build()?;
                Some(Upstream::new(client, base_url)?)
            }
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            upstream,
        })
    }

    /// The configured upstream, or a configuration error.
    pub fn upstream(&self) -> AppResult<&Upstream> {
        self.upstream
            .as_ref()
            .ok_or_else(|| AppError::Configuration(NOT_CONFIGURED.to_string()))
    }
}
