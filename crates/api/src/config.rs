/// Relay configuration loaded from environment variables.
///
/// Everything except the upstream address has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8787`).
    pub port: u16,
    /// Upstream engine base address with any trailing `/` removed.
    /// `None` when unset or blank; every route except preflight then
    /// answers 500.
    pub comfy_base_url: Option<String>,
    /// Inbound request timeout in seconds (default: `75`).
    pub request_timeout_secs: u64,
    /// Timeout of each outbound upstream call in seconds (default: `60`).
    pub upstream_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default   |
    /// |-------------------------|-----------|
    /// | `HOST`                  | `0.0.0.0` |
    /// | `PORT`                  | `8787`    |
    /// | `COMFY_BASE_URL`        | unset     |
    /// | `REQUEST_TIMEOUT_SECS`  | `75`      |
    /// | `UPSTREAM_TIMEOUT_SECS` | `60`      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8787".into())
            .parse()
            .expect("PORT must be a valid u16");

        let comfy_base_url = normalize_base_url(std::env::var("COMFY_BASE_URL").ok());

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "75".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let upstream_timeout_secs: u64 = std::env::var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("UPSTREAM_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            comfy_base_url,
            request_timeout_secs,
            upstream_timeout_secs,
        }
    }
}

/// Trim whitespace and trailing slashes; blank means unset.
pub fn normalize_base_url(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped() {
        assert_eq!(
            normalize_base_url(Some("https://engine.example.dev/".into())).as_deref(),
            Some("https://engine.example.dev")
        );
    }

    #[test]
    fn blank_is_unset() {
        assert_eq!(normalize_base_url(Some("  ".into())), None);
        assert_eq!(normalize_base_url(Some("/".into())), None);
        assert_eq!(normalize_base_url(None), None);
    }
}
