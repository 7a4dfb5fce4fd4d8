use std::time::Duration;

use zimage_core::error::CoreError;

use crate::api::RelayApi;
use crate::error::JobError;
use crate::log::JobLog;
use crate::poll::PollPolicy;

/// Relay used when nothing else is configured.
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8787";

/// Job client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Relay base URL.
    pub relay_url: String,
    pub poll: PollPolicy,
    /// Timeout of each individual HTTP request to the relay (default: 30 s).
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            poll: PollPolicy::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `ZIMAGE_RELAY_URL`            | `http://127.0.0.1:8787` |
    /// | `ZIMAGE_POLL_INTERVAL_MS`     | `1000`                  |
    /// | `ZIMAGE_POLL_MAX_ATTEMPTS`    | `60`                    |
    /// | `ZIMAGE_REQUEST_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let relay_url = std::env::var("ZIMAGE_RELAY_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.relay_url);

        let interval_ms: u64 = parse_env("ZIMAGE_POLL_INTERVAL_MS", 1000)?;
        let max_attempts: u32 = parse_env("ZIMAGE_POLL_MAX_ATTEMPTS", 60)?;
        let timeout_secs: u64 = parse_env("ZIMAGE_REQUEST_TIMEOUT_SECS", 30)?;

        Ok(Self {
            relay_url,
            poll: PollPolicy {
                interval: Duration::from_millis(interval_ms),
                max_attempts,
            },
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Build a relay client honouring the request timeout.
    pub fn build_api(&self, log: JobLog) -> Result<RelayApi, JobError> {
        let client = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?;
        Ok(RelayApi::with_client(client, &self.relay_url).with_log(log))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{name} must be a valid number, got {raw:?}"))),
        _ => Ok(default),
    }
}
