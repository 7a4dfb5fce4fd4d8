//! REST client for the relay's HTTP endpoints.
//!
//! Wraps the four relay operations (liveness, job submission, history
//! retrieval, artifact download) using [`reqwest`]. Each call records
//! its request/response pair in the [`JobLog`].

use serde::Deserialize;
use zimage_core::sanitizer::SanitizedJob;
use zimage_core::types::{Artifact, ArtifactRef, JobHandle, DEFAULT_ARTIFACT_CONTENT_TYPE};

use crate::error::JobError;
use crate::history::{parse_history, HistoryObservation};
use crate::log::JobLog;

/// HTTP client for one relay.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct RelayApi {
    client: reqwest::Client,
    base_url: String,
    log: JobLog,
}

/// Response returned by the relay's submission endpoint.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Engine-assigned identifier for the queued job.
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
    /// Per-node validation errors, when the engine rejected the job.
    #[serde(default)]
    pub node_errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    ok: bool,
}

impl RelayApi {
    /// Create a client for a relay.
    ///
    /// * `base_url` - relay origin, e.g. `https://relay.example.dev`. A
    ///   trailing `/` is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            log: JobLog::default(),
        }
    }

    /// Attach the structured log used for every exchange.
    pub fn with_log(mut self, log: JobLog) -> Self {
        self.log = log;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn log(&self) -> &JobLog {
        &self.log
    }

    /// Ask the relay whether it is alive.
    ///
    /// Never fails: any transport error, non-2xx status or unexpected body
    /// is reported as unreachable.
    pub async fn check_reachability(&self) -> bool {
        let url = format!("{}/api/health", self.base_url);
        self.log.info(format!("Checking relay reachability at {url}"));

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                self.log.exchange("GET", &url, None, None);
                self.log.error(format!("Relay unreachable: {e}"));
                return false;
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        self.log.exchange("GET", &url, Some(status.as_u16()), Some(&body));

        if !status.is_success() {
            self.log.error(format!("Relay health check returned HTTP {status}"));
            return false;
        }

        match serde_json::from_str::<HealthResponse>(&body) {
            Ok(health) => {
                if !health.ok {
                    self.log.warn("Relay reported itself unhealthy");
                }
                health.ok
            }
            Err(e) => {
                self.log.error(format!("Relay health response is malformed: {e}"));
                false
            }
        }
    }

    /// Submit a job for execution.
    ///
    /// Generates a fresh `client_id` correlation token and sends
    /// `POST /api/prompt`. Returns the engine-assigned job handle.
    pub async fn submit(&self, job: &SanitizedJob) -> Result<JobHandle, JobError> {
        let url = format!("{}/api/prompt", self.base_url);
        let client_id = uuid::Uuid::new_v4().simple().to_string();
        let body = serde_json::json!({
            "prompt": job.to_json(),
            "client_id": client_id,
        });

        self.log.info(format!(
            "Submitting job ({} nodes, client_id {client_id})",
            job.job().len()
        ));

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                self.log.exchange("POST", &url, None, None);
                return Err(JobError::Transport(e));
            }
        };

        let status = response.status();
        let text = response.text().await?;
        self.log.exchange("POST", &url, Some(status.as_u16()), Some(&text));

        if !status.is_success() {
            return Err(JobError::SubmissionFailed(format!(
                "relay returned HTTP {status}"
            )));
        }

        let parsed: SubmitResponse = serde_json::from_str(&text).map_err(|e| {
            JobError::SubmissionFailed(format!("relay response is not valid JSON: {e}"))
        })?;

        match parsed.prompt_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                let handle = JobHandle::new(id);
                self.log.info(format!(
                    "Job queued as {handle} (queue position {})",
                    parsed
                        .number
                        .map_or_else(|| "unknown".to_string(), |n| n.to_string())
                ));
                Ok(handle)
            }
            None => {
                let detail = parsed
                    .node_errors
                    .filter(|v| !v.is_null() && v.as_object().map_or(true, |o| !o.is_empty()))
                    .map(|v| format!(" (node errors: {v})"))
                    .unwrap_or_default();
                Err(JobError::SubmissionFailed(format!(
                    "relay response has no prompt_id{detail}"
                )))
            }
        }
    }

    /// Query the history of a job once.
    ///
    /// Failures are folded into [`HistoryObservation::Unavailable`] so the
    /// poller can decide whether to keep going.
    pub async fn fetch_history(&self, handle: &JobHandle) -> HistoryObservation {
        let url = format!("{}/api/history/{}", self.base_url, handle);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                self.log.exchange("GET", &url, None, None);
                return HistoryObservation::Unavailable {
                    reason: format!("request failed: {e}"),
                };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                self.log.exchange("GET", &url, Some(status.as_u16()), None);
                return HistoryObservation::Unavailable {
                    reason: format!("failed to read response body: {e}"),
                };
            }
        };
        self.log.exchange("GET", &url, Some(status.as_u16()), Some(&body));

        if !status.is_success() {
            return HistoryObservation::Unavailable {
                reason: format!("relay returned HTTP {status}"),
            };
        }

        parse_history(&body, handle)
    }

    /// Download an artifact's bytes via `GET /api/view`.
    pub async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Artifact, JobError> {
        let url = format!("{}/api/view", self.base_url);
        self.log.info(format!("Downloading artifact {}", artifact.filename));

        let response = match self
            .client
            .get(&url)
            .query(&[
                ("filename", artifact.filename.as_str()),
                ("subfolder", artifact.subfolder.as_str()),
                ("type", artifact.kind.as_str()),
            ])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.log.exchange("GET", &url, None, None);
                return Err(JobError::Transport(e));
            }
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_ARTIFACT_CONTENT_TYPE)
            .to_string();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            self.log.exchange("GET", &url, Some(status.as_u16()), Some(&body));
            return Err(JobError::DownloadFailed(format!(
                "relay returned HTTP {status} for {}",
                artifact.filename
            )));
        }

        let bytes = response.bytes().await?.to_vec();
        let summary = format!("<{} bytes, {content_type}>", bytes.len());
        self.log.exchange("GET", &url, Some(status.as_u16()), Some(&summary));

        Ok(Artifact {
            bytes,
            content_type,
        })
    }
}
