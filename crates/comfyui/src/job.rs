//! Per-job state machine.
//!
//! A [`JobRunner`] drives exactly one job through
//! `Idle -> Submitting -> Polling -> Downloading -> {Succeeded, Failed}`.
//! Runners share nothing but the [`RelayApi`] configuration, so any number
//! of them may run concurrently on separate tasks.

use std::fmt;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use zimage_core::request::GenerationRequest;
use zimage_core::sanitizer::{SanitizeReport, SanitizedJob};
use zimage_core::template::{default_template, JobTemplate};
use zimage_core::types::{Artifact, ArtifactRef, JobHandle};

use crate::api::RelayApi;
use crate::error::JobError;
use crate::poll::{poll_for_artifact, PollPolicy};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Submitting,
    Polling,
    Downloading,
    Succeeded,
    Failed,
}

impl JobState {
    /// Whether the job can make no further progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Idle => "idle",
            JobState::Submitting => "submitting",
            JobState::Polling => "polling",
            JobState::Downloading => "downloading",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Everything produced by a successful [`JobRunner::run`].
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub prompt_id: JobHandle,
    pub seed: u64,
    pub artifact_ref: ArtifactRef,
    pub artifact: Artifact,
    pub report: SanitizeReport,
    /// Wall-clock time from submission to downloaded bytes.
    pub elapsed: Duration,
}

/// Drives a single job against one relay.
#[derive(Debug)]
pub struct JobRunner {
    api: RelayApi,
    policy: PollPolicy,
    template: JobTemplate,
    cancel: CancellationToken,
    state: JobState,
    handle: Option<JobHandle>,
    last_error: Option<String>,
}

impl JobRunner {
    /// Runner using the built-in template and the default poll policy.
    pub fn new(api: RelayApi) -> Self {
        Self {
            api,
            policy: PollPolicy::default(),
            template: default_template().clone(),
            cancel: CancellationToken::new(),
            state: JobState::Idle,
            handle: None,
            last_error: None,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a caller-supplied template instead of the built-in one.
    pub fn with_template(mut self, template: JobTemplate) -> Self {
        self.template = template;
        self
    }

    /// Abort polling when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Human-readable message of the error that failed the job, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Handle issued by the engine once the job has been submitted.
    pub fn handle(&self) -> Option<&JobHandle> {
        self.handle.as_ref()
    }

    pub fn api(&self) -> &RelayApi {
        &self.api
    }

    /// Submit a sanitized job. Valid only from `Idle`.
    pub async fn submit(&mut self, job: &SanitizedJob) -> Result<JobHandle, JobError> {
        self.expect_state("submit", JobState::Idle)?;
        self.state = JobState::Submitting;

        let result = self.api.submit(job).await;
        let handle = self.settle(result)?;

        self.handle = Some(handle.clone());
        self.state = JobState::Polling;
        Ok(handle)
    }

    /// Wait for the submitted job's first artifact. Valid only from `Polling`.
    pub async fn poll(&mut self) -> Result<ArtifactRef, JobError> {
        self.expect_state("poll", JobState::Polling)?;
        let Some(handle) = self.handle.clone() else {
            return Err(JobError::InvalidState {
                operation: "poll",
                state: self.state,
            });
        };

        let result = poll_for_artifact(&self.api, &handle, &self.policy, &self.cancel).await;
        let artifact_ref = self.settle(result)?;

        self.state = JobState::Downloading;
        Ok(artifact_ref)
    }

    /// Download the resolved artifact. Valid only from `Downloading`.
    pub async fn fetch_artifact(&mut self, artifact_ref: &ArtifactRef) -> Result<Artifact, JobError> {
        self.expect_state("download", JobState::Downloading)?;

        let result = self.api.fetch_artifact(artifact_ref).await;
        let artifact = self.settle(result)?;

        self.state = JobState::Succeeded;
        Ok(artifact)
    }

    /// Sanitize the template for `request`, then submit, poll and download.
    pub async fn run(&mut self, request: &GenerationRequest) -> Result<GenerationOutcome, JobError> {
        let log = self.api.log().clone();
        log.info(format!("Using seed {}", request.seed()));

        let job = request.apply(&self.template);
        let report = job.report().clone();
        log.info(format!(
            "Sanitized job: {} nodes before, {} after",
            report.nodes_before, report.nodes_after
        ));
        if !report.removed.is_empty() {
            log.info(format!("Removed nodes: {}", report.removed.join(", ")));
        }
        for dangling in &report.dangling {
            log.warn(format!(
                "Node {} input {} still references removed node {}",
                dangling.node_id, dangling.input, dangling.target
            ));
        }

        let started = Instant::now();
        let prompt_id = self.submit(&job).await?;
        let artifact_ref = self.poll().await?;
        let artifact = self.fetch_artifact(&artifact_ref).await?;
        let elapsed = started.elapsed();

        log.info(format!(
            "Job {prompt_id} finished in {:.1}s ({} bytes)",
            elapsed.as_secs_f64(),
            artifact.len()
        ));

        Ok(GenerationOutcome {
            prompt_id,
            seed: request.seed(),
            artifact_ref,
            artifact,
            report,
            elapsed,
        })
    }

    fn expect_state(&self, operation: &'static str, expected: JobState) -> Result<(), JobError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(JobError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Move to `Failed` and remember the message when `result` is an error.
    fn settle<T>(&mut self, result: Result<T, JobError>) -> Result<T, JobError> {
        if let Err(e) = &result {
            self.state = JobState::Failed;
            self.last_error = Some(e.to_string());
            self.api.log().error(e.to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn state_display_is_lowercase() {
        assert_eq!(JobState::Downloading.to_string(), "downloading");
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Polling.is_terminal());
    }

    #[test]
    fn new_runner_is_idle() {
        let runner = JobRunner::new(RelayApi::new("http://127.0.0.1:9"));
        assert_eq!(runner.state(), JobState::Idle);
        assert!(runner.last_error().is_none());
        assert!(runner.handle().is_none());
    }

    #[tokio::test]
    async fn poll_before_submit_is_rejected() {
        let mut runner = JobRunner::new(RelayApi::new("http://127.0.0.1:9"));
        let err = runner.poll().await.unwrap_err();
        assert_matches!(
            err,
            JobError::InvalidState {
                operation: "poll",
                state: JobState::Idle
            }
        );
        // Out-of-order calls do not fail the job.
        assert_eq!(runner.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn transport_failure_on_submit_fails_job() {
        // Port 9 (discard) is expected to refuse connections.
        let mut runner = JobRunner::new(RelayApi::new("http://127.0.0.1:9"));
        let request = GenerationRequest::new("a red fox", Some(42)).unwrap();
        let err = runner.run(&request).await.unwrap_err();
        assert_matches!(err, JobError::Transport(_));
        assert_eq!(runner.state(), JobState::Failed);
        assert!(runner.last_error().unwrap().contains("HTTP request failed"));
    }
}
