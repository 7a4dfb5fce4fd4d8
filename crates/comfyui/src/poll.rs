//! Bounded history polling.
//!
//! After submission the engine gives no push notification through the
//! relay, so [`poll_for_artifact`] queries the job's history at a fixed
//! interval until an output artifact appears, the attempt bound runs out,
//! or the [`CancellationToken`] is triggered.
//!
//! Only the attempt bound terminates the loop: non-2xx answers, transport
//! hiccups and records that carry an execution error are logged and the
//! loop carries on.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use zimage_core::types::{ArtifactRef, JobHandle};

use crate::api::RelayApi;
use crate::error::JobError;
use crate::history::HistoryObservation;

/// Tunable parameters for history polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause before each history query.
    pub interval: Duration,
    /// Maximum number of history queries.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 60,
        }
    }
}

impl PollPolicy {
    /// Worst-case time spent waiting between queries.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Poll the relay until the job's first artifact is available.
///
/// Scans each record's outputs in reported order and returns as soon as a
/// node with a non-empty artifact list is seen.
pub async fn poll_for_artifact(
    api: &RelayApi,
    handle: &JobHandle,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<ArtifactRef, JobError> {
    let log = api.log();
    let started = Instant::now();
    let mut last_record: Option<serde_json::Value> = None;

    log.info(format!(
        "Polling job {handle} every {} ms, at most {} attempts",
        policy.interval.as_millis(),
        policy.max_attempts
    ));

    for attempt in 1..=policy.max_attempts {
        tokio::select! {
            _ = cancel.cancelled() => {
                log.warn(format!("Polling of job {handle} cancelled"));
                return Err(JobError::Cancelled);
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }

        let observation = tokio::select! {
            _ = cancel.cancelled() => {
                log.warn(format!("Polling of job {handle} cancelled"));
                return Err(JobError::Cancelled);
            }
            observation = api.fetch_history(handle) => observation,
        };

        match observation {
            HistoryObservation::Unavailable { reason } => {
                log.warn(format!("Poll attempt {attempt}: {reason}, retrying"));
            }
            HistoryObservation::Pending => {
                log.debug(format!("Poll attempt {attempt}: job {handle} not ready"));
            }
            HistoryObservation::Record { record, raw } => {
                if let Some(artifact) = record.first_artifact() {
                    log.info(format!(
                        "Job {handle} produced {} after {attempt} attempts ({:.1}s)",
                        artifact.filename,
                        started.elapsed().as_secs_f64()
                    ));
                    return Ok(artifact.clone());
                }
                if let Some(error) = record.status_error() {
                    log.error(format!(
                        "Poll attempt {attempt}: engine reports an error for job {handle}: {error}"
                    ));
                } else {
                    log.debug(format!(
                        "Poll attempt {attempt}: job {handle} has no outputs yet"
                    ));
                }
                last_record = Some(raw);
            }
        }
    }

    let last_seen = last_record
        .as_ref()
        .map_or_else(|| "none".to_string(), |r| r.to_string());
    log.error(format!(
        "Gave up on job {handle} after {} attempts ({:.1}s); last record: {last_seen}",
        policy.max_attempts,
        started.elapsed().as_secs_f64()
    ));

    Err(JobError::PollTimeout {
        handle: handle.clone(),
        attempts: policy.max_attempts,
        last_record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_one_per_second_for_a_minute() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 60);
        assert_eq!(policy.ceiling(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn cancellation_token_stops_polling() {
        let cancel = CancellationToken::new();
        // Cancel immediately -- no request should be attempted.
        cancel.cancel();

        let api = RelayApi::new("http://127.0.0.1:9");
        let result = poll_for_artifact(
            &api,
            &JobHandle::new("abc"),
            &PollPolicy::default(),
            &cancel,
        )
        .await;
        assert!(matches!(result, Err(JobError::Cancelled)));
    }

    #[tokio::test]
    async fn zero_attempts_times_out_immediately() {
        let api = RelayApi::new("http://127.0.0.1:9");
        let policy = PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: 0,
        };
        let result = poll_for_artifact(
            &api,
            &JobHandle::new("abc"),
            &policy,
            &CancellationToken::new(),
        )
        .await;
        match result {
            Err(JobError::PollTimeout {
                attempts,
                last_record,
                ..
            }) => {
                assert_eq!(attempts, 0);
                assert!(last_record.is_none());
            }
            other => panic!("expected PollTimeout, got {other:?}"),
        }
    }
}
