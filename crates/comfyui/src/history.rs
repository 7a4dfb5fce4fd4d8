//! Engine history records, as relayed by `GET /api/history/{prompt_id}`.
//!
//! The engine answers with an object keyed by prompt ID:
//!
//! ```json
//! {
//!   "abc123": {
//!     "outputs": { "9": { "images": [{ "filename": "Z-Image_00001_.png", "subfolder": "", "type": "output" }] } },
//!     "status": { "status_str": "success", "completed": true, "messages": [] }
//!   }
//! }
//! ```
//!
//! An empty object means the job is not queued or not visible yet.

use indexmap::IndexMap;
use serde::Deserialize;
use zimage_core::types::{ArtifactRef, JobHandle};

/// `status_str` value the engine uses for failed executions.
const STATUS_ERROR: &str = "error";

/// Message type carrying the exception details of a failed execution.
const MSG_EXECUTION_ERROR: &str = "execution_error";

/// History entry for one job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryRecord {
    /// Node ID -> produced outputs, in the order the engine reported them.
    #[serde(default)]
    pub outputs: Option<IndexMap<String, NodeOutput>>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// Outputs produced by one node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ArtifactRef>,
}

/// Execution status block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// `[type, data]` pairs emitted during execution.
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

impl JobStatus {
    /// Human-readable error, if the engine reports the job as failed.
    pub fn error(&self) -> Option<String> {
        if self.status_str.as_deref() != Some(STATUS_ERROR) {
            return None;
        }

        let detail = self.messages.iter().find_map(|msg| {
            let pair = msg.as_array()?;
            if pair.first()?.as_str()? != MSG_EXECUTION_ERROR {
                return None;
            }
            let data = pair.get(1)?;
            let message = data.get("exception_message")?.as_str()?.trim();
            match data.get("node_id").and_then(|v| v.as_str()) {
                Some(node) => Some(format!("node {node}: {message}")),
                None => Some(message.to_string()),
            }
        });

        Some(detail.unwrap_or_else(|| "engine reported an execution error".to_string()))
    }
}

impl HistoryRecord {
    /// First artifact of the first node (in reported order) whose artifact
    /// list is non-empty.
    pub fn first_artifact(&self) -> Option<&ArtifactRef> {
        self.outputs
            .as_ref()?
            .values()
            .find_map(|output| output.images.first())
    }

    /// Error reported in the status block, if any.
    pub fn status_error(&self) -> Option<String> {
        self.status.as_ref().and_then(JobStatus::error)
    }
}

/// Outcome of a single history query.
#[derive(Debug, Clone)]
pub enum HistoryObservation {
    /// The relay could not answer usefully (non-2xx, transport failure,
    /// unreadable body). Polling continues.
    Unavailable { reason: String },
    /// No record for the handle yet.
    Pending,
    /// A record exists. `raw` is kept for diagnostics.
    Record {
        record: HistoryRecord,
        raw: serde_json::Value,
    },
}

/// Interpret a history response body for `handle`.
pub fn parse_history(body: &str, handle: &JobHandle) -> HistoryObservation {
    let json: serde_json::Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) => {
            return HistoryObservation::Unavailable {
                reason: format!("history response is not valid JSON: {e}"),
            }
        }
    };

    let Some(raw) = json.get(handle.as_str()) else {
        return HistoryObservation::Pending;
    };
    if raw.is_null() {
        return HistoryObservation::Pending;
    }

    match serde_json::from_value::<HistoryRecord>(raw.clone()) {
        Ok(record) => HistoryObservation::Record {
            record,
            raw: raw.clone(),
        },
        Err(e) => HistoryObservation::Unavailable {
            reason: format!("history record is malformed: {e}"),
        },
    }
}
