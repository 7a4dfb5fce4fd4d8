//! Identifiers and artifact addressing shared by the client and the relay.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default artifact `type` used by the engine for saved outputs.
pub const DEFAULT_ARTIFACT_TYPE: &str = "output";

/// Content type assumed when the engine does not declare one.
pub const DEFAULT_ARTIFACT_CONTENT_TYPE: &str = "image/png";

/// Opaque job identifier issued by the engine when a job is queued
/// (the engine calls it `prompt_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of one binary artifact on the engine. Carries no bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_artifact_type")]
    pub kind: String,
}

fn default_artifact_type() -> String {
    DEFAULT_ARTIFACT_TYPE.to_string()
}

impl ArtifactRef {
    pub fn new(
        filename: impl Into<String>,
        subfolder: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            subfolder: subfolder.into(),
            kind: kind.into(),
        }
    }

    /// File name to save the artifact under locally.
    ///
    /// Uses the engine-assigned filename (without any directory part), or
    /// `z-image-<unix-millis>.png` when the engine returned an empty name.
    pub fn suggested_file_name(&self) -> String {
        let base = self
            .filename
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or_default()
            .trim();
        if base.is_empty() {
            format!("z-image-{}.png", chrono::Utc::now().timestamp_millis())
        } else {
            base.to_string()
        }
    }
}

/// Raw artifact payload fetched from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
