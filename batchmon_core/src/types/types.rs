use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque identity of a batch run.
///
/// The backend hands out numeric ids, but nothing in the monitor relies on
/// that; ids are carried as text and only ever compared or printed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<u64> for BatchId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for BatchId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BatchId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for BatchId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => BatchId::from(n),
            RawId::Text(s) => BatchId(s),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl BatchStatus {
    /// COMPLETED and FAILED end a batch; nothing is polled past them.
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::Pending => "PENDING",
            BatchStatus::Running => "RUNNING",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
        };
        f.pad(s)
    }
}

/// One point-in-time reading of a batch run.
///
/// `current_quantity` may overshoot `target_quantity`; consumers clamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub target_quantity: f64,
    pub current_quantity: f64,
}

impl ProgressSample {
    pub fn new(
        batch_id: BatchId,
        status: BatchStatus,
        target_quantity: f64,
        current_quantity: f64,
    ) -> Self {
        Self {
            batch_id,
            status,
            target_quantity,
            current_quantity,
        }
    }
}

/// Registry record for a batch run, as served by `/api/batch-runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRun {
    pub id: BatchId,
    pub recipe_id: Option<u64>,
    pub batch_number: String,
    pub target_quantity: f64,
    #[serde(default)]
    pub actual_quantity: Option<f64>,
    pub status: BatchStatus,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub operator_name: Option<String>,
}

/// Reply to a start/stop command issued through the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCommandAck {
    pub message: String,
    #[serde(default)]
    pub batch_number: Option<String>,
    #[serde(default)]
    pub status: Option<BatchStatus>,
    #[serde(default)]
    pub id: Option<BatchId>,
}

/// Failures reported by the batch collaborators (progress source, registry).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("batch run {0} not found")]
    NotFound(BatchId),
    #[error("server returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid backend URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}
