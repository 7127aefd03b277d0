//! # record
//!
//! why: one line format shared by the writer, the version counter and recovery
//! relations: written by log.rs, read by log.rs and recovery.rs
//! what: LogRecord and its pending/committed/failed status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One line of the durable log
///
/// Pending, committed and failed records share one sequence space: a
/// committed or failed record refers back to the pending record with the
/// same `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecordStatus {
    Pending {
        #[serde(default)]
        transition: Value,
    },
    Committed,
    Failed {
        #[serde(default)]
        reason: String,
    },
}

impl LogRecord {
    pub fn pending(seq: u64, transition: Value) -> Self {
        Self::now(seq, RecordStatus::Pending { transition })
    }

    pub fn committed(seq: u64) -> Self {
        Self::now(seq, RecordStatus::Committed)
    }

    pub fn failed(seq: u64, reason: impl Into<String>) -> Self {
        Self::now(seq, RecordStatus::Failed { reason: reason.into() })
    }

    fn now(seq: u64, status: RecordStatus) -> Self {
        Self {
            seq,
            ts: Some(Utc::now()),
            status,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, RecordStatus::Pending { .. })
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.status, RecordStatus::Committed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RecordStatus::Failed { .. })
    }

    /// The event carried by a pending record
    ///
    /// Accepts both `{"event": {..}, ..}` envelopes and a bare payload.
    pub fn event(&self) -> Option<&Value> {
        match &self.status {
            RecordStatus::Pending { transition } => Some(match transition.get("event") {
                Some(event) => event,
                None => transition,
            }),
            _ => None,
        }
    }
}

/// Payload written for a transition: the event and the version it was checked against
pub fn transition_payload(event: &Value, version_before: u64) -> Value {
    json!({ "event": event, "version_before": version_before })
}
