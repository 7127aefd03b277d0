//! # error
//!
//! why: callers must tell "nothing happened, retry" apart from "state advanced"
//! relations: returned by log.rs, state.rs and recovery.rs
//! what: WalError for durability failures, TransitionError for transition outcomes

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WalError>;

/// Failures of the durable log itself; always fatal to the operation in flight
#[derive(Debug, Error)]
pub enum WalError {
    #[error("wal i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// status markers may only follow a pending record
    #[error("sequence {0} is not pending")]
    NotPending(u64),
}

/// Mismatch between the version a caller or the in-memory mirror holds and the log
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionConflict {
    /// in-memory state drifted from the log; reload before doing anything else
    #[error("local out of sync with log (local version {local}, log version {log})")]
    OutOfSync { local: u64, log: u64 },

    /// another writer got there first; reload and retry
    #[error("optimistic concurrency violation (expected version {expected}, actual {actual})")]
    Stale { expected: u64, actual: u64 },
}

impl VersionConflict {
    /// Desync is a bug-class fault; a stale expectation is routine contention
    pub fn is_fatal(&self) -> bool {
        matches!(self, VersionConflict::OutOfSync { .. })
    }
}

/// Why a transition did not advance the version
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("version conflict: {0}")]
    VersionConflict(#[from] VersionConflict),

    /// the event was logged, failed to apply, and is marked failed
    #[error("transition {seq} failed to apply: {reason}")]
    ApplyFailed { seq: u64, reason: String },

    #[error(transparent)]
    Storage(#[from] WalError),
}

impl From<io::Error> for TransitionError {
    fn from(e: io::Error) -> Self {
        TransitionError::Storage(WalError::Io(e))
    }
}

impl TransitionError {
    /// Whether reloading and retrying can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransitionError::VersionConflict(conflict) => !conflict.is_fatal(),
            TransitionError::ApplyFailed { .. } | TransitionError::Storage(_) => false,
        }
    }
}
