//! # walraft-wal
//!
//! why: single-node write-ahead log with version-checked state transitions
//! relations: records stored via walraft_storage::jsonl, merge semantics from walraft-core
//! what: DurableLog, LogRecord, CanonicalState, RecoveryEngine, transition errors

pub mod error;
pub mod log;
pub mod record;
pub mod recovery;
pub mod state;

pub use error::{Result, TransitionError, VersionConflict, WalError};
pub use log::DurableLog;
pub use record::{LogRecord, RecordStatus};
pub use recovery::{Recovered, RecoveryEngine};
pub use state::{merge_event, CanonicalState, Committed};
pub use walraft_storage::CorruptTail;
