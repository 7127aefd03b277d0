//! # log
//!
//! why: manage the append-only log of commands that raft replicates
//! relations: used by node.rs for replication, persisted via walraft-storage
//! what: LogEntry struct, log-matching checks over a 1-indexed entry slice

use crate::command::Command;
use serde::{Deserialize, Serialize};

/// A single entry in the replicated log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The term when this entry was created
    pub term: u64,
    /// The index of this entry in the log (1-indexed)
    pub index: u64,
    /// The command to be applied to the state machine
    pub command: Command,
}

impl LogEntry {
    /// Create a new log entry
    pub fn new(term: u64, index: u64, command: Command) -> Self {
        Self { term, index, command }
    }
}

/// Entry at `index` in a log whose first entry has index 1
pub fn entry_at(log: &[LogEntry], index: u64) -> Option<&LogEntry> {
    if index == 0 {
        return None;
    }
    log.get((index - 1) as usize)
}

/// Term of the entry at `index`; index 0 is the empty prefix with term 0
pub fn term_at(log: &[LogEntry], index: u64) -> u64 {
    entry_at(log, index).map(|e| e.term).unwrap_or(0)
}

/// Log-matching check: does `log` hold an entry at `prev_index` with `prev_term`?
///
/// The empty prefix (index 0) always matches.
pub fn matches_prefix(log: &[LogEntry], prev_index: u64, prev_term: u64) -> bool {
    if prev_index == 0 {
        return true;
    }
    match entry_at(log, prev_index) {
        Some(entry) => entry.term == prev_term,
        None => false,
    }
}
