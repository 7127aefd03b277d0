//! # storage
//!
//! why: let the node persist its state without knowing where it lives
//! relations: implemented by walraft-storage (files) and here (memory), used by node.rs
//! what: Storage trait, HardState, InMemoryStorage for testing

use crate::log::LogEntry;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::io;

/// State that must survive a restart besides the log itself
///
/// Term and vote are stored together so a restarted node can never vote
/// twice in one term; the commit index is stored apart from the log length so
/// a restart never treats an uncommitted tail as committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardState {
    pub term: u64,
    pub voted_for: Option<NodeId>,
    pub commit_index: u64,
}

/// trait for durable storage of raft state
///
/// every mutating call must be durable when it returns ok.
/// this abstraction allows the same node code to work with:
/// - real filesystem (walraft-storage)
/// - in-memory (testing)
pub trait Storage {
    /// persist term, vote and commit index as one unit
    fn save_hard_state(&mut self, state: &HardState) -> io::Result<()>;

    /// load the persisted hard state (defaults for a fresh node)
    fn load_hard_state(&self) -> io::Result<HardState>;

    /// append entries to the log
    fn append_entries(&mut self, entries: &[LogEntry]) -> io::Result<()>;

    /// load all log entries (for crash recovery)
    fn load_log(&self) -> io::Result<Vec<LogEntry>>;

    /// truncate log from given index (for conflict resolution)
    fn truncate_log_from(&mut self, from_index: u64) -> io::Result<()>;

    /// clear all persisted state (for testing)
    fn clear(&mut self) -> io::Result<()>;
}

/// in-memory storage for testing
///
/// stores all state in memory; survives a node restart only when the same
/// value is handed to the new node
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    hard_state: HardState,
    log: Vec<LogEntry>,
}

impl InMemoryStorage {
    /// create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn save_hard_state(&mut self, state: &HardState) -> io::Result<()> {
        self.hard_state = *state;
        Ok(())
    }

    fn load_hard_state(&self) -> io::Result<HardState> {
        Ok(self.hard_state)
    }

    fn append_entries(&mut self, entries: &[LogEntry]) -> io::Result<()> {
        self.log.extend(entries.iter().cloned());
        Ok(())
    }

    fn load_log(&self) -> io::Result<Vec<LogEntry>> {
        Ok(self.log.clone())
    }

    fn truncate_log_from(&mut self, from_index: u64) -> io::Result<()> {
        self.log.retain(|e| e.index < from_index);
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.hard_state = HardState::default();
        self.log.clear();
        Ok(())
    }
}
