//! # recovery
//!
//! why: state after a crash must come from the log alone, never from memory
//! relations: reads via log.rs, merges with state.rs, used by CanonicalState::open/reload/verify
//! what: RecoveryEngine two-pass replay of committed transitions

use crate::error::Result;
use crate::log::read_records;
use crate::record::{LogRecord, RecordStatus};
use crate::state::merge_event;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// State rebuilt from a durable log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recovered {
    pub data: BTreeMap<String, Value>,
    pub version: u64,
    /// sequences replayed, ascending
    pub applied: Vec<u64>,
    /// committed sequences with no pending record to replay
    pub orphaned: Vec<u64>,
}

/// Rebuilds canonical state by replaying committed records only
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    path: PathBuf,
}

impl RecoveryEngine {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the log and replay it
    pub fn recover(&self) -> Result<Recovered> {
        let records = read_records(&self.path)?;
        let recovered = Self::replay(&records);
        info!(
            path = %self.path.display(),
            records = records.len(),
            version = recovered.version,
            orphaned = recovered.orphaned.len(),
            "recovery complete"
        );
        Ok(recovered)
    }

    /// Replay records in memory
    ///
    /// The first pass finds which sequences are committed and not failed and
    /// which pending payloads exist; the second applies them in ascending
    /// sequence order. Pending records with no committed marker are ignored.
    pub fn replay(records: &[LogRecord]) -> Recovered {
        let mut committed = BTreeSet::new();
        let mut failed = HashSet::new();
        let mut pending: HashMap<u64, &LogRecord> = HashMap::new();

        for record in records {
            match record.status {
                RecordStatus::Pending { .. } => {
                    pending.entry(record.seq).or_insert(record);
                }
                RecordStatus::Committed => {
                    committed.insert(record.seq);
                }
                RecordStatus::Failed { .. } => {
                    failed.insert(record.seq);
                }
            }
        }

        let mut recovered = Recovered::default();
        for seq in committed.into_iter().filter(|seq| !failed.contains(seq)) {
            let Some(event) = pending.get(&seq).and_then(|r| r.event()) else {
                warn!(seq, "committed record has no pending payload, skipping");
                recovered.orphaned.push(seq);
                continue;
            };
            match merge_event(&recovered.data, event) {
                Ok(next) => recovered.data = next,
                // counted anyway: the live writer committed it
                Err(reason) => warn!(seq, reason = %reason, "committed event could not be merged"),
            }
            recovered.version += 1;
            recovered.applied.push(seq);
        }
        recovered
    }
}
