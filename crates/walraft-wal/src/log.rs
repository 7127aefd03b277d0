//! # log
//!
//! why: the append-before-apply record stream that defines the canonical version
//! relations: built on walraft_storage::jsonl, owned by state.rs, replayed by recovery.rs
//! what: DurableLog (append, mark_committed, mark_failed, read_all, incremental committed count)

use crate::error::{Result, WalError};
use crate::record::{LogRecord, RecordStatus};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walraft_storage::jsonl::{self, Tail};
use walraft_storage::CorruptTail;

/// Append-only, fsynced log of pending/committed/failed records
///
/// Besides writing, the log keeps a running count of committed transitions
/// and the byte offset it has read up to. Every count refresh reads only
/// what was appended since, so records written through other handles on the
/// same file are observed without rescanning the whole log.
#[derive(Debug)]
pub struct DurableLog {
    path: PathBuf,
    file: File,
    next_seq: u64,
    /// sequences recovery would replay: pending and committed, never failed
    committed: u64,
    /// pending sequences with no committed/failed marker yet
    outstanding: HashSet<u64>,
    pending: HashSet<u64>,
    committed_seqs: HashSet<u64>,
    failed: HashSet<u64>,
    /// bytes of the file already folded into the counters
    offset: u64,
    repaired: Option<CorruptTail>,
}

impl DurableLog {
    /// Open (or create) the log at `path`, repairing a torn tail
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let (_, repaired) = jsonl::load_repaired::<Value>(&path)?;
        let file = jsonl::open_append(&path)?;

        let mut log = Self {
            path,
            file,
            next_seq: 1,
            committed: 0,
            outstanding: HashSet::new(),
            pending: HashSet::new(),
            committed_seqs: HashSet::new(),
            failed: HashSet::new(),
            offset: 0,
            repaired,
        };
        log.refresh()?;
        debug!(
            path = %log.path.display(),
            next_seq = log.next_seq,
            committed = log.committed,
            "durable log opened"
        );
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The corrupt tail cut off when opening, if there was one
    pub fn repaired_tail(&self) -> Option<&CorruptTail> {
        self.repaired.as_ref()
    }

    /// Sequence number the next append will receive
    pub fn next_sequence(&self) -> u64 {
        self.next_seq
    }

    /// Write a pending record for `transition`; durable when this returns
    pub fn append(&mut self, transition: Value) -> Result<u64> {
        self.refresh()?;
        let seq = self.next_seq;
        self.write(&LogRecord::pending(seq, transition))?;
        debug!(seq, "pending record appended");
        Ok(seq)
    }

    /// Append a committed marker for a pending `seq`
    pub fn mark_committed(&mut self, seq: u64) -> Result<()> {
        self.ensure_pending(seq)?;
        self.write(&LogRecord::committed(seq))?;
        debug!(seq, "record committed");
        Ok(())
    }

    /// Append a failed marker; the sequence is never replayed
    pub fn mark_failed(&mut self, seq: u64, reason: &str) -> Result<()> {
        self.ensure_pending(seq)?;
        self.write(&LogRecord::failed(seq, reason))?;
        warn!(seq, reason, "record marked failed");
        Ok(())
    }

    /// Number of committed transitions currently in the log
    pub fn committed_count(&mut self) -> Result<u64> {
        self.refresh()?;
        Ok(self.committed)
    }

    /// Every decodable record in file order; a missing file is empty
    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        read_records(&self.path)
    }

    fn ensure_pending(&mut self, seq: u64) -> Result<()> {
        self.refresh()?;
        if self.outstanding.contains(&seq) {
            Ok(())
        } else {
            Err(WalError::NotPending(seq))
        }
    }

    fn write(&mut self, record: &LogRecord) -> Result<()> {
        jsonl::append(&mut self.file, std::slice::from_ref(record))?;
        self.refresh()
    }

    /// Fold records appended since `offset` into the counters
    fn refresh(&mut self) -> Result<()> {
        let scan = jsonl::read_from::<Value>(&self.path, self.offset)?;
        for value in scan.records {
            if let Some(record) = decode(value) {
                self.absorb(&record);
            }
        }
        self.offset = scan.end;
        if let Tail::Corrupt(corrupt) = scan.tail {
            // a write still in flight from another handle looks the same
            debug!(offset = corrupt.offset, "unreadable record after counted prefix");
        }
        Ok(())
    }

    /// Same rule as recovery: a committed marker, a pending record, and no failed marker
    fn replayable(&self, seq: u64) -> bool {
        self.committed_seqs.contains(&seq) && self.pending.contains(&seq) && !self.failed.contains(&seq)
    }

    fn absorb(&mut self, record: &LogRecord) {
        let seq = record.seq;
        self.next_seq = self.next_seq.max(seq + 1);
        let before = self.replayable(seq);
        match record.status {
            RecordStatus::Pending { .. } => {
                if self.pending.insert(seq) && !self.committed_seqs.contains(&seq) && !self.failed.contains(&seq) {
                    self.outstanding.insert(seq);
                }
            }
            RecordStatus::Committed => {
                self.outstanding.remove(&seq);
                self.committed_seqs.insert(seq);
            }
            RecordStatus::Failed { .. } => {
                self.outstanding.remove(&seq);
                self.failed.insert(seq);
            }
        }
        match (before, self.replayable(seq)) {
            (false, true) => self.committed += 1,
            (true, false) => self.committed -= 1,
            _ => {}
        }
    }
}

/// Read every decodable record from a durable log file
///
/// Valid JSON that is not a record is skipped with a warning; the first
/// line that is not JSON at all ends the log.
pub fn read_records(path: &Path) -> Result<Vec<LogRecord>> {
    let scan = jsonl::read_from::<Value>(path, 0)?;
    let mut values = scan.records;
    match scan.tail {
        Tail::Clean => {}
        Tail::Unterminated(value) => values.push(value),
        Tail::Corrupt(corrupt) => {
            warn!(path = %path.display(), line = corrupt.line, reason = %corrupt.reason, "log ends at unreadable record");
        }
    }
    Ok(values.into_iter().filter_map(decode).collect())
}

fn decode(value: Value) -> Option<LogRecord> {
    match serde_json::from_value::<LogRecord>(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, "skipping malformed log record");
            None
        }
    }
}
