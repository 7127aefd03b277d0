//! # file
//!
//! why: durable raft state that survives process crashes
//! relations: implements walraft_core::Storage on top of jsonl.rs
//! what: FileStorage with an append-only log.jsonl and an atomically replaced meta.json

use crate::jsonl::{self, CorruptTail};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walraft_core::{HardState, LogEntry, Storage};

/// file-based storage implementation using std::fs
///
/// stores raft state in a directory with:
/// - meta.json: term, voted_for and commit_index
/// - log.jsonl: one log entry per line, appended and fsynced
#[derive(Debug)]
pub struct FileStorage {
    /// directory path for storing state files
    dir: PathBuf,
    /// tail repair performed when this storage was opened
    repaired: Option<CorruptTail>,
}

impl FileStorage {
    /// open a filestorage at the given directory
    ///
    /// creates the directory if it doesn't exist and repairs a torn log tail
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let log_path = dir.join("log.jsonl");
        let (_, repaired) = jsonl::load_repaired::<LogEntry>(&log_path)?;
        info!(dir = %dir.display(), repaired = repaired.is_some(), "file storage opened");
        Ok(Self { dir, repaired })
    }

    /// directory holding this node's files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// the corrupt tail cut off when opening, if there was one
    pub fn repaired_tail(&self) -> Option<&CorruptTail> {
        self.repaired.as_ref()
    }

    /// get the path to the metadata file
    pub fn meta_path(&self) -> PathBuf {
        self.dir.join("meta.json")
    }

    /// get the path to the log file
    pub fn log_path(&self) -> PathBuf {
        self.dir.join("log.jsonl")
    }
}

impl Storage for FileStorage {
    fn save_hard_state(&mut self, state: &HardState) -> io::Result<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // atomic write: write to temp file then rename
        let temp_path = self.dir.join("meta.tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, self.meta_path())?;

        debug!(term = state.term, voted_for = ?state.voted_for, commit = state.commit_index, "hard state saved");
        Ok(())
    }

    fn load_hard_state(&self) -> io::Result<HardState> {
        let path = self.meta_path();
        if !path.exists() {
            return Ok(HardState::default()); // default for new nodes
        }

        let mut file = File::open(&path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        serde_json::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn append_entries(&mut self, entries: &[LogEntry]) -> io::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut file = jsonl::open_append(&self.log_path())?;
        jsonl::append(&mut file, entries)?;
        Ok(())
    }

    /// reads the log, cutting off any tail torn since the storage was opened
    fn load_log(&self) -> io::Result<Vec<LogEntry>> {
        let (log, _) = jsonl::load_repaired(&self.log_path())?;
        Ok(log)
    }

    fn truncate_log_from(&mut self, from_index: u64) -> io::Result<()> {
        let mut log = self.load_log()?;
        let before = log.len();
        log.retain(|e| e.index < from_index);
        if log.len() == before {
            return Ok(());
        }
        jsonl::rewrite(&self.log_path(), &log)
    }

    fn clear(&mut self) -> io::Result<()> {
        for path in [self.meta_path(), self.log_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        self.repaired = None;
        Ok(())
    }
}

/// Cut `bytes` off the end of a file, simulating a write torn by a crash
///
/// Used by tests and fault-injection harnesses.
pub fn chop_tail(path: &Path, bytes: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    file.set_len(len.saturating_sub(bytes))?;
    file.sync_all()
}
