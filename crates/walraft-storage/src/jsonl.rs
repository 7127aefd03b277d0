//! # jsonl
//!
//! why: one append/fsync/recover discipline for every on-disk log in the workspace
//! relations: used by file.rs for raft entries and by walraft-wal for the durable log
//! what: durable line appends, incremental scans, crash-truncated tail repair, atomic rewrite

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// First unparsable line of a log; it and everything after it are discarded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("corrupt record at line {line} (byte {offset}): {reason}")]
pub struct CorruptTail {
    /// 1-based line number, counted from where the scan started
    pub line: u64,
    /// byte offset where the bad line starts
    pub offset: u64,
    /// bytes from `offset` to the end of the file
    pub discarded_bytes: u64,
    pub reason: String,
}

/// How a scan ended
#[derive(Debug, Clone, PartialEq)]
pub enum Tail<T> {
    /// every line was complete and parsed
    Clean,
    /// last line parsed but has no newline yet
    Unterminated(T),
    /// a line failed to parse
    Corrupt(CorruptTail),
}

/// Result of reading a json-lines file from some offset
#[derive(Debug, Clone)]
pub struct Scan<T> {
    /// complete, parsed records in file order
    pub records: Vec<T>,
    /// byte offset just past the last complete record
    pub end: u64,
    pub tail: Tail<T>,
}

impl<T> Scan<T> {
    fn empty(offset: u64) -> Self {
        Self {
            records: Vec::new(),
            end: offset,
            tail: Tail::Clean,
        }
    }
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn invalid_data(e: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Serialize records as newline-terminated json
pub fn encode<T: Serialize>(records: &[T]) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    for record in records {
        serde_json::to_writer(&mut buf, record).map_err(invalid_data)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

/// Append records and fsync before returning
///
/// Returns the number of bytes written.
pub fn append<T: Serialize>(file: &mut File, records: &[T]) -> io::Result<u64> {
    if records.is_empty() {
        return Ok(0);
    }
    let buf = encode(records)?;
    file.write_all(&buf)?;
    file.sync_all()?;
    Ok(buf.len() as u64)
}

/// Open `path` for appending, creating it if missing
pub fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).read(true).open(path)
}

/// Read records from byte `offset` to the end of the file
///
/// A missing file reads as empty. Blank lines are skipped. The scan stops at
/// the first line that does not parse as `T`.
pub fn read_from<T: DeserializeOwned>(path: &Path, offset: u64) -> io::Result<Scan<T>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Scan::empty(offset)),
        Err(e) => return Err(e),
    };
    let file_len = file.metadata()?.len();
    if offset >= file_len {
        return Ok(Scan::empty(offset));
    }
    file.seek(SeekFrom::Start(offset))?;

    let mut reader = BufReader::new(file);
    let mut scan = Scan::empty(offset);
    let mut buf = Vec::new();
    let mut line = 0u64;

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)? as u64;
        if n == 0 {
            break;
        }
        line += 1;
        let terminated = buf.last() == Some(&b'\n');
        let text = trim(&buf);

        if text.is_empty() {
            if terminated {
                scan.end += n;
                continue;
            }
            break;
        }

        match serde_json::from_slice::<T>(text) {
            Ok(record) if terminated => {
                scan.records.push(record);
                scan.end += n;
            }
            Ok(record) => {
                scan.tail = Tail::Unterminated(record);
                break;
            }
            Err(e) => {
                scan.tail = Tail::Corrupt(CorruptTail {
                    line,
                    offset: scan.end,
                    discarded_bytes: file_len - scan.end,
                    reason: e.to_string(),
                });
                break;
            }
        }
    }
    Ok(scan)
}

/// Load every record of `path` and make the file safe to append to
///
/// A corrupt tail (typically a record torn by a crash mid-write) is cut off
/// with `set_len` and fsynced; a valid last record missing its newline gets
/// one. Returns the records and the repair performed, if any.
pub fn load_repaired<T: DeserializeOwned>(path: &Path) -> io::Result<(Vec<T>, Option<CorruptTail>)> {
    let scan = read_from::<T>(path, 0)?;
    let mut records = scan.records;
    match scan.tail {
        Tail::Clean => Ok((records, None)),
        Tail::Unterminated(record) => {
            let mut file = OpenOptions::new().append(true).open(path)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            records.push(record);
            Ok((records, None))
        }
        Tail::Corrupt(corrupt) => {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(corrupt.offset)?;
            file.sync_all()?;
            warn!(
                path = %path.display(),
                line = corrupt.line,
                offset = corrupt.offset,
                discarded = corrupt.discarded_bytes,
                reason = %corrupt.reason,
                "corrupt log tail truncated"
            );
            Ok((records, Some(corrupt)))
        }
    }
}

/// Replace the whole file atomically: write a temp file, fsync, rename
pub fn rewrite<T: Serialize>(path: &Path, records: &[T]) -> io::Result<()> {
    let buf = encode(records)?;
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(&buf)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    info!(path = %path.display(), records = records.len(), "log rewritten");
    Ok(())
}
