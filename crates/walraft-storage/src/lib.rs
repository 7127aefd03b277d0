//! # walraft-storage
//!
//! why: provide durable persistence for raft state and the wal using standard rust fs apis
//! relations: implements walraft_core::Storage, jsonl helpers shared with walraft-wal
//! what: FileStorage, json-lines append/scan/repair helpers

pub mod file;
pub mod jsonl;

pub use file::{chop_tail, FileStorage};
pub use jsonl::{CorruptTail, Scan, Tail};

// storage trait lives in walraft-core so the node can be generic over it
pub use walraft_core::{HardState, InMemoryStorage, Storage};
