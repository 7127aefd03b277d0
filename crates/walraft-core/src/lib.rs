//! # walraft-core
//!
//! why: implement the replication protocol and the shared state machine in pure, portable rust
//! relations: persisted via walraft-storage, driven by walraft-cluster, state machine reused by walraft-wal
//! what: commands and key/value merge, log entries, rpc messages, raft node, storage trait

pub mod command;
pub mod error;
pub mod log;
pub mod message;
pub mod node;
pub mod storage;

pub use command::{Command, KvStateMachine};
pub use error::{RaftError, Result};
pub use log::LogEntry;
pub use message::{Envelope, RaftMessage};
pub use node::{NodeId, NodeState, RaftConfig, RaftNode, Term};
pub use storage::{HardState, InMemoryStorage, Storage};
