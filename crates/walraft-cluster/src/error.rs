//! # error
//!
//! why: one error type for everything a cluster driver can hit
//! relations: wraps walraft_core::RaftError, returned by local.rs, replicate.rs, runtime.rs, config.rs
//! what: ClusterError, Result alias

use std::io;
use thiserror::Error;
use walraft_core::{NodeId, RaftError};

pub type Result<T> = std::result::Result<T, ClusterError>;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Raft(#[from] RaftError),

    #[error("storage error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse cluster config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid cluster config: {0}")]
    Config(String),

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} is not running")]
    NodeDown(NodeId),

    #[error("node {0} is already running")]
    NodeUp(NodeId),

    #[error("no leader elected within {0} ticks")]
    NoLeader(u64),

    /// the entry at this index was replaced by another leader's before committing
    #[error("entry {index} was superseded before it committed")]
    Superseded { index: u64 },

    #[error("timed out waiting for the cluster")]
    Timeout,

    #[error("cluster runtime has stopped")]
    Stopped,
}
