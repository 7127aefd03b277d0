//! # error
//!
//! why: separate protocol outcomes from faults that must stop a node
//! relations: returned by node.rs, wrapped by walraft-cluster
//! what: RaftError, Result alias

use crate::node::NodeId;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaftError>;

/// Faults raised by a raft node
///
/// Rejected votes and rejected appends are ordinary protocol replies
/// (`RaftMessage::*Response`), not errors.
#[derive(Debug, Error)]
pub enum RaftError {
    /// Persisting term, vote, commit index or log entries failed; the node
    /// cannot claim durability and must stop.
    #[error("storage failure: {0}")]
    Storage(#[from] io::Error),

    /// A command was proposed to a node that is not the leader
    #[error("node {node} is not the leader (leader hint: {leader:?})")]
    NotLeader { node: NodeId, leader: Option<NodeId> },

    /// Configuration is internally inconsistent
    #[error("invalid raft config: {0}")]
    Config(String),
}
