//! # message
//!
//! why: define all raft rpc message types for node communication
//! relations: produced and consumed by node.rs, routed by walraft-cluster
//! what: VoteRequest, VoteResponse, AppendEntries (heartbeat when empty), Envelope

use crate::log::LogEntry;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// All possible Raft messages between nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaftMessage {
    /// Request a vote during leader election
    VoteRequest {
        term: u64,
        candidate_id: NodeId,
        last_log_index: u64,
        last_log_term: u64,
    },
    /// Response to a vote request
    VoteResponse {
        term: u64,
        vote_granted: bool,
    },
    /// Replicate log entries (also serves as heartbeat when entries is empty)
    AppendEntries {
        term: u64,
        leader_id: NodeId,
        prev_log_index: u64,
        prev_log_term: u64,
        entries: Vec<LogEntry>,
        leader_commit: u64,
    },
    /// Response to AppendEntries
    ///
    /// `match_index` is the last index the follower now shares with the
    /// leader; it is only meaningful when `success` is true.
    AppendEntriesResponse {
        term: u64,
        success: bool,
        match_index: u64,
    },
}

impl RaftMessage {
    /// Term carried by the message
    pub fn term(&self) -> u64 {
        match self {
            RaftMessage::VoteRequest { term, .. }
            | RaftMessage::VoteResponse { term, .. }
            | RaftMessage::AppendEntries { term, .. }
            | RaftMessage::AppendEntriesResponse { term, .. } => *term,
        }
    }

    /// True for an AppendEntries without entries
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, RaftMessage::AppendEntries { entries, .. } if entries.is_empty())
    }
}

/// A message addressed from one node to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: NodeId,
    pub to: NodeId,
    pub message: RaftMessage,
}

impl Envelope {
    pub fn new(from: NodeId, to: NodeId, message: RaftMessage) -> Self {
        Self { from, to, message }
    }
}
