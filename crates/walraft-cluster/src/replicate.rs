//! # replicate
//!
//! why: one-shot leader-driven replication of a single command over direct calls
//! relations: drives walraft_core::RaftNode step/propose, used by tests and callers without a Cluster
//! what: replicate(), ReplicateOutcome

use crate::error::{ClusterError, Result};
use std::collections::VecDeque;
use tracing::{debug, info, warn};
use walraft_core::{Command, Envelope, NodeId, RaftNode, Storage};

const MAX_EXCHANGES: usize = 10_000;

/// What happened to a replicated command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicateOutcome {
    /// a majority holds the entry; leader and reachable followers applied it
    Committed { index: u64 },
    /// too few acknowledgements; nothing was applied anywhere
    NotCommitted { index: u64, acks: usize },
}

impl ReplicateOutcome {
    pub fn index(&self) -> u64 {
        match *self {
            ReplicateOutcome::Committed { index } | ReplicateOutcome::NotCommitted { index, .. } => index,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, ReplicateOutcome::Committed { .. })
    }
}

/// Append `command` on `leader` and replicate it to `followers`
///
/// Followers missing from `followers` are treated as unreachable. Each
/// follower is retried with an earlier prefix until its log matches, so a
/// follower with a divergent or truncated log is brought in line. Acks count
/// the leader plus every follower whose log now holds the entry.
pub fn replicate<S: Storage>(
    leader: &mut RaftNode<S>,
    followers: &mut [&mut RaftNode<S>],
    command: Command,
) -> Result<ReplicateOutcome> {
    let entry = leader.propose(command)?;
    let reachable: Vec<NodeId> = followers.iter().map(|f| f.id).collect();

    let mut queue: VecDeque<Envelope> = leader
        .broadcast_append_entries()
        .into_iter()
        .filter(|e| reachable.contains(&e.to))
        .collect();

    let mut exchanges = 0;
    while let Some(envelope) = queue.pop_front() {
        let replies = if envelope.to == leader.id {
            leader.step(envelope.from, envelope.message)?
        } else {
            let follower = followers
                .iter_mut()
                .find(|f| f.id == envelope.to)
                .ok_or(ClusterError::UnknownNode(envelope.to))?;
            follower.step(envelope.from, envelope.message)?
        };
        queue.extend(
            replies
                .into_iter()
                .filter(|e| e.to == leader.id || reachable.contains(&e.to)),
        );

        exchanges += 1;
        if exchanges >= MAX_EXCHANGES {
            warn!(index = entry.index, "replication exchange limit reached");
            break;
        }
    }

    let acks = 1 + leader
        .match_index
        .iter()
        .filter(|&(id, &matched)| reachable.contains(id) && matched >= entry.index)
        .count();

    if leader.commit_index >= entry.index {
        info!(index = entry.index, acks, "replicated and committed");
        Ok(ReplicateOutcome::Committed { index: entry.index })
    } else {
        debug!(index = entry.index, acks, quorum = leader.quorum_size(), "replicated without majority");
        Ok(ReplicateOutcome::NotCommitted { index: entry.index, acks })
    }
}
