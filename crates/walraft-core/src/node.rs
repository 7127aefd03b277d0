//! # node
//!
//! why: define the raft node state machine and state transitions
//! relations: uses message.rs for rpc types, log.rs for entry management, storage.rs for durability
//! what: NodeState enum, RaftConfig, RaftNode (election, log matching, commit, apply), tick driver

use crate::command::{Command, KvStateMachine};
use crate::error::{RaftError, Result};
use crate::log::{self, LogEntry};
use crate::message::{Envelope, RaftMessage};
use crate::storage::{HardState, InMemoryStorage, Storage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Unique identifier of a node within a cluster
pub type NodeId = u64;

/// Election epoch; never decreases on a node
pub type Term = u64;

/// The three possible states a Raft node can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Passive state - listens for heartbeats, votes when asked
    Follower,
    /// Transitional state - requesting votes to become leader
    Candidate,
    /// Active state - manages log replication, sends heartbeats
    Leader,
}

impl Default for NodeState {
    fn default() -> Self {
        Self::Follower
    }
}

/// Timing and batching knobs, all times in ticks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaftConfig {
    /// Lower bound of the randomized election timeout
    pub election_timeout_min: u64,
    /// Upper bound (inclusive) of the randomized election timeout
    pub election_timeout_max: u64,
    /// Leader heartbeat period; must be shorter than any election timeout
    pub heartbeat_interval: u64,
    /// Maximum entries carried by one AppendEntries
    pub max_append_entries: usize,
    /// Fixed seed for election timeouts (mixed with the node id); entropy when unset
    pub rng_seed: Option<u64>,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_min: 150,
            election_timeout_max: 300,
            heartbeat_interval: 50,
            max_append_entries: 64,
            rng_seed: None,
        }
    }
}

impl RaftConfig {
    /// Reject configurations that would break liveness
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval == 0 {
            return Err(RaftError::Config("heartbeat_interval must be positive".into()));
        }
        if self.election_timeout_min >= self.election_timeout_max {
            return Err(RaftError::Config(format!(
                "election timeout range {}..={} is empty or degenerate",
                self.election_timeout_min, self.election_timeout_max
            )));
        }
        if self.heartbeat_interval >= self.election_timeout_min {
            return Err(RaftError::Config(format!(
                "heartbeat_interval {} must be below election_timeout_min {}",
                self.heartbeat_interval, self.election_timeout_min
            )));
        }
        if self.max_append_entries == 0 {
            return Err(RaftError::Config("max_append_entries must be positive".into()));
        }
        Ok(())
    }
}

/// A single Raft node in the cluster
///
/// The node is a passive state machine: inbound messages go through
/// [`RaftNode::step`], time goes through [`RaftNode::tick`], and both return
/// the envelopes the caller must deliver. Term, vote and commit index are
/// persisted before any reply that depends on them is returned.
#[derive(Debug)]
pub struct RaftNode<S: Storage = InMemoryStorage> {
    /// Unique identifier for this node
    pub id: NodeId,
    /// Every member of the cluster, including this node
    pub cluster_nodes: Vec<NodeId>,
    pub config: RaftConfig,
    /// Current state (Follower, Candidate, or Leader)
    pub state: NodeState,
    /// Current term number
    pub current_term: Term,
    /// Node ID that received our vote in current term (if any)
    pub voted_for: Option<NodeId>,
    /// Leader of the current term, once known
    pub leader_id: Option<NodeId>,
    /// Replicated log, entry `i` lives at position `i - 1`
    pub log: Vec<LogEntry>,
    /// Highest index known to be replicated on a majority
    pub commit_index: u64,
    /// Highest index applied to `state_machine`
    pub last_applied: u64,
    /// Votes collected while a candidate
    pub votes_received: Vec<NodeId>,
    /// Peers that refused this node's candidacy in the current term
    pub votes_rejected: Vec<NodeId>,
    /// Leader only: next index to send to each peer
    pub next_index: HashMap<NodeId, u64>,
    /// Leader only: highest index known replicated on each peer
    pub match_index: HashMap<NodeId, u64>,
    pub state_machine: KvStateMachine,
    elapsed: u64,
    election_timeout: u64,
    rng: StdRng,
    storage: S,
}

impl RaftNode<InMemoryStorage> {
    /// Create a new Raft node in Follower state, backed by memory
    pub fn new(id: NodeId, cluster_nodes: Vec<NodeId>) -> Self {
        Self::assemble(
            id,
            cluster_nodes,
            RaftConfig::default(),
            InMemoryStorage::new(),
            HardState::default(),
            Vec::new(),
        )
    }

    /// Create an in-memory node with custom timing
    pub fn with_config(id: NodeId, cluster_nodes: Vec<NodeId>, config: RaftConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(
            id,
            cluster_nodes,
            config,
            InMemoryStorage::new(),
            HardState::default(),
            Vec::new(),
        ))
    }
}

impl<S: Storage> RaftNode<S> {
    /// Open a node over `storage`, restoring term, vote, log and commit index
    ///
    /// Entries up to the persisted commit index are replayed into the state
    /// machine; anything after it stays uncommitted until a leader confirms it.
    pub fn with_storage(
        id: NodeId,
        cluster_nodes: Vec<NodeId>,
        config: RaftConfig,
        storage: S,
    ) -> Result<Self> {
        config.validate()?;
        let hard_state = storage.load_hard_state()?;
        let log = storage.load_log()?;
        let mut node = Self::assemble(id, cluster_nodes, config, storage, hard_state, log);

        let recovered_commit = hard_state.commit_index.min(node.last_log_index());
        if recovered_commit < hard_state.commit_index {
            warn!(
                node = id,
                persisted = hard_state.commit_index,
                recovered = recovered_commit,
                "commit index beyond recovered log, clamping"
            );
        }
        node.commit_index = recovered_commit;
        node.apply_committed();

        info!(
            node = id,
            term = node.current_term,
            log_len = node.log.len(),
            commit_index = node.commit_index,
            "node restored from storage"
        );
        Ok(node)
    }

    fn assemble(
        id: NodeId,
        cluster_nodes: Vec<NodeId>,
        config: RaftConfig,
        storage: S,
        hard_state: HardState,
        log: Vec<LogEntry>,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id)),
            None => StdRng::from_entropy(),
        };
        let mut node = Self {
            id,
            cluster_nodes,
            config,
            state: NodeState::Follower,
            current_term: hard_state.term,
            voted_for: hard_state.voted_for,
            leader_id: None,
            log,
            commit_index: 0,
            last_applied: 0,
            votes_received: Vec::new(),
            votes_rejected: Vec::new(),
            next_index: HashMap::new(),
            match_index: HashMap::new(),
            state_machine: KvStateMachine::new(),
            elapsed: 0,
            election_timeout: 0,
            rng,
            storage,
        };
        node.reset_election_timer();
        node
    }

    // -- cluster arithmetic --

    /// Votes or acknowledgements needed for a strict majority
    pub fn quorum_size(&self) -> usize {
        self.cluster_nodes.len() / 2 + 1
    }

    /// Whether the votes collected so far form a majority
    pub fn has_quorum(&self) -> bool {
        self.votes_received.len() >= self.quorum_size()
    }

    /// Every member except this node
    pub fn peers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.cluster_nodes.iter().copied().filter(move |&n| n != self.id)
    }

    pub fn is_leader(&self) -> bool {
        self.state == NodeState::Leader
    }

    // -- log helpers --

    pub fn last_log_index(&self) -> u64 {
        self.log.last().map(|e| e.index).unwrap_or(0)
    }

    pub fn last_log_term(&self) -> u64 {
        self.log.last().map(|e| e.term).unwrap_or(0)
    }

    pub fn get_entry(&self, index: u64) -> Option<&LogEntry> {
        log::entry_at(&self.log, index)
    }

    pub fn get_term_at(&self, index: u64) -> u64 {
        log::term_at(&self.log, index)
    }

    /// Ticks left before this node campaigns (meaningless for a leader)
    pub fn ticks_until_election(&self) -> u64 {
        self.election_timeout.saturating_sub(self.elapsed)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Tear the node down, keeping only what it persisted
    pub fn into_storage(self) -> S {
        self.storage
    }

    fn hard_state(&self) -> HardState {
        HardState {
            term: self.current_term,
            voted_for: self.voted_for,
            commit_index: self.commit_index,
        }
    }

    fn persist_hard_state(&mut self) -> Result<()> {
        let hard_state = self.hard_state();
        self.storage.save_hard_state(&hard_state)?;
        Ok(())
    }

    /// Draw a fresh randomized election timeout and restart the clock
    fn reset_election_timer(&mut self) {
        self.elapsed = 0;
        self.election_timeout = self
            .rng
            .gen_range(self.config.election_timeout_min..=self.config.election_timeout_max);
    }

    // -- role transitions --

    /// Step down to follower, adopting `term` if it is newer
    ///
    /// The vote is only cleared when the term actually advances; clearing it
    /// within a term would allow a second vote.
    pub fn become_follower(&mut self, term: Term) -> Result<()> {
        if term > self.current_term {
            debug!(node = self.id, from = self.current_term, to = term, "adopting newer term");
            self.current_term = term;
            self.voted_for = None;
            self.leader_id = None;
        }
        if self.state != NodeState::Follower {
            info!(node = self.id, term = self.current_term, role = ?self.state, "stepping down to follower");
        }
        self.state = NodeState::Follower;
        self.votes_received.clear();
        self.votes_rejected.clear();
        self.next_index.clear();
        self.match_index.clear();
        self.reset_election_timer();
        self.persist_hard_state()
    }

    /// Increment term, vote for self, and build the VoteRequest to broadcast
    ///
    /// The node leads once a majority grants its vote, and reverts to follower
    /// once enough peers refuse that a majority is out of reach.
    pub fn start_election(&mut self) -> Result<RaftMessage> {
        self.state = NodeState::Candidate;
        self.current_term += 1;
        self.voted_for = Some(self.id);
        self.leader_id = None;
        self.votes_received = vec![self.id];
        self.votes_rejected.clear();
        self.reset_election_timer();
        self.persist_hard_state()?;
        info!(node = self.id, term = self.current_term, "starting election");

        let request = RaftMessage::VoteRequest {
            term: self.current_term,
            candidate_id: self.id,
            last_log_index: self.last_log_index(),
            last_log_term: self.last_log_term(),
        };

        // a single-node cluster wins on its own vote
        if self.has_quorum() {
            self.become_leader()?;
        }
        Ok(request)
    }

    fn become_leader(&mut self) -> Result<()> {
        info!(node = self.id, term = self.current_term, "became leader");
        self.state = NodeState::Leader;
        self.leader_id = Some(self.id);
        self.votes_received.clear();
        let next = self.last_log_index() + 1;
        let peers: Vec<NodeId> = self.peers().collect();
        self.next_index = peers.iter().map(|&p| (p, next)).collect();
        self.match_index = peers.iter().map(|&p| (p, 0)).collect();
        self.elapsed = 0;
        // entries from earlier terms can only commit behind one of ours
        self.advance_commit()?;
        Ok(())
    }

    // -- elections --

    /// Handle a VoteRequest; returns the reply and whether the election timer was reset
    pub fn handle_vote_request(
        &mut self,
        term: Term,
        candidate_id: NodeId,
        last_log_index: u64,
        last_log_term: u64,
    ) -> Result<(RaftMessage, bool)> {
        if term < self.current_term {
            debug!(node = self.id, candidate = candidate_id, term, "rejecting vote for stale term");
            return Ok((self.vote_response(false), false));
        }
        if term > self.current_term {
            self.become_follower(term)?;
        }

        let log_ok = last_log_term > self.last_log_term()
            || (last_log_term == self.last_log_term() && last_log_index >= self.last_log_index());
        let can_vote = self.voted_for.is_none() || self.voted_for == Some(candidate_id);
        let granted = log_ok && can_vote;

        if granted {
            self.voted_for = Some(candidate_id);
            self.reset_election_timer();
            self.persist_hard_state()?;
            debug!(node = self.id, candidate = candidate_id, term, "vote granted");
        } else {
            debug!(node = self.id, candidate = candidate_id, term, log_ok, can_vote, "vote refused");
        }
        Ok((self.vote_response(granted), granted))
    }

    /// Direct-call form of the RequestVote exchange; returns whether the vote was granted
    pub fn request_vote(
        &mut self,
        term: Term,
        candidate_id: NodeId,
        last_log_index: u64,
        last_log_term: u64,
    ) -> Result<bool> {
        let (_, granted) = self.handle_vote_request(term, candidate_id, last_log_index, last_log_term)?;
        Ok(granted)
    }

    fn vote_response(&self, vote_granted: bool) -> RaftMessage {
        RaftMessage::VoteResponse {
            term: self.current_term,
            vote_granted,
        }
    }

    /// Count a vote; returns true when this vote made the node leader
    pub fn handle_vote_response(&mut self, term: Term, vote_granted: bool, from: NodeId) -> Result<bool> {
        if term > self.current_term {
            self.become_follower(term)?;
            return Ok(false);
        }
        if self.state != NodeState::Candidate || term != self.current_term {
            return Ok(false);
        }
        if vote_granted && !self.votes_received.contains(&from) {
            self.votes_received.push(from);
        } else if !vote_granted && !self.votes_rejected.contains(&from) {
            self.votes_rejected.push(from);
        }
        if self.has_quorum() {
            self.become_leader()?;
            return Ok(true);
        }
        if self.votes_rejected.len() > self.cluster_nodes.len() - self.quorum_size() {
            info!(node = self.id, term = self.current_term, rejected = self.votes_rejected.len(), "election lost");
            self.become_follower(self.current_term)?;
        }
        Ok(false)
    }

    // -- replication, follower side --

    /// Handle AppendEntries; returns the reply and whether the election timer was reset
    ///
    /// Enforces the log-matching rule: the entry before `entries` must match
    /// `prev_log_index`/`prev_log_term`, and any local entry that conflicts
    /// with the leader's is truncated along with everything after it.
    pub fn handle_append_entries(
        &mut self,
        term: Term,
        leader_id: NodeId,
        prev_log_index: u64,
        prev_log_term: u64,
        entries: Vec<LogEntry>,
        leader_commit: u64,
    ) -> Result<(RaftMessage, bool)> {
        if term < self.current_term {
            return Ok((self.append_response(false, 0), false));
        }
        if term > self.current_term || self.state != NodeState::Follower {
            self.become_follower(term)?;
        } else {
            self.reset_election_timer();
        }
        self.leader_id = Some(leader_id);

        let success = self.accept_entries(prev_log_index, prev_log_term, entries, leader_commit)?;
        let match_index = success.unwrap_or(0);
        Ok((self.append_response(success.is_some(), match_index), true))
    }

    /// Direct-call form of a single-entry AppendEntries; returns whether it was accepted
    ///
    /// Carries no commit information: the commit index moves only with a later
    /// AppendEntries from the leader.
    pub fn append_entry(
        &mut self,
        term: Term,
        prev_log_index: u64,
        prev_log_term: u64,
        entry: LogEntry,
    ) -> Result<bool> {
        if term < self.current_term {
            return Ok(false);
        }
        if term > self.current_term || self.state != NodeState::Follower {
            self.become_follower(term)?;
        } else {
            self.reset_election_timer();
        }
        let accepted = self.accept_entries(prev_log_index, prev_log_term, vec![entry], 0)?;
        Ok(accepted.is_some())
    }

    /// Log-matching check, conflict truncation, append, commit; returns the match index on success
    fn accept_entries(
        &mut self,
        prev_log_index: u64,
        prev_log_term: u64,
        entries: Vec<LogEntry>,
        leader_commit: u64,
    ) -> Result<Option<u64>> {
        if !log::matches_prefix(&self.log, prev_log_index, prev_log_term) {
            debug!(
                node = self.id,
                prev_log_index,
                prev_log_term,
                last_index = self.last_log_index(),
                "append rejected: log mismatch"
            );
            return Ok(None);
        }

        let match_index = prev_log_index + entries.len() as u64;
        let mut new_entries = Vec::new();
        for (offset, entry) in entries.into_iter().enumerate() {
            let expected = prev_log_index + 1 + offset as u64;
            if entry.index != expected {
                warn!(node = self.id, expected, got = entry.index, "append rejected: non-contiguous entries");
                return Ok(None);
            }
            if !new_entries.is_empty() {
                new_entries.push(entry);
                continue;
            }
            match self.get_entry(entry.index).map(|e| e.term) {
                Some(local_term) if local_term == entry.term => {}
                Some(local_term) => {
                    info!(
                        node = self.id,
                        index = entry.index,
                        local_term,
                        leader_term = entry.term,
                        "truncating conflicting suffix"
                    );
                    if entry.index <= self.commit_index {
                        warn!(node = self.id, index = entry.index, commit = self.commit_index, "leader overwrites a committed index");
                    }
                    self.storage.truncate_log_from(entry.index)?;
                    self.log.truncate((entry.index - 1) as usize);
                    new_entries.push(entry);
                }
                None => new_entries.push(entry),
            }
        }

        if !new_entries.is_empty() {
            self.storage.append_entries(&new_entries)?;
            self.log.extend(new_entries);
        }

        if leader_commit > self.commit_index {
            let new_commit = leader_commit.min(match_index);
            if new_commit > self.commit_index {
                self.commit_index = new_commit;
                self.persist_hard_state()?;
                debug!(node = self.id, commit_index = new_commit, "follower commit advanced");
                self.apply_committed();
            }
        }
        Ok(Some(match_index))
    }

    fn append_response(&self, success: bool, match_index: u64) -> RaftMessage {
        RaftMessage::AppendEntriesResponse {
            term: self.current_term,
            success,
            match_index,
        }
    }

    // -- replication, leader side --

    /// Append a client command to the leader's log, durably, before replication
    pub fn propose(&mut self, command: Command) -> Result<LogEntry> {
        if self.state != NodeState::Leader {
            return Err(RaftError::NotLeader {
                node: self.id,
                leader: self.leader_id,
            });
        }
        let entry = LogEntry::new(self.current_term, self.last_log_index() + 1, command);
        self.storage.append_entries(std::slice::from_ref(&entry))?;
        self.log.push(entry.clone());
        debug!(node = self.id, term = entry.term, index = entry.index, "proposed entry");

        // with no peers the leader alone is a majority
        self.advance_commit()?;
        Ok(entry)
    }

    /// Build the AppendEntries for `peer` from its next index (leader only)
    pub fn create_append_entries(&self, peer: NodeId) -> Option<RaftMessage> {
        if self.state != NodeState::Leader {
            return None;
        }
        let next = self
            .next_index
            .get(&peer)
            .copied()
            .unwrap_or(self.last_log_index() + 1)
            .max(1);
        let prev_log_index = next - 1;
        let start = prev_log_index as usize;
        let end = (start + self.config.max_append_entries).min(self.log.len());
        let entries = if start < end { self.log[start..end].to_vec() } else { Vec::new() };

        Some(RaftMessage::AppendEntries {
            term: self.current_term,
            leader_id: self.id,
            prev_log_index,
            prev_log_term: self.get_term_at(prev_log_index),
            entries,
            leader_commit: self.commit_index,
        })
    }

    /// AppendEntries (heartbeat when the peer is caught up) for every peer
    pub fn broadcast_append_entries(&self) -> Vec<Envelope> {
        self.peers()
            .filter_map(|peer| {
                self.create_append_entries(peer)
                    .map(|message| Envelope::new(self.id, peer, message))
            })
            .collect()
    }

    /// Record a follower's reply; returns true when the commit index advanced
    pub fn handle_append_entries_response(
        &mut self,
        term: Term,
        success: bool,
        from: NodeId,
        match_index: u64,
    ) -> Result<bool> {
        if term > self.current_term {
            self.become_follower(term)?;
            return Ok(false);
        }
        if self.state != NodeState::Leader || term != self.current_term {
            return Ok(false);
        }

        if success {
            let known = self.match_index.get(&from).copied().unwrap_or(0);
            let matched = known.max(match_index.min(self.last_log_index()));
            self.match_index.insert(from, matched);
            self.next_index.insert(from, matched + 1);
            self.advance_commit()
        } else {
            let next = self.next_index.get(&from).copied().unwrap_or(self.last_log_index() + 1);
            let retry = next.saturating_sub(1).max(1);
            debug!(node = self.id, peer = from, next_index = retry, "append rejected, backing off");
            self.next_index.insert(from, retry);
            Ok(false)
        }
    }

    /// Move the commit index to the highest current-term entry held by a majority
    fn advance_commit(&mut self) -> Result<bool> {
        if self.state != NodeState::Leader {
            return Ok(false);
        }
        let quorum = self.quorum_size();
        let mut target = None;
        let mut n = self.last_log_index();
        while n > self.commit_index {
            if self.get_term_at(n) != self.current_term {
                break;
            }
            let replicas = 1 + self.match_index.values().filter(|&&m| m >= n).count();
            if replicas >= quorum {
                target = Some(n);
                break;
            }
            n -= 1;
        }

        match target {
            Some(index) => {
                self.commit_index = index;
                self.persist_hard_state()?;
                info!(node = self.id, term = self.current_term, commit_index = index, "commit advanced");
                self.apply_committed();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply committed entries in index order; returns what was applied
    pub fn apply_committed(&mut self) -> Vec<LogEntry> {
        let mut applied = Vec::new();
        while self.last_applied < self.commit_index {
            let next = self.last_applied + 1;
            let Some(entry) = self.get_entry(next).cloned() else {
                break;
            };
            self.state_machine.apply(&entry.command);
            self.last_applied = next;
            applied.push(entry);
        }
        applied
    }

    // -- drivers --

    /// Advance the logical clock by one tick
    ///
    /// Leaders emit AppendEntries every `heartbeat_interval` ticks; followers
    /// and candidates campaign once their randomized timeout elapses.
    pub fn tick(&mut self) -> Result<Vec<Envelope>> {
        self.elapsed += 1;
        match self.state {
            NodeState::Leader => {
                if self.elapsed >= self.config.heartbeat_interval {
                    self.elapsed = 0;
                    return Ok(self.broadcast_append_entries());
                }
                Ok(Vec::new())
            }
            NodeState::Follower | NodeState::Candidate => {
                if self.elapsed < self.election_timeout {
                    return Ok(Vec::new());
                }
                let request = self.start_election()?;
                if self.is_leader() {
                    return Ok(self.broadcast_append_entries());
                }
                Ok(self
                    .peers()
                    .map(|peer| Envelope::new(self.id, peer, request.clone()))
                    .collect())
            }
        }
    }

    /// Process one inbound message and return the envelopes it produces
    pub fn step(&mut self, from: NodeId, message: RaftMessage) -> Result<Vec<Envelope>> {
        match message {
            RaftMessage::VoteRequest { term, candidate_id, last_log_index, last_log_term } => {
                let (reply, _) = self.handle_vote_request(term, candidate_id, last_log_index, last_log_term)?;
                Ok(vec![Envelope::new(self.id, from, reply)])
            }
            RaftMessage::VoteResponse { term, vote_granted } => {
                if self.handle_vote_response(term, vote_granted, from)? {
                    return Ok(self.broadcast_append_entries());
                }
                Ok(Vec::new())
            }
            RaftMessage::AppendEntries { term, leader_id, prev_log_index, prev_log_term, entries, leader_commit } => {
                let (reply, _) = self.handle_append_entries(
                    term,
                    leader_id,
                    prev_log_index,
                    prev_log_term,
                    entries,
                    leader_commit,
                )?;
                Ok(vec![Envelope::new(self.id, from, reply)])
            }
            RaftMessage::AppendEntriesResponse { term, success, match_index } => {
                let committed = self.handle_append_entries_response(term, success, from, match_index)?;
                if !self.is_leader() {
                    return Ok(Vec::new());
                }
                if committed {
                    // propagate the new commit index right away
                    return Ok(self.broadcast_append_entries());
                }
                let behind = self.match_index.get(&from).copied().unwrap_or(0) < self.last_log_index();
                if !success || behind {
                    return Ok(self
                        .create_append_entries(from)
                        .map(|message| vec![Envelope::new(self.id, from, message)])
                        .unwrap_or_default());
                }
                Ok(Vec::new())
            }
        }
    }
}
