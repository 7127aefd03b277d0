//! # local
//!
//! why: drive a whole cluster deterministically in one thread, with faults on demand
//! relations: owns walraft_core::RaftNode instances, storage from walraft-storage
//! what: Cluster harness with synchronous delivery, partitions, kill/restart, leader queries

use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, info, warn};
use walraft_core::{Command, Envelope, InMemoryStorage, LogEntry, NodeId, RaftConfig, RaftNode, Storage};
use walraft_storage::FileStorage;

/// Upper bound on messages handled by one delivery round
const MAX_DELIVERIES: usize = 100_000;

enum Slot<S: Storage> {
    Up(RaftNode<S>),
    /// crashed node; only what it persisted survives
    Down(S),
}

/// In-process cluster whose messages are delivered as direct calls
///
/// Every envelope a node produces is queued and delivered before the call
/// that produced it returns, unless the sender or receiver is partitioned or
/// down, in which case it is dropped.
pub struct Cluster<S: Storage = InMemoryStorage> {
    ids: Vec<NodeId>,
    config: RaftConfig,
    slots: BTreeMap<NodeId, Slot<S>>,
    isolated: HashSet<NodeId>,
    dropped: u64,
}

impl Cluster<InMemoryStorage> {
    /// Memory-backed cluster of `ids`
    pub fn in_memory(ids: Vec<NodeId>, config: RaftConfig) -> Result<Self> {
        let storages = ids.iter().map(|&id| (id, InMemoryStorage::new())).collect();
        Self::with_storages(ids, config, storages)
    }
}

impl Cluster<FileStorage> {
    /// File-backed cluster rooted at `config.data_dir`
    pub fn open(config: &ClusterConfig) -> Result<Self> {
        config.validate()?;
        let mut storages = BTreeMap::new();
        for &id in &config.node_ids {
            let dir = config
                .node_dir(id)
                .ok_or_else(|| ClusterError::Config("data_dir is required for a file-backed cluster".into()))?;
            storages.insert(id, FileStorage::new(dir)?);
        }
        Self::with_storages(config.node_ids.clone(), config.raft.clone(), storages)
    }
}

impl<S: Storage> Cluster<S> {
    /// Start one node per id over the given storages
    pub fn with_storages(ids: Vec<NodeId>, config: RaftConfig, mut storages: BTreeMap<NodeId, S>) -> Result<Self> {
        let mut slots = BTreeMap::new();
        for &id in &ids {
            let storage = storages.remove(&id).ok_or(ClusterError::UnknownNode(id))?;
            let node = RaftNode::with_storage(id, ids.clone(), config.clone(), storage)?;
            slots.insert(id, Slot::Up(node));
        }
        info!(nodes = ids.len(), "local cluster started");
        Ok(Self {
            ids,
            config,
            slots,
            isolated: HashSet::new(),
            dropped: 0,
        })
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    /// A running node
    pub fn node(&self, id: NodeId) -> Option<&RaftNode<S>> {
        match self.slots.get(&id) {
            Some(Slot::Up(node)) => Some(node),
            _ => None,
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut RaftNode<S>> {
        match self.slots.get_mut(&id) {
            Some(Slot::Up(node)) => Some(node),
            _ => None,
        }
    }

    /// Every running node
    pub fn nodes(&self) -> impl Iterator<Item = &RaftNode<S>> {
        self.slots.values().filter_map(|slot| match slot {
            Slot::Up(node) => Some(node),
            Slot::Down(_) => None,
        })
    }

    pub fn is_up(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn is_isolated(&self, id: NodeId) -> bool {
        self.isolated.contains(&id)
    }

    /// Messages dropped by partitions or dead receivers so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    // -- faults --

    /// Cut `id` off from every other node
    pub fn partition(&mut self, id: NodeId) -> Result<()> {
        self.check_member(id)?;
        info!(node = id, "partitioned");
        self.isolated.insert(id);
        Ok(())
    }

    pub fn heal(&mut self, id: NodeId) -> Result<()> {
        self.check_member(id)?;
        if self.isolated.remove(&id) {
            info!(node = id, "healed");
        }
        Ok(())
    }

    /// Crash `id`, keeping only its storage
    pub fn kill(&mut self, id: NodeId) -> Result<()> {
        match self.slots.remove(&id) {
            Some(Slot::Up(node)) => {
                info!(node = id, term = node.current_term, "killed");
                self.slots.insert(id, Slot::Down(node.into_storage()));
                Ok(())
            }
            Some(down) => {
                self.slots.insert(id, down);
                Err(ClusterError::NodeDown(id))
            }
            None => Err(ClusterError::UnknownNode(id)),
        }
    }

    /// Restart a killed node from the storage it left behind
    pub fn restart(&mut self, id: NodeId) -> Result<()> {
        match self.slots.remove(&id) {
            Some(Slot::Down(storage)) => self.boot(id, storage),
            Some(up) => {
                self.slots.insert(id, up);
                Err(ClusterError::NodeUp(id))
            }
            None => Err(ClusterError::UnknownNode(id)),
        }
    }

    /// Restart a killed node over freshly opened storage
    pub fn restart_with(&mut self, id: NodeId, storage: S) -> Result<()> {
        match self.slots.get(&id) {
            Some(Slot::Down(_)) => {
                self.slots.remove(&id);
                self.boot(id, storage)
            }
            Some(Slot::Up(_)) => Err(ClusterError::NodeUp(id)),
            None => Err(ClusterError::UnknownNode(id)),
        }
    }

    fn boot(&mut self, id: NodeId, storage: S) -> Result<()> {
        let node = RaftNode::with_storage(id, self.ids.clone(), self.config.clone(), storage)?;
        info!(node = id, term = node.current_term, log_len = node.log.len(), "restarted");
        self.slots.insert(id, Slot::Up(node));
        Ok(())
    }

    fn check_member(&self, id: NodeId) -> Result<()> {
        if self.slots.contains_key(&id) {
            Ok(())
        } else {
            Err(ClusterError::UnknownNode(id))
        }
    }

    // -- driving --

    /// Advance every running node by one tick and deliver the fallout
    pub fn tick_all(&mut self) -> Result<()> {
        let mut outbox = Vec::new();
        for slot in self.slots.values_mut() {
            if let Slot::Up(node) = slot {
                outbox.extend(node.tick()?);
            }
        }
        self.deliver(outbox)
    }

    pub fn tick_n(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.tick_all()?;
        }
        Ok(())
    }

    /// Deliver envelopes, and everything they cause, until the network is quiet
    pub fn deliver(&mut self, envelopes: Vec<Envelope>) -> Result<()> {
        let mut queue: VecDeque<Envelope> = envelopes.into();
        let mut handled = 0;
        while let Some(envelope) = queue.pop_front() {
            if self.isolated.contains(&envelope.from) || self.isolated.contains(&envelope.to) {
                self.dropped += 1;
                continue;
            }
            let Some(Slot::Up(node)) = self.slots.get_mut(&envelope.to) else {
                self.dropped += 1;
                continue;
            };
            queue.extend(node.step(envelope.from, envelope.message)?);

            handled += 1;
            if handled >= MAX_DELIVERIES {
                warn!(pending = queue.len(), "delivery round cut short");
                break;
            }
        }
        Ok(())
    }

    // -- queries --

    /// Running nodes that believe they lead, including partitioned ones
    pub fn leaders(&self) -> Vec<NodeId> {
        self.nodes().filter(|n| n.is_leader()).map(|n| n.id).collect()
    }

    /// The leader as seen from the connected side of the cluster
    pub fn leader(&self) -> Option<NodeId> {
        let connected: Vec<_> = self
            .nodes()
            .filter(|n| n.is_leader() && !self.isolated.contains(&n.id))
            .collect();
        match connected.as_slice() {
            [only] => Some(only.id),
            _ => None,
        }
    }

    /// Tick until exactly one connected leader exists
    pub fn run_until_leader(&mut self, max_ticks: u64) -> Result<NodeId> {
        for tick in 0..=max_ticks {
            if let Some(leader) = self.leader() {
                debug!(leader, ticks = tick, "leader found");
                return Ok(leader);
            }
            self.tick_all()?;
        }
        Err(ClusterError::NoLeader(max_ticks))
    }

    /// Propose on the current leader and replicate immediately
    pub fn propose(&mut self, command: Command) -> Result<LogEntry> {
        let leader_id = self.leader().ok_or(ClusterError::NoLeader(0))?;
        let Some(leader) = self.node_mut(leader_id) else {
            return Err(ClusterError::NodeDown(leader_id));
        };
        let entry = leader.propose(command)?;
        let outbox = leader.broadcast_append_entries();
        self.deliver(outbox)?;
        Ok(entry)
    }
}
