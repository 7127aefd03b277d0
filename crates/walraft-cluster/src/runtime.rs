//! # runtime
//!
//! why: run every node as an independent actor with its own clock
//! relations: wraps walraft_core::RaftNode in tokio tasks, configured by config.rs
//! what: ClusterRuntime (start, propose, status, partition, kill/restart, shutdown), NodeStatus

use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};
use walraft_core::{Command, Envelope, InMemoryStorage, NodeId, NodeState, RaftNode, Storage, Term};
use walraft_storage::FileStorage;

/// Snapshot of one node, taken inside its task
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStatus {
    pub id: NodeId,
    pub state: NodeState,
    pub term: Term,
    pub leader_id: Option<NodeId>,
    pub commit_index: u64,
    pub last_log_index: u64,
    pub data: BTreeMap<String, Value>,
}

impl NodeStatus {
    fn of<S: Storage>(node: &RaftNode<S>) -> Self {
        Self {
            id: node.id,
            state: node.state,
            term: node.current_term,
            leader_id: node.leader_id,
            commit_index: node.commit_index,
            last_log_index: node.last_log_index(),
            data: node.state_machine.data().clone(),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.state == NodeState::Leader
    }
}

enum Input {
    Message(Envelope),
    Propose {
        command: Command,
        reply: oneshot::Sender<Result<u64>>,
    },
    Status(oneshot::Sender<NodeStatus>),
    Shutdown,
}

type Inbox = mpsc::UnboundedSender<Input>;

/// Routes envelopes between node inboxes, dropping traffic of isolated nodes
#[derive(Default)]
struct Network {
    inboxes: RwLock<HashMap<NodeId, Inbox>>,
    isolated: RwLock<HashSet<NodeId>>,
}

impl Network {
    fn send(&self, envelopes: Vec<Envelope>) {
        if envelopes.is_empty() {
            return;
        }
        let isolated = self.isolated.read().unwrap_or_else(|e| e.into_inner());
        let inboxes = self.inboxes.read().unwrap_or_else(|e| e.into_inner());
        for envelope in envelopes {
            if isolated.contains(&envelope.from) || isolated.contains(&envelope.to) {
                continue;
            }
            if let Some(tx) = inboxes.get(&envelope.to) {
                // a stopped node just misses the message
                let _ = tx.send(Input::Message(envelope));
            }
        }
    }

    fn is_isolated(&self, id: NodeId) -> bool {
        self.isolated.read().unwrap_or_else(|e| e.into_inner()).contains(&id)
    }
}

struct Running<S: Storage> {
    inbox: Inbox,
    task: JoinHandle<RaftNode<S>>,
}

/// A cluster of nodes, one tokio task each
///
/// Must be started from within a tokio runtime. Each task owns its node
/// exclusively; all access goes through its inbox.
pub struct ClusterRuntime<S: Storage + Send + 'static = InMemoryStorage> {
    config: ClusterConfig,
    net: Arc<Network>,
    running: HashMap<NodeId, Running<S>>,
    stopped: HashMap<NodeId, S>,
}

impl ClusterRuntime<InMemoryStorage> {
    pub fn start_in_memory(config: ClusterConfig) -> Result<Self> {
        let storages = config.node_ids.iter().map(|&id| (id, InMemoryStorage::new())).collect();
        Self::with_storages(config, storages)
    }
}

impl ClusterRuntime<FileStorage> {
    /// Start a file-backed cluster under `config.data_dir`
    pub fn start(config: ClusterConfig) -> Result<Self> {
        let mut storages = HashMap::new();
        for &id in &config.node_ids {
            let dir = config
                .node_dir(id)
                .ok_or_else(|| ClusterError::Config("data_dir is required for a file-backed cluster".into()))?;
            storages.insert(id, FileStorage::new(dir)?);
        }
        Self::with_storages(config, storages)
    }
}

impl<S: Storage + Send + 'static> ClusterRuntime<S> {
    pub fn with_storages(config: ClusterConfig, mut storages: HashMap<NodeId, S>) -> Result<Self> {
        config.validate()?;
        let mut runtime = Self {
            config,
            net: Arc::new(Network::default()),
            running: HashMap::new(),
            stopped: HashMap::new(),
        };
        for id in runtime.config.node_ids.clone() {
            let storage = storages.remove(&id).ok_or(ClusterError::UnknownNode(id))?;
            runtime.spawn(id, storage)?;
        }
        info!(nodes = runtime.running.len(), tick_ms = runtime.config.tick_ms, "cluster runtime started");
        Ok(runtime)
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    fn spawn(&mut self, id: NodeId, storage: S) -> Result<()> {
        let node = RaftNode::with_storage(id, self.config.node_ids.clone(), self.config.raft.clone(), storage)?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.net
            .inboxes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx.clone());
        let task = tokio::spawn(run_node(node, rx, Arc::clone(&self.net), self.config.tick()));
        self.running.insert(id, Running { inbox: tx, task });
        Ok(())
    }

    fn inbox(&self, id: NodeId) -> Result<&Inbox> {
        match self.running.get(&id) {
            Some(running) => Ok(&running.inbox),
            None if self.stopped.contains_key(&id) => Err(ClusterError::NodeDown(id)),
            None => Err(ClusterError::UnknownNode(id)),
        }
    }

    /// Longest a proposal waits for its commit
    fn commit_timeout(&self) -> Duration {
        let ticks = u32::try_from(self.config.raft.election_timeout_max).unwrap_or(u32::MAX);
        self.config.tick().saturating_mul(ticks.saturating_mul(10))
    }

    // -- queries --

    pub async fn status(&self, id: NodeId) -> Result<NodeStatus> {
        let (tx, rx) = oneshot::channel();
        self.inbox(id)?
            .send(Input::Status(tx))
            .map_err(|_| ClusterError::NodeDown(id))?;
        rx.await.map_err(|_| ClusterError::NodeDown(id))
    }

    /// Status of every running node, ordered by id
    pub async fn statuses(&self) -> Vec<NodeStatus> {
        let mut ids: Vec<_> = self.running.keys().copied().collect();
        ids.sort_unstable();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(status) = self.status(id).await {
                out.push(status);
            }
        }
        out
    }

    /// The single leader among running, connected nodes
    pub async fn leader(&self) -> Option<NodeId> {
        let leaders: Vec<_> = self
            .statuses()
            .await
            .into_iter()
            .filter(|s| s.is_leader() && !self.net.is_isolated(s.id))
            .collect();
        match leaders.as_slice() {
            [only] => Some(only.id),
            _ => None,
        }
    }

    /// Poll until one connected leader exists
    pub async fn wait_for_leader(&self, timeout: Duration) -> Result<NodeId> {
        let poll = async {
            loop {
                if let Some(leader) = self.leader().await {
                    return leader;
                }
                time::sleep(self.config.tick()).await;
            }
        };
        time::timeout(timeout, poll).await.map_err(|_| ClusterError::Timeout)
    }

    // -- proposals --

    /// Propose on the current leader; resolves with the index once committed
    pub async fn propose(&self, command: Command) -> Result<u64> {
        let leader = self.leader().await.ok_or(ClusterError::NoLeader(0))?;
        self.propose_to(leader, command).await
    }

    pub async fn propose_to(&self, id: NodeId, command: Command) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.inbox(id)?
            .send(Input::Propose { command, reply: tx })
            .map_err(|_| ClusterError::NodeDown(id))?;
        match time::timeout(self.commit_timeout(), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClusterError::Stopped),
            Err(_) => Err(ClusterError::Timeout),
        }
    }

    // -- faults --

    pub fn partition(&self, id: NodeId) -> Result<()> {
        self.check_member(id)?;
        self.net.isolated.write().unwrap_or_else(|e| e.into_inner()).insert(id);
        info!(node = id, "partitioned");
        Ok(())
    }

    pub fn heal(&self, id: NodeId) -> Result<()> {
        self.check_member(id)?;
        self.net.isolated.write().unwrap_or_else(|e| e.into_inner()).remove(&id);
        info!(node = id, "healed");
        Ok(())
    }

    fn check_member(&self, id: NodeId) -> Result<()> {
        if self.config.node_ids.contains(&id) {
            Ok(())
        } else {
            Err(ClusterError::UnknownNode(id))
        }
    }

    /// Stop a node's task, keeping its storage for a later restart
    pub async fn kill(&mut self, id: NodeId) -> Result<()> {
        let running = self.running.remove(&id).ok_or_else(|| {
            if self.stopped.contains_key(&id) {
                ClusterError::NodeDown(id)
            } else {
                ClusterError::UnknownNode(id)
            }
        })?;
        self.net.inboxes.write().unwrap_or_else(|e| e.into_inner()).remove(&id);
        let _ = running.inbox.send(Input::Shutdown);
        let node = running.task.await.map_err(|_| ClusterError::Stopped)?;
        info!(node = id, term = node.current_term, "killed");
        self.stopped.insert(id, node.into_storage());
        Ok(())
    }

    pub fn restart(&mut self, id: NodeId) -> Result<()> {
        if self.running.contains_key(&id) {
            return Err(ClusterError::NodeUp(id));
        }
        let storage = self.stopped.remove(&id).ok_or(ClusterError::UnknownNode(id))?;
        self.spawn(id, storage)?;
        info!(node = id, "restarted");
        Ok(())
    }

    /// Stop every task and hand back each node's storage
    pub async fn shutdown(mut self) -> Result<HashMap<NodeId, S>> {
        let ids: Vec<_> = self.running.keys().copied().collect();
        for id in ids {
            self.kill(id).await?;
        }
        info!("cluster runtime stopped");
        Ok(self.stopped)
    }
}

/// Proposals waiting for commit, keyed by index, with the term they were proposed in
type Waiters = BTreeMap<u64, (Term, oneshot::Sender<Result<u64>>)>;

async fn run_node<S: Storage>(
    mut node: RaftNode<S>,
    mut inbox: mpsc::UnboundedReceiver<Input>,
    net: Arc<Network>,
    tick: Duration,
) -> RaftNode<S> {
    let mut interval = time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut waiters = Waiters::new();

    loop {
        let outcome = tokio::select! {
            _ = interval.tick() => node.tick(),
            input = inbox.recv() => match input {
                None | Some(Input::Shutdown) => break,
                Some(Input::Message(envelope)) => node.step(envelope.from, envelope.message),
                Some(Input::Propose { command, reply }) => match node.propose(command) {
                    Ok(entry) => {
                        debug!(node = node.id, index = entry.index, "proposal accepted");
                        waiters.insert(entry.index, (entry.term, reply));
                        Ok(node.broadcast_append_entries())
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e.into()));
                        Ok(Vec::new())
                    }
                },
                Some(Input::Status(reply)) => {
                    let _ = reply.send(NodeStatus::of(&node));
                    Ok(Vec::new())
                }
            },
        };

        match outcome {
            Ok(outbox) => net.send(outbox),
            Err(e) => {
                // durability is gone; stop rather than keep voting or acking
                error!(node = node.id, error = %e, "node halted");
                break;
            }
        }
        resolve_waiters(&node, &mut waiters);
    }
    node
}

fn resolve_waiters<S: Storage>(node: &RaftNode<S>, waiters: &mut Waiters) {
    while let Some(first) = waiters.first_entry() {
        let index = *first.key();
        if index > node.commit_index {
            break;
        }
        let (term, reply) = first.remove();
        let result = if node.get_term_at(index) == term {
            Ok(index)
        } else {
            Err(ClusterError::Superseded { index })
        };
        let _ = reply.send(result);
    }
}
