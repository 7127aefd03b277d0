//! # config
//!
//! why: describe a cluster once and start it either in-process or on tokio
//! relations: consumed by local.rs and runtime.rs, embeds walraft_core::RaftConfig
//! what: ClusterConfig with TOML loading and validation

use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walraft_core::{NodeId, RaftConfig};

/// Cluster membership, storage location and timing
///
/// ```toml
/// node_ids = [1, 2, 3]
/// data_dir = "/var/lib/walraft"
/// tick_ms = 1
///
/// [raft]
/// election_timeout_min = 150
/// election_timeout_max = 300
/// heartbeat_interval = 50
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub node_ids: Vec<NodeId>,
    /// each node persists under `data_dir/node-<id>`; memory only when unset
    pub data_dir: Option<PathBuf>,
    /// wall-clock length of one tick for the async runtime
    pub tick_ms: u64,
    pub raft: RaftConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_ids: vec![1, 2, 3],
            data_dir: None,
            tick_ms: 1,
            raft: RaftConfig::default(),
        }
    }
}

impl ClusterConfig {
    /// Read and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_ids.is_empty() {
            return Err(ClusterError::Config("node_ids must not be empty".into()));
        }
        let unique: HashSet<_> = self.node_ids.iter().collect();
        if unique.len() != self.node_ids.len() {
            return Err(ClusterError::Config("node_ids must be unique".into()));
        }
        if self.tick_ms == 0 {
            return Err(ClusterError::Config("tick_ms must be positive".into()));
        }
        self.raft.validate()?;
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Directory for one node's files, if the cluster is persistent
    pub fn node_dir(&self, id: NodeId) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(format!("node-{id}")))
    }
}
