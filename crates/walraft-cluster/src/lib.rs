//! # walraft-cluster
//!
//! why: put raft nodes together into a cluster, in-process or on tokio tasks
//! relations: drives walraft-core nodes over walraft-storage persistence
//! what: ClusterConfig, local Cluster harness, replicate(), ClusterRuntime

pub mod config;
pub mod error;
pub mod local;
pub mod replicate;
pub mod runtime;

pub use config::ClusterConfig;
pub use error::{ClusterError, Result};
pub use local::Cluster;
pub use replicate::{replicate, ReplicateOutcome};
pub use runtime::{ClusterRuntime, NodeStatus};
