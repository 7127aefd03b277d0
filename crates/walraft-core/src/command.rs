//! # command
//!
//! why: give every replica the same deterministic transition to apply
//! relations: carried by log.rs entries, applied by node.rs on commit, reused by walraft-wal
//! what: Command (key/value transition), KvStateMachine (last-writer-wins merge)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A state transition: a set of keys and the values they should hold afterwards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(Map<String, Value>);

impl Command {
    /// Create an empty command
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for constructing commands inline
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set a single key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Interpret an arbitrary json value as a command
    ///
    /// Only objects are transitions; anything else yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Command {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Command {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Key/value state machine shared by the single-node WAL and every cluster replica
///
/// Applying a command overwrites each of its keys (last writer wins per key),
/// so re-applying the same command is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvStateMachine {
    data: BTreeMap<String, Value>,
}

impl KvStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state machine around existing data
    pub fn from_data(data: BTreeMap<String, Value>) -> Self {
        Self { data }
    }

    /// Merge `command` into a copy of the current data, leaving `self` untouched
    pub fn merged(&self, command: &Command) -> BTreeMap<String, Value> {
        let mut snapshot = self.data.clone();
        for (key, value) in command.iter() {
            snapshot.insert(key.clone(), value.clone());
        }
        snapshot
    }

    /// Merge `command` in place
    pub fn apply(&mut self, command: &Command) {
        for (key, value) in command.iter() {
            self.data.insert(key.clone(), value.clone());
        }
    }

    /// Swap in a snapshot produced by [`KvStateMachine::merged`]
    pub fn replace(&mut self, data: BTreeMap<String, Value>) {
        self.data = data;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
