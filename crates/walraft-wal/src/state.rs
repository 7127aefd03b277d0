//! # state
//!
//! why: apply transitions only after they are durable, and only against the version on disk
//! relations: owns a DurableLog, rebuilt by recovery.rs, merge shared with walraft_core::KvStateMachine
//! what: CanonicalState with version-checked transition, custom transition functions, reload, verify

use crate::error::{Result, TransitionError, VersionConflict};
use crate::log::DurableLog;
use crate::record::transition_payload;
use crate::recovery::{Recovered, RecoveryEngine};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walraft_core::{Command, KvStateMachine};

/// Receipt for a transition that advanced the version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Committed {
    pub seq: u64,
    /// version after the transition
    pub version: u64,
}

/// Last-writer-wins merge of an event's fields over a copy of `data`
pub fn merge_event(
    data: &BTreeMap<String, Value>,
    event: &Value,
) -> std::result::Result<BTreeMap<String, Value>, String> {
    let command = Command::from_value(event.clone())
        .ok_or_else(|| format!("event must be a JSON object, got {}", kind(event)))?;
    let mut next = data.clone();
    for (key, value) in command.iter() {
        next.insert(key.clone(), value.clone());
    }
    Ok(next)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// In-memory mirror of the committed transitions in a durable log
///
/// `version` equals the number of committed transitions in the log as of
/// the last successful transition. Taking `&mut self` keeps transitions on
/// one state strictly serialized.
#[derive(Debug)]
pub struct CanonicalState {
    log: DurableLog,
    machine: KvStateMachine,
    version: u64,
}

impl CanonicalState {
    /// Open the log at `path` and rebuild state from it
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let log = DurableLog::open(path)?;
        let recovered = RecoveryEngine::new(log.path()).recover()?;
        info!(
            path = %log.path().display(),
            version = recovered.version,
            keys = recovered.data.len(),
            "canonical state opened"
        );
        Ok(Self {
            log,
            machine: KvStateMachine::from_data(recovered.data),
            version: recovered.version,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        self.machine.data()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.machine.get(key)
    }

    pub fn path(&self) -> &Path {
        self.log.path()
    }

    pub fn log(&self) -> &DurableLog {
        &self.log
    }

    /// Apply `event` with the default field merge
    pub fn transition(
        &mut self,
        event: Value,
        expected_version: u64,
    ) -> std::result::Result<Committed, TransitionError> {
        self.transition_with(event, expected_version, merge_event)
    }

    /// Apply `event` with a custom transition function
    ///
    /// The event is logged as pending before `apply` runs. `apply` works on
    /// the current data and returns the replacement; an `Err` marks the record
    /// failed and leaves state untouched.
    pub fn transition_with<F>(
        &mut self,
        event: Value,
        expected_version: u64,
        apply: F,
    ) -> std::result::Result<Committed, TransitionError>
    where
        F: FnOnce(&BTreeMap<String, Value>, &Value) -> std::result::Result<BTreeMap<String, Value>, String>,
    {
        let canonical = self.log.committed_count()?;
        if canonical != self.version {
            error!(local = self.version, log = canonical, "local state out of sync with log");
            return Err(VersionConflict::OutOfSync {
                local: self.version,
                log: canonical,
            }
            .into());
        }
        if expected_version != canonical {
            return Err(VersionConflict::Stale {
                expected: expected_version,
                actual: canonical,
            }
            .into());
        }

        let seq = self.log.append(transition_payload(&event, canonical))?;
        match apply(self.machine.data(), &event) {
            Ok(next) => {
                self.log.mark_committed(seq)?;
                self.machine.replace(next);
                self.version += 1;
                Ok(Committed {
                    seq,
                    version: self.version,
                })
            }
            Err(reason) => {
                self.log.mark_failed(seq, &reason)?;
                Err(TransitionError::ApplyFailed { seq, reason })
            }
        }
    }

    /// Throw away in-memory state and rebuild it from the log
    pub fn reload(&mut self) -> Result<()> {
        let Recovered { data, version, .. } = RecoveryEngine::new(self.log.path()).recover()?;
        if version != self.version {
            info!(from = self.version, to = version, "state reloaded");
        }
        self.machine.replace(data);
        self.version = version;
        Ok(())
    }

    /// Full rescan of the log, compared against in-memory state
    pub fn verify(&self) -> std::result::Result<(), TransitionError> {
        let recovered = RecoveryEngine::new(self.log.path()).recover()?;
        if recovered.version != self.version || &recovered.data != self.machine.data() {
            warn!(local = self.version, log = recovered.version, "verification found drift");
            return Err(VersionConflict::OutOfSync {
                local: self.version,
                log: recovered.version,
            }
            .into());
        }
        Ok(())
    }
}
