// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Memoization store.
//!
//! The orchestrator owns step results. On every attempt it hands the engine
//! the accumulated record of completed steps; the engine reads it to
//! short-circuit replayed calls and never writes back into it. New results
//! only reach the store on a future attempt, after the orchestrator has run
//! the corresponding op.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StepFailure;
use crate::key::StepKey;
use crate::op::OpKind;
use crate::result::StepOutcome;

/// Record of a previously completed step, as stored by the orchestrator.
///
/// Exactly one of `data` and `error` is populated. `kind` is optional
/// metadata; when present, the interceptor checks it against the call site
/// to catch functions whose call sequence drifted between attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStateEntry {
    /// Key the result is stored under.
    pub hashed_key: StepKey,
    /// Human-readable step id the key was derived from.
    pub human_id: String,
    /// Kind of the op that produced this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<OpKind>,
    /// Serialized step output, for completed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure record, for failed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepFailure>,
}

impl StepStateEntry {
    /// Entry for a step that completed with `data`.
    pub fn completed(human_id: impl Into<String>, kind: OpKind, data: Value) -> Self {
        let human_id = human_id.into();
        Self {
            hashed_key: StepKey::of(&human_id),
            human_id,
            kind: Some(kind),
            data: Some(data),
            error: None,
        }
    }

    /// Entry for a step that failed.
    pub fn failed(human_id: impl Into<String>, kind: OpKind, error: StepFailure) -> Self {
        let human_id = human_id.into();
        Self {
            hashed_key: StepKey::of(&human_id),
            human_id,
            kind: Some(kind),
            data: None,
            error: Some(error),
        }
    }

    /// The entry's outcome: its failure if one is recorded, its data
    /// otherwise (absent data reads as null).
    pub fn outcome(&self) -> StepOutcome {
        match &self.error {
            Some(failure) => StepOutcome::Error(failure.clone()),
            None => StepOutcome::Data(self.data.clone().unwrap_or(Value::Null)),
        }
    }
}

/// Read-only view of the step results accumulated for a run.
///
/// Built once per attempt from transport-supplied entries. `lookup` and
/// `has` are side-effect free and callable any number of times.
#[derive(Debug, Clone, Default)]
pub struct MemoizedState {
    entries: HashMap<StepKey, StepStateEntry>,
}

impl MemoizedState {
    /// Empty state: a fresh run with nothing memoized.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the store from transport-supplied entries.
    pub fn from_entries(entries: impl IntoIterator<Item = StepStateEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.hashed_key.clone(), entry))
                .collect(),
        }
    }

    /// The entry stored under `key`, if the step already completed.
    pub fn lookup(&self, key: &StepKey) -> Option<&StepStateEntry> {
        self.entries.get(key)
    }

    /// Whether a completed entry exists for `key`.
    pub fn has(&self, key: &StepKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of memoized steps.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is memoized yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this attempt replays earlier progress.
    pub fn is_replay(&self) -> bool {
        !self.entries.is_empty()
    }
}
