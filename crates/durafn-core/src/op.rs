// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pending operations reported to the orchestrator.
//!
//! An [`Op`] is produced when the interceptor finds no state entry for a
//! step call: the step is newly discovered and its side effect has not run
//! yet. All ops discovered within one attempt form a "wave" and are reported
//! together so the orchestrator can schedule them in parallel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::StepKey;

/// The kind of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    /// Execute a unit of user code.
    RunStep,
    /// Durable sleep for a fixed duration.
    Sleep,
    /// Wait for a matching event to arrive.
    WaitForEvent,
    /// Publish events through the orchestrator.
    SendEvent,
    /// Invoke another durable function.
    Invoke,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunStep => write!(f, "RunStep"),
            Self::Sleep => write!(f, "Sleep"),
            Self::WaitForEvent => write!(f, "WaitForEvent"),
            Self::SendEvent => write!(f, "SendEvent"),
            Self::Invoke => write!(f, "Invoke"),
        }
    }
}

/// A newly discovered pending operation.
///
/// Ops are created once per attempt and handed to the transport; they do not
/// outlive the attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Op {
    /// Hashed key the orchestrator will store the result under.
    pub id: StepKey,
    /// Operation kind.
    pub kind: OpKind,
    /// Human-readable step id, e.g. `"charge-card:1"`.
    pub display_name: String,
    /// Kind-specific options (durations, event filters, recorded input).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opts: Option<Value>,
}

impl Op {
    /// Creates an op with no options.
    pub fn new(id: StepKey, kind: OpKind, display_name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            display_name: display_name.into(),
            opts: None,
        }
    }

    /// Sets kind-specific options.
    pub fn with_opts(mut self, opts: Value) -> Self {
        self.opts = Some(opts);
        self
    }

    /// The input recorded for this step call, if any.
    ///
    /// Steps issued through `Context::run_with` carry their serialized input
    /// here; mock handlers in the test harness receive it.
    pub fn input(&self) -> Value {
        self.opts
            .as_ref()
            .and_then(|opts| opts.get("input"))
            .cloned()
            .unwrap_or(Value::Null)
    }
}
