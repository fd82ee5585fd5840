// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Triggering events delivered by the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event that triggered (or was observed by) a durable function run.
///
/// Events are orchestrator-owned: the engine only reads them. Within a run
/// the same events are re-delivered on every attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event name, e.g. `"shop/order.created"`.
    pub name: String,
    /// Arbitrary event payload.
    #[serde(default)]
    pub data: Value,
    /// Orchestrator-assigned event id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// When the event was received by the orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
}

impl Event {
    /// Creates an event with an empty payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Value::Null,
            id: None,
            ts: None,
        }
    }

    /// Sets the payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Sets the event id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the received-at timestamp.
    pub fn with_ts(mut self, ts: DateTime<Utc>) -> Self {
        self.ts = Some(ts);
        self
    }
}
