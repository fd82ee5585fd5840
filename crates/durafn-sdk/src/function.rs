// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durable function definitions.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use durafn_core::{Context, FunctionBody, StepResult, body_fn};

/// What causes the orchestrator to start a run of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Trigger {
    /// Start a run for every matching event.
    Event {
        /// Event name, e.g. `"shop/order.created"`.
        event: String,
    },
    /// Start runs on a schedule.
    Cron {
        /// Cron expression, orchestrator-local time.
        cron: String,
    },
}

impl Trigger {
    /// Event trigger.
    pub fn event(event: impl Into<String>) -> Self {
        Self::Event {
            event: event.into(),
        }
    }

    /// Cron trigger.
    pub fn cron(cron: impl Into<String>) -> Self {
        Self::Cron { cron: cron.into() }
    }
}

/// A durable function: an id, its triggers and its step-composed body.
///
/// # Example
///
/// ```ignore
/// use durafn_sdk::{DurableFunction, Trigger};
///
/// let import_orders = DurableFunction::new("import-orders", |ctx| async move {
///     let ids: Vec<String> = ctx.run("list-orders", || async { list().await }).await?;
///     Ok(ids.len())
/// })
/// .with_name("Import orders")
/// .with_trigger(Trigger::event("shop/orders.requested"));
/// ```
#[derive(Clone)]
pub struct DurableFunction {
    id: String,
    name: Option<String>,
    triggers: Vec<Trigger>,
    body: FunctionBody,
}

impl DurableFunction {
    /// Creates a function from an id and an async handler.
    ///
    /// The handler runs once per attempt and must be deterministic outside
    /// its steps; see the engine crate docs.
    pub fn new<F, Fut, T>(id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult<T>> + Send + 'static,
        T: Serialize,
    {
        Self {
            id: id.into(),
            name: None,
            triggers: Vec::new(),
            body: body_fn(handler),
        }
    }

    /// Sets a human-readable display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a trigger.
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// The function's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, falling back to the id.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// The function's triggers.
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// The erased body the engine drives.
    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    /// App-scoped id as reported to the orchestrator.
    pub fn full_id(&self, app_id: &str) -> String {
        format!("{app_id}-{}", self.id)
    }
}

impl fmt::Debug for DurableFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableFunction")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("triggers", &self.triggers)
            .finish_non_exhaustive()
    }
}
