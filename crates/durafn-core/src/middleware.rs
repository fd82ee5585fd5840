// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Middleware pipeline.
//!
//! The engine exposes a fixed set of lifecycle hooks it calls but never
//! interprets. External concerns (encryption, tracing, metrics) attach here
//! without the engine knowing about them. Hooks receive immutable snapshots
//! and may return patches of optional slots that the engine shallow-merges
//! into its context; they never replace engine state wholesale.
//!
//! Because the whole function re-runs on every attempt, every hook re-fires
//! on every attempt too. Middlewares must be safe to re-run with identical
//! inputs.
//!
//! Composition follows the classic onion: "before" hooks run in registration
//! order, "after" hooks in reverse. `transform_input` is fan-out: each
//! middleware sees the events as patched so far and its patch merges on top.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::StepFailure;
use crate::event::Event;
use crate::ident::StepId;
use crate::key::StepKey;
use crate::op::OpKind;
use crate::result::{ExecutionResult, StepOutcome};

/// Immutable view of the step a hook is firing for.
#[derive(Debug, Clone)]
pub struct StepInfo {
    /// Identity of the step invocation.
    pub id: StepId,
    /// Hashed key used against the memoization store.
    pub key: StepKey,
    /// Kind of the step call.
    pub kind: OpKind,
}

/// Patch returned by [`Middleware::transform_input`].
///
/// Slots left `None` keep the engine's current value.
#[derive(Debug, Clone, Default)]
pub struct InputPatch {
    /// Replacement triggering events (e.g. after payload decryption).
    pub events: Option<Vec<Event>>,
}

impl InputPatch {
    /// Patch that swaps in the given events.
    pub fn events(events: Vec<Event>) -> Self {
        Self {
            events: Some(events),
        }
    }
}

/// Patch returned by [`Middleware::transform_output`].
#[derive(Debug, Clone, Default)]
pub struct OutputPatch {
    /// Replacement output value (e.g. after payload encryption).
    pub data: Option<Value>,
}

impl OutputPatch {
    /// Patch that swaps in the given output.
    pub fn data(data: Value) -> Self {
        Self { data: Some(data) }
    }
}

/// Lifecycle hooks around one attempt.
///
/// Every method has a no-op default; implementors override only what they
/// care about. Implementations must not assume ordering relative to
/// unrelated middlewares beyond registration order for before-hooks.
#[allow(unused_variables)]
pub trait Middleware: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Transform the triggering events before the function body sees them.
    fn transform_input(&self, events: &[Event]) -> Option<InputPatch> {
        None
    }

    /// Transform the function (or ran step's) output before it is reported.
    fn transform_output(&self, data: &Value) -> Option<OutputPatch> {
        None
    }

    /// Fires before the memoization store is consulted for a step call.
    fn before_memoization(&self, step: &StepInfo) {}

    /// Fires after the lookup; `memoized` tells whether an entry was found.
    fn after_memoization(&self, step: &StepInfo, memoized: bool) {}

    /// Fires once per attempt, before the function body runs.
    fn before_execution(&self, run_id: &str, attempt: u32) {}

    /// Fires once per attempt, after the attempt's result is known.
    fn after_execution(&self, run_id: &str) {}

    /// Fires when a step's real body is about to execute.
    fn on_step_start(&self, step: &StepInfo) {}

    /// Fires when a step's real body completed.
    fn on_step_complete(&self, step: &StepInfo, outcome: &StepOutcome) {}

    /// Fires when a step's real body failed.
    fn on_step_error(&self, step: &StepInfo, error: &StepFailure) {}

    /// Fires when the attempt resolved the whole function.
    fn on_run_complete(&self, result: &ExecutionResult) {}

    /// Fires when the attempt rejected the whole function.
    fn on_run_error(&self, error: &StepFailure) {}
}

/// Ordered middleware chain.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareStack {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware; registration order is execution order for
    /// before-hooks.
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Appends an already-shared middleware.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.layers.push(middleware);
    }

    /// Number of registered middlewares.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when no middleware is registered.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub(crate) fn apply_input(&self, mut events: Vec<Event>) -> Vec<Event> {
        for layer in &self.layers {
            if let Some(patch) = layer.transform_input(&events) {
                if let Some(patched) = patch.events {
                    debug!(middleware = layer.name(), "input transformed");
                    events = patched;
                }
            }
        }
        events
    }

    pub(crate) fn apply_output(&self, mut data: Value) -> Value {
        for layer in self.layers.iter().rev() {
            if let Some(patch) = layer.transform_output(&data) {
                if let Some(patched) = patch.data {
                    debug!(middleware = layer.name(), "output transformed");
                    data = patched;
                }
            }
        }
        data
    }

    pub(crate) fn before_memoization(&self, step: &StepInfo) {
        for layer in &self.layers {
            layer.before_memoization(step);
        }
    }

    pub(crate) fn after_memoization(&self, step: &StepInfo, memoized: bool) {
        for layer in self.layers.iter().rev() {
            layer.after_memoization(step, memoized);
        }
    }

    pub(crate) fn before_execution(&self, run_id: &str, attempt: u32) {
        for layer in &self.layers {
            layer.before_execution(run_id, attempt);
        }
    }

    pub(crate) fn after_execution(&self, run_id: &str) {
        for layer in self.layers.iter().rev() {
            layer.after_execution(run_id);
        }
    }

    pub(crate) fn on_step_start(&self, step: &StepInfo) {
        for layer in &self.layers {
            layer.on_step_start(step);
        }
    }

    pub(crate) fn on_step_complete(&self, step: &StepInfo, outcome: &StepOutcome) {
        for layer in self.layers.iter().rev() {
            layer.on_step_complete(step, outcome);
        }
    }

    pub(crate) fn on_step_error(&self, step: &StepInfo, error: &StepFailure) {
        for layer in self.layers.iter().rev() {
            layer.on_step_error(step, error);
        }
    }

    pub(crate) fn on_run_complete(&self, result: &ExecutionResult) {
        for layer in self.layers.iter().rev() {
            layer.on_run_complete(result);
        }
    }

    pub(crate) fn on_run_error(&self, error: &StepFailure) {
        for layer in self.layers.iter().rev() {
            layer.on_run_error(error);
        }
    }
}

impl fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.layers.iter().map(|layer| layer.name()))
            .finish()
    }
}

/// Built-in middleware emitting `tracing` events for the run lifecycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMiddleware;

impl Middleware for LogMiddleware {
    fn name(&self) -> &str {
        "log"
    }

    fn before_execution(&self, run_id: &str, attempt: u32) {
        debug!(run_id = %run_id, attempt, "attempt started");
    }

    fn after_execution(&self, run_id: &str) {
        debug!(run_id = %run_id, "attempt finished");
    }

    fn after_memoization(&self, step: &StepInfo, memoized: bool) {
        if memoized {
            debug!(step = %step.id, "step memoized, body skipped");
        }
    }

    fn on_step_start(&self, step: &StepInfo) {
        debug!(step = %step.id, kind = %step.kind, "step executing");
    }

    fn on_step_complete(&self, step: &StepInfo, _outcome: &StepOutcome) {
        debug!(step = %step.id, "step completed");
    }

    fn on_step_error(&self, step: &StepInfo, error: &StepFailure) {
        warn!(step = %step.id, error = %error, "step failed");
    }

    fn on_run_error(&self, error: &StepFailure) {
        warn!(error = %error, "run rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn before_execution(&self, _run_id: &str, _attempt: u32) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:before", self.name));
        }

        fn after_execution(&self, _run_id: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:after", self.name));
        }

        fn transform_input(&self, events: &[Event]) -> Option<InputPatch> {
            let mut events = events.to_vec();
            for event in &mut events {
                event.name = format!("{}+{}", event.name, self.name);
            }
            Some(InputPatch::events(events))
        }
    }

    #[test]
    fn test_before_hooks_run_in_registration_order_after_hooks_reversed() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let stack = MiddlewareStack::new()
            .with(Recorder {
                name: "one",
                calls: calls.clone(),
            })
            .with(Recorder {
                name: "two",
                calls: calls.clone(),
            });

        stack.before_execution("run", 0);
        stack.after_execution("run");

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec!["one:before", "two:before", "two:after", "one:after"]
        );
    }

    #[test]
    fn test_transform_input_fans_out_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let stack = MiddlewareStack::new()
            .with(Recorder {
                name: "one",
                calls: calls.clone(),
            })
            .with(Recorder {
                name: "two",
                calls: calls.clone(),
            });

        let events = stack.apply_input(vec![Event::new("base")]);
        assert_eq!(events[0].name, "base+one+two");
    }

    #[test]
    fn test_empty_stack_passes_through() {
        let stack = MiddlewareStack::new();
        assert!(stack.is_empty());
        let events = stack.apply_input(vec![Event::new("x")]);
        assert_eq!(events[0].name, "x");
        let data = stack.apply_output(serde_json::json!(5));
        assert_eq!(data, serde_json::json!(5));
    }
}
