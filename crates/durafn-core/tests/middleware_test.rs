// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the middleware pipeline wired through the engine.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use durafn_core::{
    AttemptInput, Event, ExecutionEngine, ExecutionResult, InputPatch, LogMiddleware,
    MemoizedState, Middleware, MiddlewareStack, OpKind, OutputPatch, StepFailure, StepInfo,
    StepKey, StepOutcome, StepStateEntry, body_fn,
};

#[derive(Clone)]
struct Recording {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recording {
    fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn push(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Middleware for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    fn before_execution(&self, _run_id: &str, _attempt: u32) {
        self.push("before-execution");
    }

    fn after_execution(&self, _run_id: &str) {
        self.push("after-execution");
    }

    fn before_memoization(&self, step: &StepInfo) {
        self.push(format!("before-memoization:{}", step.id));
    }

    fn after_memoization(&self, step: &StepInfo, memoized: bool) {
        self.push(format!("after-memoization:{}:{memoized}", step.id));
    }

    fn on_step_start(&self, step: &StepInfo) {
        self.push(format!("step-start:{}", step.id));
    }

    fn on_step_complete(&self, step: &StepInfo, _outcome: &StepOutcome) {
        self.push(format!("step-complete:{}", step.id));
    }

    fn on_step_error(&self, step: &StepInfo, _error: &StepFailure) {
        self.push(format!("step-error:{}", step.id));
    }

    fn on_run_complete(&self, _result: &ExecutionResult) {
        self.push("run-complete");
    }

    fn on_run_error(&self, error: &StepFailure) {
        self.push(format!("run-error:{}", error.error_type));
    }
}

/// Stamps a marker into every event payload on the way in and wraps the
/// output on the way out.
struct Enveloping;

impl Middleware for Enveloping {
    fn name(&self) -> &str {
        "enveloping"
    }

    fn transform_input(&self, events: &[Event]) -> Option<InputPatch> {
        let mut events = events.to_vec();
        for event in &mut events {
            event.data["stamped"] = json!(true);
        }
        Some(InputPatch::events(events))
    }

    fn transform_output(&self, data: &Value) -> Option<OutputPatch> {
        Some(OutputPatch::data(json!({ "envelope": data.clone() })))
    }
}

fn body() -> durafn_core::FunctionBody {
    body_fn(|ctx| async move {
        let stamped = ctx
            .event()
            .map(|event| event.data["stamped"].clone())
            .unwrap_or(Value::Null);
        let n: i64 = ctx.run("n", || async { Ok(5) }).await?;
        Ok(json!({ "n": n, "stamped": stamped }))
    })
}

#[tokio::test]
async fn test_hooks_fire_in_onion_order_on_a_memoized_run() {
    let recording = Recording::new();
    let stack = MiddlewareStack::new()
        .with(LogMiddleware)
        .with(recording.clone());
    let engine = ExecutionEngine::with_middleware(stack);

    let input = AttemptInput::new("run-1", vec![Event::new("demo/go").with_data(json!({}))])
        .with_state(MemoizedState::from_entries([StepStateEntry::completed(
            "n",
            OpKind::RunStep,
            json!(5),
        )]));
    let result = engine.execute(&body(), input).await.unwrap();

    assert!(result.is_resolved());
    assert_eq!(
        recording.calls(),
        vec![
            "before-execution",
            "before-memoization:n",
            "after-memoization:n:true",
            "run-complete",
            "after-execution",
        ]
    );
}

#[tokio::test]
async fn test_input_and_output_transforms_wrap_the_run() {
    let stack = MiddlewareStack::new().with(Enveloping);
    let engine = ExecutionEngine::with_middleware(stack);

    let input = AttemptInput::new("run-1", vec![Event::new("demo/go").with_data(json!({}))])
        .with_state(MemoizedState::from_entries([StepStateEntry::completed(
            "n",
            OpKind::RunStep,
            json!(5),
        )]));
    let result = engine.execute(&body(), input).await.unwrap();

    // The function saw the stamped input, and its output was enveloped on
    // the way out.
    assert_eq!(
        result.output(),
        Some(&json!({ "envelope": { "n": 5, "stamped": true } }))
    );
}

#[tokio::test]
async fn test_step_hooks_fire_only_when_the_body_really_runs() {
    let recording = Recording::new();
    let stack = MiddlewareStack::new().with(recording.clone());
    let engine = ExecutionEngine::with_middleware(stack);

    // Discovery attempt: the step is reported, not run.
    let input = AttemptInput::new("run-1", vec![Event::new("demo/go").with_data(json!({}))]);
    engine.execute(&body(), input).await.unwrap();
    assert!(
        !recording
            .calls()
            .iter()
            .any(|call| call.starts_with("step-start"))
    );

    // Targeted attempt: the body executes and the step hooks fire.
    let input = AttemptInput::new("run-1", vec![Event::new("demo/go").with_data(json!({}))])
        .with_target_step(StepKey::of("n"));
    let result = engine.execute(&body(), input).await.unwrap();
    assert!(matches!(result, ExecutionResult::StepRan { .. }));

    let calls = recording.calls();
    assert!(calls.contains(&"step-start:n".to_string()));
    assert!(calls.contains(&"step-complete:n".to_string()));
}

#[tokio::test]
async fn test_run_error_hook_fires_on_rejection() {
    let recording = Recording::new();
    let stack = MiddlewareStack::new().with(recording.clone());
    let engine = ExecutionEngine::with_middleware(stack);

    let failing = body_fn(|_ctx| async move {
        Err::<Value, _>(StepFailure::new("BusinessError", "nope"))
    });
    let input = AttemptInput::new("run-1", vec![Event::new("demo/go")]);
    let result = engine.execute(&failing, input).await.unwrap();

    assert!(result.is_rejected());
    assert!(
        recording
            .calls()
            .contains(&"run-error:BusinessError".to_string())
    );
}
