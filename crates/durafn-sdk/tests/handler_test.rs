// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the canonical transport handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use durafn_sdk::{
    CommHandler, DurableFunction, Event, FunctionRegistry, OpKind, RunRequest, RunResponse,
    SdkConfig, SdkError, StepStateEntry, TransportAdapter, Trigger, serve,
};

fn adder() -> DurableFunction {
    DurableFunction::new("adder", |ctx| async move {
        let a: i64 = ctx.run("a", || async { Ok(1) }).await?;
        let b: i64 = ctx
            .run_with("b", a + 1, |x| async move { Ok(x + 2) })
            .await?;
        Ok(json!({ "a": a, "b": b }))
    })
    .with_trigger(Trigger::event("math/add.requested"))
}

fn handler_for(function: DurableFunction) -> CommHandler {
    let mut registry = FunctionRegistry::new();
    registry.register(function).unwrap();
    CommHandler::new(SdkConfig::new("test-app"), Arc::new(registry))
}

fn request(function_id: &str, steps: Vec<StepStateEntry>) -> RunRequest {
    RunRequest {
        function_id: function_id.to_string(),
        run_id: "run-1".to_string(),
        attempt: 0,
        events: vec![Event::new("math/add.requested")],
        steps,
        target_step: None,
    }
}

fn header<'a>(response: &'a RunResponse, name: &str) -> Option<&'a str> {
    response
        .headers
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

#[tokio::test]
async fn test_unknown_function_is_a_retriable_error() {
    let handler = handler_for(adder());
    let response = handler.handle(request("missing", vec![])).await;

    assert_eq!(response.status, 500);
    assert_eq!(response.body["errorType"], "UnknownFunctionError");
    assert!(header(&response, "x-durafn-no-retry").is_none());
}

#[tokio::test]
async fn test_new_steps_are_reported_as_partial_content() {
    let handler = handler_for(adder());
    let response = handler.handle(request("adder", vec![])).await;

    assert_eq!(response.status, 206);
    let ops = response.body.as_array().unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["displayName"], "a");
    assert_eq!(ops[0]["kind"], "RunStep");
}

#[tokio::test]
async fn test_fully_memoized_run_resolves_with_output() {
    let handler = handler_for(adder());
    let response = handler
        .handle(request(
            "adder",
            vec![
                StepStateEntry::completed("a", OpKind::RunStep, json!(1)),
                StepStateEntry::completed("b", OpKind::RunStep, json!(4)),
            ],
        ))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({ "a": 1, "b": 4 }));
    assert_eq!(header(&response, "content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_targeted_step_reports_its_outcome_on_the_op() {
    let handler = handler_for(adder());

    // Discover "a", then ask the handler to actually run it.
    let discovery = handler.handle(request("adder", vec![])).await;
    let target = discovery.body[0]["id"].as_str().unwrap().to_string();

    let mut run = request("adder", vec![]);
    run.target_step = Some(durafn_sdk::StepKey::from_raw(target));
    let response = handler.handle(run).await;

    assert_eq!(response.status, 206);
    let ops = response.body.as_array().unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["displayName"], "a");
    assert_eq!(ops[0]["data"], json!(1));
}

#[tokio::test]
async fn test_rejection_maps_to_retriable_500() {
    let failing = DurableFunction::new("failing", |ctx| async move {
        let n: i64 = ctx.run("a", || async { Ok(1) }).await?;
        Err::<Value, _>(durafn_sdk::StepFailure::new(
            "BusinessError",
            format!("cannot process {n}"),
        ))
    });
    let handler = handler_for(failing);

    let response = handler
        .handle(request(
            "failing",
            vec![StepStateEntry::completed("a", OpKind::RunStep, json!(1))],
        ))
        .await;

    assert_eq!(response.status, 500);
    assert_eq!(response.body["errorType"], "BusinessError");
    assert!(header(&response, "x-durafn-no-retry").is_none());
}

#[tokio::test]
async fn test_non_determinism_maps_to_non_retriable_500() {
    let stuck = DurableFunction::new("stuck", |_ctx| async move {
        futures::future::pending::<()>().await;
        Ok(Value::Null)
    });
    let handler = handler_for(stuck);

    let response = handler.handle(request("stuck", vec![])).await;

    assert_eq!(response.status, 500);
    assert_eq!(response.body["errorType"], "NonRetriableEngineError");
    assert_eq!(header(&response, "x-durafn-no-retry"), Some("true"));
}

#[tokio::test]
async fn test_run_drives_to_completion_through_the_wire_contract() {
    let handler = handler_for(adder());
    let mut steps: Vec<StepStateEntry> = Vec::new();

    // Orchestrator loop: feed each reported op back as a completed entry
    // by replaying with the op targeted.
    loop {
        let mut run = request("adder", steps.clone());
        let response = handler.handle(run.clone()).await;
        match response.status {
            200 => {
                assert_eq!(response.body, json!({ "a": 1, "b": 4 }));
                break;
            }
            206 => {
                let op = &response.body[0];
                run.target_step = Some(durafn_sdk::StepKey::from_raw(
                    op["id"].as_str().unwrap(),
                ));
                let ran = handler.handle(run).await;
                assert_eq!(ran.status, 206);
                let ran_op = &ran.body[0];
                steps.push(StepStateEntry::completed(
                    ran_op["displayName"].as_str().unwrap(),
                    OpKind::RunStep,
                    ran_op["data"].clone(),
                ));
            }
            status => panic!("unexpected status {status}"),
        }
    }

    assert_eq!(steps.len(), 2);
}

struct JsonAdapter;

#[async_trait]
impl TransportAdapter for JsonAdapter {
    type Request = Value;
    type Response = (u16, Value);

    async fn decode(&self, request: Value) -> Result<RunRequest, SdkError> {
        serde_json::from_value(request)
            .map_err(|err| SdkError::MalformedRequest(err.to_string()))
    }

    async fn encode(&self, response: RunResponse) -> (u16, Value) {
        (response.status, response.body)
    }
}

#[tokio::test]
async fn test_serve_through_an_adapter() {
    let handler = handler_for(adder());

    let (status, body) = serve(
        &handler,
        &JsonAdapter,
        json!({
            "functionId": "adder",
            "runId": "run-1",
            "events": [{ "name": "math/add.requested" }],
        }),
    )
    .await;

    assert_eq!(status, 206);
    assert_eq!(body[0]["displayName"], "a");
}

#[tokio::test]
async fn test_serve_rejects_malformed_requests() {
    let handler = handler_for(adder());

    let (status, body) = serve(&handler, &JsonAdapter, json!({ "nonsense": true })).await;

    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("missing field"));
}
