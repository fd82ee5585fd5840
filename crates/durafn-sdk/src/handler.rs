// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Canonical transport interface.
//!
//! The orchestrator calls an app over plain HTTP; framework-specific glue
//! (the actual routes, body parsing, signatures) lives outside this crate.
//! What lives here is the canonical shape every adapter translates to and
//! from: [`RunRequest`] in, [`RunResponse`] out, with the engine result
//! mapped onto statuses:
//!
//! - `200` - function resolved; body is the final output
//! - `206` - partial progress; body is the array of discovered ops (a ran
//!   step is reported as a single op carrying its outcome)
//! - `500` - rejection or fatal engine error; body is the failure record,
//!   with `x-durafn-no-retry: true` set for non-retriable invariant
//!   violations

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use durafn_core::{
    AttemptInput, Event, ExecutionEngine, ExecutionResult, MemoizedState, Op, StepFailure,
    StepKey, StepOutcome, StepStateEntry,
};

use crate::config::SdkConfig;
use crate::error::SdkError;
use crate::registry::FunctionRegistry;

/// One attempt's input, as decoded from an orchestrator request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Which registered function to drive.
    pub function_id: String,
    /// Orchestrator-assigned run id.
    pub run_id: String,
    /// Zero-based attempt number.
    #[serde(default)]
    pub attempt: u32,
    /// Triggering events.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Accumulated step state entries.
    #[serde(default)]
    pub steps: Vec<StepStateEntry>,
    /// Step this attempt should execute, if the orchestrator picked one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_step: Option<StepKey>,
}

/// Canonical response an adapter serializes back onto its framework.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Value,
}

impl RunResponse {
    fn base_headers() -> Vec<(String, String)> {
        vec![("content-type".to_string(), "application/json".to_string())]
    }

    /// `200` - the function resolved with `data`.
    pub fn resolved(data: Value) -> Self {
        Self {
            status: 200,
            headers: Self::base_headers(),
            body: data,
        }
    }

    /// `206` - new ops were discovered.
    pub fn steps_found(ops: &[Op]) -> Self {
        Self {
            status: 206,
            headers: Self::base_headers(),
            body: json!(ops),
        }
    }

    /// `206` - the targeted step ran; its outcome rides on the op record.
    pub fn step_ran(step: &Op, outcome: &StepOutcome) -> Self {
        let mut reported = json!(step);
        match outcome {
            StepOutcome::Data(data) => reported["data"] = data.clone(),
            StepOutcome::Error(error) => reported["error"] = json!(error),
        }
        Self {
            status: 206,
            headers: Self::base_headers(),
            body: json!([reported]),
        }
    }

    /// `500` - the attempt failed. `retriable: false` marks fatal engine
    /// errors the orchestrator must not retry.
    pub fn error(failure: &StepFailure, retriable: bool) -> Self {
        let mut headers = Self::base_headers();
        if !retriable {
            headers.push(("x-durafn-no-retry".to_string(), "true".to_string()));
        }
        Self {
            status: 500,
            headers,
            body: json!(failure),
        }
    }

    /// `400` - the request itself was malformed.
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: 400,
            headers: Self::base_headers(),
            body: json!({ "error": message }),
        }
    }
}

/// Handles decoded orchestrator requests against a function registry.
pub struct CommHandler {
    config: SdkConfig,
    registry: Arc<FunctionRegistry>,
    engine: ExecutionEngine,
}

impl CommHandler {
    /// Handler with a default (middleware-free) engine.
    pub fn new(config: SdkConfig, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            config,
            registry,
            engine: ExecutionEngine::new(),
        }
    }

    /// Handler with a configured engine (e.g. carrying middleware).
    pub fn with_engine(
        config: SdkConfig,
        registry: Arc<FunctionRegistry>,
        engine: ExecutionEngine,
    ) -> Self {
        Self {
            config,
            registry,
            engine,
        }
    }

    /// The app configuration this handler serves under.
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Drives one attempt and maps the result onto the wire contract.
    pub async fn handle(&self, request: RunRequest) -> RunResponse {
        debug!(
            app = %self.config.app_id,
            function = %request.function_id,
            run_id = %request.run_id,
            attempt = request.attempt,
            steps = request.steps.len(),
            "handling attempt"
        );

        let Some(function) = self.registry.get(&request.function_id) else {
            warn!(function = %request.function_id, "request for unregistered function");
            let failure = SdkError::UnknownFunction(request.function_id).to_failure();
            return RunResponse::error(&failure, true);
        };

        let input = AttemptInput::new(request.run_id, request.events)
            .with_attempt(request.attempt)
            .with_state(MemoizedState::from_entries(request.steps));
        let input = match request.target_step {
            Some(target) => input.with_target_step(target),
            None => input,
        };

        match self.engine.execute(function.body(), input).await {
            Ok(ExecutionResult::Resolved { data }) => RunResponse::resolved(data),
            Ok(ExecutionResult::Rejected { error }) => RunResponse::error(&error, true),
            Ok(ExecutionResult::StepsFound { ops }) => RunResponse::steps_found(&ops),
            Ok(ExecutionResult::StepRan { step, outcome }) => {
                RunResponse::step_ran(&step, &outcome)
            }
            Err(engine_error) => {
                warn!(error = %engine_error, "fatal engine error, reporting non-retriable");
                let failure =
                    StepFailure::new("NonRetriableEngineError", engine_error.to_string());
                RunResponse::error(&failure, false)
            }
        }
    }
}

impl SdkError {
    /// Wire-facing failure record for this error.
    pub fn to_failure(&self) -> StepFailure {
        let error_type = match self {
            Self::Config(_) => "ConfigurationError",
            Self::UnknownFunction(_) => "UnknownFunctionError",
            Self::DuplicateFunction(_) => "DuplicateFunctionError",
            Self::MalformedRequest(_) => "MalformedRequestError",
            Self::Engine(_) => "EngineError",
        };
        StepFailure::new(error_type, self.to_string())
    }
}

/// Seam for framework glue: translate a framework request into the
/// canonical [`RunRequest`] and a [`RunResponse`] back.
///
/// One implementation exists per target framework, outside this crate; the
/// engine never sees framework types.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Framework-specific incoming request representation.
    type Request: Send;
    /// Framework-specific outgoing response representation.
    type Response: Send;

    /// Decodes a framework request into the canonical form.
    async fn decode(&self, request: Self::Request) -> Result<RunRequest, SdkError>;

    /// Encodes the canonical response for the framework.
    async fn encode(&self, response: RunResponse) -> Self::Response;
}

/// Decode, handle and encode one framework request.
pub async fn serve<A: TransportAdapter>(
    handler: &CommHandler,
    adapter: &A,
    request: A::Request,
) -> A::Response {
    let response = match adapter.decode(request).await {
        Ok(decoded) => handler.handle(decoded).await,
        Err(err) => RunResponse::bad_request(&err.to_string()),
    };
    adapter.encode(response).await
}
