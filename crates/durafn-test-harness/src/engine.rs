// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The test engine.
//!
//! [`TestEngine`] plays the orchestrator against a single function: it runs
//! attempts through the replay engine, and every time a wave of ops is
//! reported it resolves each op itself - through a mock handler when one is
//! registered for the step's human-readable id, through a targeted attempt
//! executing the real in-function body otherwise - then feeds the results
//! back as memoized state for the next attempt. Durable sleeps and waits
//! resolve immediately, so time never passes in tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use durafn_core::{
    AttemptInput, Event, ExecutionEngine, ExecutionResult, MemoizedState, Op, OpKind,
    StepFailure, StepKey, StepOutcome, StepResult, StepStateEntry,
};
use durafn_sdk::DurableFunction;

use crate::error::{HarnessError, Result};

/// Upper bound on attempts per `execute`/`execute_step` call; a run that
/// needs more is assumed to never settle.
const MAX_ATTEMPTS: u32 = 256;

type MockHandler = Arc<dyn Fn(Value) -> StepResult<Value> + Send + Sync>;

/// Replacement handler for a named step.
///
/// The handler receives the step's recorded input (`Value::Null` for steps
/// issued without one) and produces the value or failure to memoize.
#[derive(Clone)]
pub struct StepMock {
    id: String,
    handler: MockHandler,
}

impl StepMock {
    /// Mock for the step with the given human-readable id.
    ///
    /// Repeated base names use the same `:index` suffixes the engine
    /// assigns, so the second concurrent `"my-step"` is mocked as
    /// `"my-step:1"`.
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(Value) -> StepResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }

    /// The mocked step id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for StepMock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepMock")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Outcome of driving a function under test to completion.
#[derive(Debug, Clone)]
pub struct TestRunResult {
    /// Final output, when the function resolved.
    pub result: Option<Value>,
    /// Uncaught failure, when the function rejected.
    pub error: Option<StepFailure>,
    /// Every executed step's outcome, keyed by human-readable id.
    pub state: HashMap<String, StepOutcome>,
}

impl TestRunResult {
    /// True when the function resolved.
    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }

    /// A step's outcome, by human-readable id.
    pub fn step(&self, id: &str) -> Option<&StepOutcome> {
        self.state.get(id)
    }

    /// A step's output value, if it completed.
    pub fn step_data(&self, id: &str) -> Option<&Value> {
        self.state.get(id).and_then(StepOutcome::data)
    }
}

/// Deterministic driver for a durable function under test.
///
/// # Example
///
/// ```ignore
/// use durafn_test_harness::TestEngine;
///
/// let mut engine = TestEngine::new(checkout_function())
///     .with_events(vec![Event::new("shop/checkout.requested")])
///     .mock_step("charge-card", |input| Ok(json!({ "chargeId": "ch_1" })));
///
/// let run = engine.execute().await?;
/// assert!(run.is_resolved());
/// assert_eq!(run.step_data("charge-card").unwrap()["chargeId"], "ch_1");
/// ```
///
/// Cloning an engine forks its accumulated state: results of steps executed
/// before the clone are shared, execution after the clone diverges
/// independently.
#[derive(Clone)]
pub struct TestEngine {
    function: Arc<DurableFunction>,
    engine: ExecutionEngine,
    mocks: HashMap<String, StepMock>,
    entries: Vec<StepStateEntry>,
    events: Vec<Event>,
    run_id: String,
    attempts: u32,
}

impl TestEngine {
    /// Engine for the given function with no mocks and no events.
    pub fn new(function: DurableFunction) -> Self {
        Self {
            function: Arc::new(function),
            engine: ExecutionEngine::new(),
            mocks: HashMap::new(),
            entries: Vec::new(),
            events: Vec::new(),
            run_id: "test-run".to_string(),
            attempts: 0,
        }
    }

    /// Engine with an initial set of mocks.
    pub fn with_mocks(function: DurableFunction, mocks: Vec<StepMock>) -> Self {
        let mut engine = Self::new(function);
        for mock in mocks {
            engine.mocks.insert(mock.id.clone(), mock);
        }
        engine
    }

    /// Sets the triggering events for subsequent executions.
    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    /// Uses a configured replay engine (e.g. one carrying middleware).
    pub fn with_engine(mut self, engine: ExecutionEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Registers a mock handler for a named step.
    pub fn mock_step(
        mut self,
        id: impl Into<String>,
        handler: impl Fn(Value) -> StepResult<Value> + Send + Sync + 'static,
    ) -> Self {
        let mock = StepMock::new(id, handler);
        self.mocks.insert(mock.id.clone(), mock);
        self
    }

    /// Every executed step's outcome so far, keyed by human-readable id.
    pub fn state(&self) -> HashMap<String, StepOutcome> {
        self.entries
            .iter()
            .map(|entry| (entry.human_id.clone(), entry.outcome()))
            .collect()
    }

    /// Drives the run to completion, resolving each discovered op through
    /// its mock or its real body.
    ///
    /// Each step executes exactly once across however many attempts the
    /// replay engine needs; mock handlers fire only when their step is
    /// actually reached.
    pub async fn execute(&mut self) -> Result<TestRunResult> {
        for _ in 0..MAX_ATTEMPTS {
            let result = self.attempt(None).await?;
            match result {
                ExecutionResult::Resolved { data } => {
                    return Ok(TestRunResult {
                        result: Some(data),
                        error: None,
                        state: self.state(),
                    });
                }
                ExecutionResult::Rejected { error } => {
                    return Ok(TestRunResult {
                        result: None,
                        error: Some(error),
                        state: self.state(),
                    });
                }
                ExecutionResult::StepsFound { ops } => {
                    for op in ops {
                        self.resolve_op(op).await?;
                    }
                }
                ExecutionResult::StepRan { step, .. } => {
                    return Err(HarnessError::UnexpectedStepRan(step.display_name));
                }
            }
        }
        Err(HarnessError::AttemptLimit(MAX_ATTEMPTS))
    }

    /// Runs attempts until the named step's op appears, resolves only that
    /// op and returns its outcome without finishing the run.
    ///
    /// Earlier waves are resolved along the way; use this to build up
    /// partial state before [`clone`](Clone::clone).
    pub async fn execute_step(&mut self, id: &str) -> Result<StepOutcome> {
        if let Some(entry) = self.entries.iter().find(|entry| entry.human_id == id) {
            return Ok(entry.outcome());
        }

        for _ in 0..MAX_ATTEMPTS {
            let result = self.attempt(None).await?;
            match result {
                ExecutionResult::StepsFound { ops } => {
                    if let Some(op) = ops.iter().find(|op| op.display_name == id).cloned() {
                        self.resolve_op(op).await?;
                        return match self.entries.iter().find(|entry| entry.human_id == id) {
                            Some(entry) => Ok(entry.outcome()),
                            None => Err(HarnessError::StepNotExecuted(id.to_string())),
                        };
                    }
                    for op in ops {
                        self.resolve_op(op).await?;
                    }
                }
                ExecutionResult::Resolved { .. } | ExecutionResult::Rejected { .. } => {
                    return Err(HarnessError::StepNotFound(id.to_string()));
                }
                ExecutionResult::StepRan { step, .. } => {
                    return Err(HarnessError::UnexpectedStepRan(step.display_name));
                }
            }
        }
        Err(HarnessError::AttemptLimit(MAX_ATTEMPTS))
    }

    /// Runs one attempt against the accumulated state.
    async fn attempt(&mut self, target: Option<StepKey>) -> Result<ExecutionResult> {
        let attempt = self.attempts;
        self.attempts += 1;

        let mut input = AttemptInput::new(self.run_id.clone(), self.events.clone())
            .with_attempt(attempt)
            .with_state(MemoizedState::from_entries(self.entries.iter().cloned()));
        if let Some(target) = target {
            input = input.with_target_step(target);
        }

        Ok(self.engine.execute(self.function.body(), input).await?)
    }

    /// Resolves one discovered op into a state entry.
    async fn resolve_op(&mut self, op: Op) -> Result<()> {
        if self.entries.iter().any(|entry| entry.hashed_key == op.id) {
            return Ok(());
        }

        let mock = self.mocks.get(&op.display_name).cloned();
        let entry = if let Some(mock) = mock {
            debug!(step = %op.display_name, "resolving step with mock");
            match (mock.handler)(op.input()) {
                Ok(value) => StepStateEntry::completed(&op.display_name, op.kind, value),
                Err(failure) => StepStateEntry::failed(&op.display_name, op.kind, failure),
            }
        } else {
            match op.kind {
                OpKind::RunStep => {
                    let result = self.attempt(Some(op.id.clone())).await?;
                    match result {
                        ExecutionResult::StepRan { step, outcome } => match outcome {
                            StepOutcome::Data(value) => {
                                StepStateEntry::completed(&step.display_name, step.kind, value)
                            }
                            StepOutcome::Error(failure) => {
                                StepStateEntry::failed(&step.display_name, step.kind, failure)
                            }
                        },
                        _ => return Err(HarnessError::StepNotExecuted(op.display_name)),
                    }
                }
                OpKind::Sleep | OpKind::SendEvent => {
                    debug!(step = %op.display_name, kind = %op.kind, "skipping durable wait");
                    StepStateEntry::completed(&op.display_name, op.kind, Value::Null)
                }
                OpKind::WaitForEvent => {
                    debug!(step = %op.display_name, "wait has no mock; resolving as timed out");
                    StepStateEntry::completed(&op.display_name, op.kind, Value::Null)
                }
                OpKind::Invoke => {
                    warn!(step = %op.display_name, "invoke has no mock; resolving to null");
                    StepStateEntry::completed(&op.display_name, op.kind, Value::Null)
                }
            }
        };

        self.entries.push(entry);
        Ok(())
    }
}

impl fmt::Debug for TestEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestEngine")
            .field("function", &self.function.id())
            .field("mocks", &self.mocks.keys().collect::<Vec<_>>())
            .field("resolved_steps", &self.entries.len())
            .field("attempts", &self.attempts)
            .finish()
    }
}
