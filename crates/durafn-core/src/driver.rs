// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Replay driver: runs one attempt of a durable function.
//!
//! An attempt re-executes the whole function body from the top. Step calls
//! route through the interceptor ([`StepFuture`](crate::StepFuture)):
//! memoized calls short-circuit, new ones register ops and park. The driver
//! wraps the body in an [`AttemptFuture`] and derives the attempt's terminal
//! result from what the run state accumulated by the time the body either
//! finished or stalled.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};

use tracing::debug;

use crate::context::{BodyFuture, Context, FunctionBody, RunState};
use crate::error::{EngineError, Result};
use crate::event::Event;
use crate::key::StepKey;
use crate::middleware::MiddlewareStack;
use crate::result::{ExecutionResult, StepOutcome};
use crate::state::MemoizedState;

/// Everything the transport hands the engine for one attempt.
#[derive(Debug, Default)]
pub struct AttemptInput {
    /// Orchestrator-assigned run id.
    pub run_id: String,
    /// Zero-based attempt number.
    pub attempt: u32,
    /// Triggering events, re-delivered on every attempt.
    pub events: Vec<Event>,
    /// Accumulated step results.
    pub state: MemoizedState,
    /// Step the orchestrator asked this attempt to execute, if any.
    pub target_step: Option<StepKey>,
}

impl AttemptInput {
    /// Input for a fresh attempt with no memoized state.
    pub fn new(run_id: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            run_id: run_id.into(),
            events,
            ..Self::default()
        }
    }

    /// Sets the attempt number.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Sets the memoized step state.
    pub fn with_state(mut self, state: MemoizedState) -> Self {
        self.state = state;
        self
    }

    /// Targets a specific step for execution.
    pub fn with_target_step(mut self, target: StepKey) -> Self {
        self.target_step = Some(target);
        self
    }
}

/// Drives attempts of durable function bodies.
///
/// Stateless between attempts apart from its middleware chain; all run
/// state lives in the [`AttemptInput`] and dies with the attempt.
#[derive(Clone, Default)]
pub struct ExecutionEngine {
    middleware: MiddlewareStack,
}

impl ExecutionEngine {
    /// Engine with no middleware.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with the given middleware chain.
    pub fn with_middleware(middleware: MiddlewareStack) -> Self {
        Self { middleware }
    }

    /// The configured middleware chain.
    pub fn middleware(&self) -> &MiddlewareStack {
        &self.middleware
    }

    /// Runs one attempt of `body` and returns its terminal result.
    ///
    /// Business failures come back as `Ok(ExecutionResult::Rejected { .. })`
    /// and are retriable by the orchestrator. An `Err(_)` is a fatal
    /// invariant violation (non-determinism, key collision) and must not be
    /// retried.
    pub async fn execute(&self, body: &FunctionBody, input: AttemptInput) -> Result<ExecutionResult> {
        let events = self.middleware.apply_input(input.events);

        let state = Arc::new(RunState {
            run_id: input.run_id,
            attempt: input.attempt,
            events,
            memo: input.state,
            target: input.target_step,
            middleware: self.middleware.clone(),
            inner: Mutex::new(Default::default()),
        });

        self.middleware.before_execution(&state.run_id, state.attempt);

        let ctx = Context {
            state: state.clone(),
        };
        let attempt = AttemptFuture {
            body: body(ctx),
            state: state.clone(),
        };
        let result = attempt.await.map(|result| self.finish(result));

        self.middleware.after_execution(&state.run_id);
        result
    }

    /// Applies output transforms and fires run-completion hooks.
    fn finish(&self, result: ExecutionResult) -> ExecutionResult {
        match result {
            ExecutionResult::Resolved { data } => {
                let data = self.middleware.apply_output(data);
                let result = ExecutionResult::Resolved { data };
                self.middleware.on_run_complete(&result);
                result
            }
            ExecutionResult::Rejected { error } => {
                self.middleware.on_run_error(&error);
                ExecutionResult::Rejected { error }
            }
            ExecutionResult::StepRan { step, outcome } => {
                let outcome = match outcome {
                    StepOutcome::Data(data) => {
                        StepOutcome::Data(self.middleware.apply_output(data))
                    }
                    error => error,
                };
                ExecutionResult::StepRan { step, outcome }
            }
            ExecutionResult::StepsFound { ops } => {
                debug!(count = ops.len(), "reporting discovered steps");
                ExecutionResult::StepsFound { ops }
            }
        }
    }
}

/// Wraps the user future and interprets what the run state accumulated.
struct AttemptFuture {
    body: BodyFuture,
    state: Arc<RunState>,
}

impl Future for AttemptFuture {
    type Output = Result<ExecutionResult>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let polled = this.body.as_mut().poll(cx);

        let mut inner = this.state.inner.lock().expect("run state lock poisoned");

        if let Some(fatal) = inner.fatal.take() {
            return Poll::Ready(Err(fatal));
        }

        // A ran step outranks everything else: its side effect has already
        // happened and the orchestrator must learn its outcome.
        if let Some((step, outcome)) = inner.ran_step.take() {
            return Poll::Ready(Ok(ExecutionResult::StepRan { step, outcome }));
        }

        match polled {
            Poll::Ready(Ok(data)) => Poll::Ready(Ok(ExecutionResult::Resolved { data })),
            Poll::Ready(Err(error)) => Poll::Ready(Ok(ExecutionResult::Rejected { error })),
            Poll::Pending => {
                if inner.executing_target {
                    // The targeted step body is doing real work; its waker
                    // will resume us.
                    return Poll::Pending;
                }
                if !inner.ops.is_empty() {
                    let ops = std::mem::take(&mut inner.ops);
                    return Poll::Ready(Ok(ExecutionResult::StepsFound { ops }));
                }
                Poll::Ready(Err(EngineError::NonDeterministic(
                    "function is blocked on a future the step engine does not control; \
                     wrap side effects in a step and use durable sleep instead of runtime timers"
                        .into(),
                )))
            }
        }
    }
}
