// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The step future: the execution interceptor.
//!
//! Every step call resolves through this future. On first poll it consults
//! the memoization store:
//!
//! - memoized with data: resolves immediately with the recorded output; the
//!   step body never runs again;
//! - memoized with an error: re-raises the recorded failure at the call
//!   site, preserving catch semantics for user code;
//! - not memoized and targeted by this attempt: executes the real body and
//!   records the outcome for the driver to report as `step-ran`;
//! - not memoized otherwise: registers a pending op and parks forever.
//!
//! Parking (returning `Pending` with no wake-up scheduled) is the
//! cooperative suspend signal: the awaiting branch halts while sibling
//! branches of a fan-out keep running within the same poll, so every op of
//! the wave is discovered before the attempt ends. The driver recognizes
//! the parked state structurally; no unwinding is involved.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::context::{BodyFuture, RunState, Thunk};
use crate::error::{EngineError, StepFailure, StepResult};
use crate::middleware::StepInfo;
use crate::op::Op;
use crate::result::StepOutcome;

enum Phase {
    /// Not yet polled: memoization lookup still pending.
    Init,
    /// Targeted step body executing.
    Running,
    /// Suspended for the rest of the attempt.
    Parked,
}

/// Future returned by every step call on [`Context`](crate::Context).
///
/// Resolves with the step's typed output, or with the step's recorded
/// failure. A step that is neither memoized nor targeted never resolves
/// within the current attempt.
pub struct StepFuture<T> {
    state: Arc<RunState>,
    info: StepInfo,
    opts: Option<Value>,
    thunk: Option<Thunk>,
    running: Option<BodyFuture>,
    early_failure: Option<StepFailure>,
    phase: Phase,
    _out: PhantomData<fn() -> T>,
}

impl<T> StepFuture<T> {
    pub(crate) fn new(
        state: Arc<RunState>,
        info: StepInfo,
        opts: Option<Value>,
        thunk: Option<Thunk>,
        early_failure: Option<StepFailure>,
    ) -> Self {
        Self {
            state,
            info,
            opts,
            thunk,
            running: None,
            early_failure,
            phase: Phase::Init,
            _out: PhantomData,
        }
    }

    fn op(&self) -> Op {
        let mut op = Op::new(
            self.info.key.clone(),
            self.info.kind,
            self.info.id.human(),
        );
        if let Some(opts) = &self.opts {
            op = op.with_opts(opts.clone());
        }
        op
    }
}

impl<T> Future for StepFuture<T>
where
    T: DeserializeOwned,
{
    type Output = StepResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let state = this.state.clone();

        loop {
            match this.phase {
                Phase::Init => {
                    if let Some(failure) = this.early_failure.take() {
                        this.phase = Phase::Parked;
                        return Poll::Ready(Err(failure));
                    }

                    state.middleware.before_memoization(&this.info);
                    let memoized = state.memo.lookup(&this.info.key).cloned();
                    state
                        .middleware
                        .after_memoization(&this.info, memoized.is_some());

                    if let Some(entry) = memoized {
                        if let Some(kind) = entry.kind {
                            if kind != this.info.kind {
                                let mut inner =
                                    state.inner.lock().expect("run state lock poisoned");
                                if inner.fatal.is_none() {
                                    inner.fatal = Some(EngineError::NonDeterministic(format!(
                                        "step \"{}\" was recorded as {} but is now called as {}",
                                        this.info.id, kind, this.info.kind,
                                    )));
                                }
                                this.phase = Phase::Parked;
                                return Poll::Pending;
                            }
                        }
                        this.phase = Phase::Parked;
                        if let Some(failure) = entry.error {
                            return Poll::Ready(Err(failure));
                        }
                        let data = entry.data.unwrap_or(Value::Null);
                        return Poll::Ready(
                            serde_json::from_value(data).map_err(StepFailure::from),
                        );
                    }

                    if state.target.as_ref() == Some(&this.info.key) {
                        {
                            let mut inner = state.inner.lock().expect("run state lock poisoned");
                            inner.executing_target = true;
                        }
                        state.middleware.on_step_start(&this.info);
                        let body: BodyFuture = match this.thunk.take() {
                            Some(thunk) => thunk(),
                            // Sleeps, waits and sends have no body; running
                            // them client-side is a no-op.
                            None => Box::pin(async { Ok(Value::Null) }),
                        };
                        this.running = Some(body);
                        this.phase = Phase::Running;
                        continue;
                    }

                    let op = this.op();
                    debug!(step = %this.info.id, kind = %this.info.kind, "discovered new step");
                    let mut inner = state.inner.lock().expect("run state lock poisoned");
                    inner.ops.push(op);
                    drop(inner);
                    this.phase = Phase::Parked;
                    return Poll::Pending;
                }

                Phase::Running => {
                    let body = this
                        .running
                        .as_mut()
                        .expect("running phase without a body future");
                    match body.as_mut().poll(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(result) => {
                            let outcome = match result {
                                Ok(value) => {
                                    let outcome = StepOutcome::Data(value);
                                    state.middleware.on_step_complete(&this.info, &outcome);
                                    outcome
                                }
                                Err(failure) => {
                                    state.middleware.on_step_error(&this.info, &failure);
                                    StepOutcome::Error(failure)
                                }
                            };
                            let op = this.op();
                            let mut inner = state.inner.lock().expect("run state lock poisoned");
                            inner.executing_target = false;
                            inner.ran_step = Some((op, outcome));
                            drop(inner);
                            // The attempt ends with `step-ran`; user code
                            // past this await resumes on a later attempt,
                            // from the memoized entry.
                            this.phase = Phase::Parked;
                            return Poll::Pending;
                        }
                    }
                }

                Phase::Parked => return Poll::Pending,
            }
        }
    }
}
