// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-run execution context and the step call surface.
//!
//! The [`Context`] is the interface a durable function body uses to issue
//! step calls. Every call allocates its identity synchronously, before any
//! asynchronous yield, then returns a [`StepFuture`] that consults the
//! memoization store on first poll. See the crate docs for the replay model.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{EngineError, StepFailure, StepResult};
use crate::event::Event;
use crate::future::StepFuture;
use crate::ident::StepIdAllocator;
use crate::key::StepKey;
use crate::state::MemoizedState;
use crate::middleware::{MiddlewareStack, StepInfo};
use crate::op::{Op, OpKind};
use crate::result::StepOutcome;

/// Boxed future produced by a function body or step thunk.
pub type BodyFuture = BoxFuture<'static, StepResult<Value>>;

/// Erased durable function body, invoked once per attempt.
pub type FunctionBody = Arc<dyn Fn(Context) -> BodyFuture + Send + Sync>;

/// Erased step thunk, invoked only when the engine decides the step's side
/// effect should actually run.
pub(crate) type Thunk = Box<dyn FnOnce() -> BodyFuture + Send>;

/// Wraps a typed async closure into an erased [`FunctionBody`].
pub fn body_fn<F, Fut, T>(f: F) -> FunctionBody
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepResult<T>> + Send + 'static,
    T: Serialize,
{
    Arc::new(move |ctx| -> BodyFuture {
        let fut = f(ctx);
        Box::pin(async move {
            let value = fut.await?;
            serde_json::to_value(value).map_err(StepFailure::from)
        })
    })
}

/// Shared state of one attempt, visible to every step future spawned from
/// its context.
pub(crate) struct RunState {
    pub(crate) run_id: String,
    pub(crate) attempt: u32,
    pub(crate) events: Vec<Event>,
    pub(crate) memo: MemoizedState,
    pub(crate) target: Option<StepKey>,
    pub(crate) middleware: MiddlewareStack,
    pub(crate) inner: Mutex<RunStateInner>,
}

#[derive(Default)]
pub(crate) struct RunStateInner {
    pub(crate) allocator: StepIdAllocator,
    pub(crate) seen: HashSet<StepKey>,
    pub(crate) ops: Vec<Op>,
    pub(crate) executing_target: bool,
    pub(crate) ran_step: Option<(Op, StepOutcome)>,
    pub(crate) fatal: Option<EngineError>,
}

/// Handle a durable function body uses to issue step calls.
///
/// Cheap to clone; all clones share the attempt's run state.
///
/// # Example
///
/// ```ignore
/// async fn handler(ctx: Context) -> StepResult<Order> {
///     let order: Order = ctx.run("load-order", || async { load().await }).await?;
///     ctx.sleep("cool-off", Duration::from_secs(60)).await?;
///     let receipt: Receipt = ctx
///         .run_with("charge-card", order.total, |total| async move {
///             charge(total).await
///         })
///         .await?;
///     Ok(order.with_receipt(receipt))
/// }
/// ```
#[derive(Clone)]
pub struct Context {
    pub(crate) state: Arc<RunState>,
}

impl Context {
    /// Orchestrator-assigned id of this run.
    pub fn run_id(&self) -> &str {
        &self.state.run_id
    }

    /// Zero-based attempt number of this invocation.
    pub fn attempt(&self) -> u32 {
        self.state.attempt
    }

    /// All triggering events for this run.
    pub fn events(&self) -> &[Event] {
        &self.state.events
    }

    /// The first triggering event, if the run was event-triggered.
    pub fn event(&self) -> Option<&Event> {
        self.state.events.first()
    }

    /// Runs a unit of user code as a memoized step.
    ///
    /// If the step already completed on an earlier attempt its recorded
    /// output is returned (or its recorded failure re-raised) and `f` is
    /// never invoked. Otherwise the step is reported as a pending op and
    /// the awaiting branch halts for the rest of the attempt.
    ///
    /// An empty `id` derives a deterministic positional name.
    pub fn run<T, F, Fut>(&self, id: &str, f: F) -> StepFuture<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = StepResult<T>> + Send + 'static,
    {
        let thunk: Thunk = Box::new(move || -> BodyFuture {
            Box::pin(async move {
                let value = f().await?;
                serde_json::to_value(value).map_err(StepFailure::from)
            })
        });
        self.make_step(id, OpKind::RunStep, None, Some(thunk), None)
    }

    /// Like [`run`](Self::run), but records `input` alongside the op and
    /// passes it to the step body.
    ///
    /// The recorded input is what mock handlers receive in the test
    /// harness, so steps taking input through this method (rather than
    /// closure capture) stay mockable argument-for-argument.
    pub fn run_with<I, T, F, Fut>(&self, id: &str, input: I, f: F) -> StepFuture<T>
    where
        I: Serialize + Send + 'static,
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(I) -> Fut + Send + 'static,
        Fut: Future<Output = StepResult<T>> + Send + 'static,
    {
        let (opts, early_failure) = match serde_json::to_value(&input) {
            Ok(value) => (Some(json!({ "input": value })), None),
            Err(err) => (None, Some(StepFailure::from(err))),
        };
        let thunk: Thunk = Box::new(move || -> BodyFuture {
            Box::pin(async move {
                let value = f(input).await?;
                serde_json::to_value(value).map_err(StepFailure::from)
            })
        });
        self.make_step(id, OpKind::RunStep, opts, Some(thunk), early_failure)
    }

    /// Durable sleep. The orchestrator re-invokes the run once `duration`
    /// has elapsed; no process stays alive in between.
    pub fn sleep(&self, id: &str, duration: Duration) -> StepFuture<()> {
        let opts = json!({ "durationMs": duration.as_millis() as u64 });
        self.make_step(id, OpKind::Sleep, Some(opts), None, None)
    }

    /// Waits for an event named `event` to arrive, up to `timeout`.
    ///
    /// Resolves with the matching event, or `None` on timeout.
    pub fn wait_for_event(
        &self,
        id: &str,
        event: &str,
        timeout: Duration,
    ) -> StepFuture<Option<Event>> {
        let opts = json!({
            "event": event,
            "timeoutMs": timeout.as_millis() as u64,
        });
        self.make_step(id, OpKind::WaitForEvent, Some(opts), None, None)
    }

    /// Publishes events through the orchestrator, durably.
    pub fn send_event(&self, id: &str, events: Vec<Event>) -> StepFuture<()> {
        let (opts, early_failure) = match serde_json::to_value(&events) {
            Ok(value) => (Some(json!({ "events": value })), None),
            Err(err) => (None, Some(StepFailure::from(err))),
        };
        self.make_step(id, OpKind::SendEvent, opts, None, early_failure)
    }

    /// Invokes another durable function and resolves with its output.
    pub fn invoke(&self, id: &str, function_id: &str, payload: Value) -> StepFuture<Value> {
        let opts = json!({
            "functionId": function_id,
            "payload": payload,
        });
        self.make_step(id, OpKind::Invoke, Some(opts), None, None)
    }

    /// Allocates the step identity (synchronously, in call order) and
    /// builds the future that the interceptor drives on poll.
    fn make_step<T>(
        &self,
        base: &str,
        kind: OpKind,
        opts: Option<Value>,
        thunk: Option<Thunk>,
        early_failure: Option<StepFailure>,
    ) -> StepFuture<T> {
        let mut inner = self.state.inner.lock().expect("run state lock poisoned");
        let id = inner.allocator.allocate(base);
        let key = StepKey::from(&id);
        if !inner.seen.insert(key.clone()) && inner.fatal.is_none() {
            inner.fatal = Some(EngineError::KeyCollision(id.human()));
        }
        drop(inner);

        let info = StepInfo { id, key, kind };
        StepFuture::new(self.state.clone(), info, opts, thunk, early_failure)
    }
}
