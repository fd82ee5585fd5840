// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! durafn-core - Step replay and memoization engine for durable functions.
//!
//! A durable function is ordinary async code composed of discrete steps. An
//! external orchestrator drives it across many independent, stateless
//! invocations: on every invocation the whole body re-executes from the
//! top, steps whose output is already recorded short-circuit to their
//! memoized result, and the first wave of steps whose output is *not* known
//! interrupts execution and is reported back as pending ops. The
//! orchestrator runs those ops, records their results, and re-invokes the
//! function until it resolves.
//!
//! This crate is the engine for one such invocation (an "attempt"):
//!
//! - [`StepIdAllocator`] assigns stable human-readable identities in call
//!   order, disambiguating repeated names (`my-step`, `my-step:1`, ...).
//! - [`StepKey`] derives the deterministic digest results are stored under.
//! - [`MemoizedState`] answers "do we already have this step's result?"
//!   from the orchestrator-supplied, read-only step state.
//! - [`StepFuture`] intercepts each step call: memoized calls resolve (or
//!   re-raise their recorded failure) without re-running side effects; new
//!   calls register an [`Op`] and suspend cooperatively.
//! - [`ExecutionEngine`] drives the attempt and produces its terminal
//!   [`ExecutionResult`].
//! - [`Middleware`] hooks fire around every phase without the engine
//!   interpreting them.
//!
//! # Example
//!
//! ```ignore
//! use durafn_core::{AttemptInput, Event, ExecutionEngine, body_fn};
//!
//! let body = body_fn(|ctx| async move {
//!     let n: u32 = ctx.run("fetch", || async { Ok(41) }).await?;
//!     Ok(n + 1)
//! });
//!
//! let engine = ExecutionEngine::new();
//! let input = AttemptInput::new("run-1", vec![Event::new("demo/start")]);
//! // First attempt discovers the "fetch" op; once the orchestrator feeds
//! // its result back as state, the next attempt resolves with 42.
//! let result = engine.execute(&body, input).await?;
//! ```
//!
//! # Determinism
//!
//! The function body must make the same step calls in the same order on
//! every attempt. Branching on anything that varies between attempts
//! (random numbers, wall-clock time, unrecorded I/O) outside a step is a
//! defect; the engine surfaces detected divergence as the fatal, non-
//! retriable [`EngineError::NonDeterministic`].

mod context;
mod driver;
mod error;
mod event;
mod future;
mod ident;
mod key;
mod middleware;
mod op;
mod result;
mod state;

pub use context::{BodyFuture, Context, FunctionBody, body_fn};
pub use driver::{AttemptInput, ExecutionEngine};
pub use error::{EngineError, Result, StepFailure, StepResult};
pub use event::Event;
pub use future::StepFuture;
pub use ident::{StepId, StepIdAllocator};
pub use key::StepKey;
pub use middleware::{
    InputPatch, LogMiddleware, Middleware, MiddlewareStack, OutputPatch, StepInfo,
};
pub use op::{Op, OpKind};
pub use result::{ExecutionResult, StepOutcome};
pub use state::{MemoizedState, StepStateEntry};
