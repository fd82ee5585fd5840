// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durafn SDK - Define durable functions and serve them to an orchestrator.
//!
//! This crate is the user-facing layer over [`durafn_core`]: define
//! functions composed of memoized steps, register them in an explicit
//! [`FunctionRegistry`], and hand orchestrator requests to a
//! [`CommHandler`] that drives the replay engine and maps results onto the
//! wire contract.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use durafn_sdk::{CommHandler, DurableFunction, FunctionRegistry, SdkConfig, Trigger};
//!
//! let import_orders = DurableFunction::new("import-orders", |ctx| async move {
//!     let orders: Vec<String> = ctx
//!         .run("fetch-orders", || async { fetch_orders().await })
//!         .await?;
//!     let mut imported = 0usize;
//!     for order in orders {
//!         imported += ctx
//!             .run_with("import-order", order, |o| async move { import(o).await })
//!             .await?;
//!     }
//!     Ok(imported)
//! })
//! .with_trigger(Trigger::event("shop/orders.requested"));
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register(import_orders)?;
//!
//! let config = SdkConfig::from_env()?;
//! let handler = CommHandler::new(config, Arc::new(registry));
//! // A framework adapter decodes HTTP requests into `RunRequest`s and
//! // feeds them to `handler.handle(..)`.
//! ```
//!
//! # Replay model
//!
//! The orchestrator invokes the app once per attempt. Each attempt re-runs
//! the whole function body; completed steps short-circuit to their recorded
//! results and the first wave of unknown steps is reported back as pending
//! ops (`206`). The function resolves (`200`) once an attempt runs to the
//! end with every step memoized. See [`durafn_core`] for the engine
//! contract and determinism rules.

mod config;
mod error;
mod function;
mod handler;
mod registry;

// Main types
pub use config::SdkConfig;
pub use error::{Result, SdkError};
pub use function::{DurableFunction, Trigger};
pub use handler::{CommHandler, RunRequest, RunResponse, TransportAdapter, serve};
pub use registry::FunctionRegistry;

// Re-export the engine surface functions are written against.
pub use durafn_core::{
    Context, EngineError, Event, ExecutionEngine, ExecutionResult, InputPatch, LogMiddleware,
    Middleware, MiddlewareStack, Op, OpKind, OutputPatch, StepFailure, StepInfo, StepKey,
    StepOutcome, StepResult, StepStateEntry,
};
