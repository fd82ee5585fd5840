// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Durafn test harness - deterministic, orchestrator-free testing for
//! durable functions.
//!
//! [`TestEngine`] drives a function the way the real orchestrator would,
//! entirely in-process: it loops attempts through the replay engine,
//! resolves every discovered op (mock handler or real step body) and feeds
//! the results back as memoized state until the run resolves or rejects.
//! Sleeps and event waits resolve immediately, so tests never wait on real
//! time.
//!
//! # Example
//!
//! ```ignore
//! use durafn_sdk::{DurableFunction, Event};
//! use durafn_test_harness::TestEngine;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_checkout() {
//!     let mut engine = TestEngine::new(checkout())
//!         .with_events(vec![Event::new("shop/checkout.requested")])
//!         .mock_step("charge-card", |_input| Ok(json!("ch_123")));
//!
//!     let run = engine.execute().await.unwrap();
//!
//!     assert!(run.is_resolved());
//!     assert_eq!(run.step_data("charge-card"), Some(&json!("ch_123")));
//! }
//! ```
//!
//! Partial execution and forking are supported for divergent-path tests:
//! run individual steps with [`TestEngine::execute_step`], `clone()` the
//! engine, and drive the original and the clone to different completions -
//! results taken before the fork stay shared, later ones do not.

mod engine;
mod error;

pub use engine::{StepMock, TestEngine, TestRunResult};
pub use error::{HarnessError, Result};

// Re-export what tests usually need alongside the harness.
pub use durafn_core::{Event, StepFailure, StepOutcome, StepResult};
pub use durafn_sdk::{DurableFunction, Trigger};
