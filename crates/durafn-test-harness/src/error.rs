// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Harness-specific error types.

use durafn_core::EngineError;
use thiserror::Error;

/// Errors that can occur while driving a function under test.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Fatal engine invariant violation inside the function under test
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// `execute_step` ran the function to completion without the named
    /// step ever being discovered
    #[error("step \"{0}\" was never discovered by the function")]
    StepNotFound(String),

    /// A targeted attempt ended without executing its target step
    #[error("step \"{0}\" did not execute during its targeted attempt")]
    StepNotExecuted(String),

    /// The engine reported a ran step outside a targeted attempt
    #[error("unexpected step-ran result for \"{0}\" outside a targeted attempt")]
    UnexpectedStepRan(String),

    /// The run never settled within the attempt budget
    #[error("attempt limit of {0} reached; the run never settled")]
    AttemptLimit(u32),
}

/// Type alias for harness results.
pub type Result<T> = std::result::Result<T, HarnessError>;
