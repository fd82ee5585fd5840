// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Terminal result of one attempt.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StepFailure, StepResult};
use crate::op::Op;

/// Outcome of an executed step: its serialized output or its failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    /// The step completed and produced this value.
    Data(Value),
    /// The step failed.
    Error(StepFailure),
}

impl StepOutcome {
    /// The produced value, if the step completed.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    /// The failure, if the step failed.
    pub fn error(&self) -> Option<&StepFailure> {
        match self {
            Self::Data(_) => None,
            Self::Error(failure) => Some(failure),
        }
    }

    /// True if the step failed.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<StepResult<Value>> for StepOutcome {
    fn from(result: StepResult<Value>) -> Self {
        match result {
            Ok(value) => Self::Data(value),
            Err(failure) => Self::Error(failure),
        }
    }
}

/// Result of driving one attempt of the function body.
///
/// Terminal for the attempt and never mutated after production. The
/// transport serializes it onto the wire (`200` on resolve, `206` on
/// steps-found/step-ran, `500` on reject).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ExecutionResult {
    /// The function body returned normally with no pending ops.
    #[serde(rename = "function-resolved")]
    Resolved {
        /// Final function output.
        data: Value,
    },
    /// The function body raised an uncaught failure.
    #[serde(rename = "function-rejected")]
    Rejected {
        /// The uncaught failure.
        error: StepFailure,
    },
    /// One or more new ops were discovered; the attempt ended at the wave.
    #[serde(rename = "steps-found")]
    StepsFound {
        /// Every op discovered during this attempt, in registration order.
        ops: Vec<Op>,
    },
    /// The targeted step's body was executed during this attempt.
    #[serde(rename = "step-ran")]
    StepRan {
        /// The step that ran.
        step: Op,
        /// What it produced.
        outcome: StepOutcome,
    },
}

impl ExecutionResult {
    /// True for `function-resolved`.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// True for `function-rejected`.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// The final output, if resolved.
    pub fn output(&self) -> Option<&Value> {
        match self {
            Self::Resolved { data } => Some(data),
            _ => None,
        }
    }
}
