// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine error types.
//!
//! Two error channels exist and must not be conflated:
//!
//! - [`StepFailure`] is the business error that flows through user code. A
//!   memoized failed step re-raises its `StepFailure` at the call site, user
//!   code may catch it, and an uncaught one ends the attempt as
//!   `function-rejected`. The orchestrator may retry these.
//! - [`EngineError`] is a fatal invariant violation (non-deterministic user
//!   code, key collisions). It aborts the attempt, cannot be caught by user
//!   code, and must not be retried: a fresh attempt would reproduce the same
//!   divergence.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal engine invariant violations.
///
/// These signal a programming defect in the durable function, not a
/// transient failure. Transports should report them as non-retriable.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The function diverged from the recorded history, e.g. a step call
    /// whose kind no longer matches its state entry, or an await on a
    /// future outside the engine's control.
    #[error("non-deterministic execution: {0}")]
    NonDeterministic(String),

    /// Two step invocations produced the same hashed key within one run.
    #[error("step key collision for \"{0}\"")]
    KeyCollision(String),
}

/// Type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Serializable failure record for a step or function body.
///
/// This is the shape errors take on the wire: the orchestrator stores it in
/// the step state entry of a failed step and hands it back verbatim on later
/// attempts, where the engine re-raises it at the original call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailure {
    /// Error class, e.g. `"Error"` or `"PaymentDeclinedError"`.
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
    /// Optional backtrace or location hint captured where the error arose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl StepFailure {
    /// Creates a failure with the given type and message.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Creates a generic `"Error"` failure from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    /// Creates a failure from any std error, preserving its display form.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new("Error", err.to_string())
    }

    /// Attaches a stack/location hint.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

impl std::error::Error for StepFailure {}

impl From<serde_json::Error> for StepFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::new("SerializationError", err.to_string())
    }
}

/// Result alias for values flowing through user step code.
pub type StepResult<T> = std::result::Result<T, StepFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failure_display() {
        let failure = StepFailure::new("PaymentError", "card declined");
        assert_eq!(failure.to_string(), "PaymentError: card declined");
    }

    #[test]
    fn test_step_failure_serde_omits_empty_stack() {
        let failure = StepFailure::msg("boom");
        let json = serde_json::to_string(&failure).unwrap();
        assert!(!json.contains("stack"));

        let with_stack = failure.with_stack("at step 3");
        let json = serde_json::to_string(&with_stack).unwrap();
        assert!(json.contains("\"stack\":\"at step 3\""));
    }

    #[test]
    fn test_step_failure_from_serde_error() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let failure = StepFailure::from(err);
        assert_eq!(failure.error_type, "SerializationError");
    }
}
