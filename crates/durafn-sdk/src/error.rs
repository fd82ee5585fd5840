// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK-specific error types.

use durafn_core::EngineError;
use thiserror::Error;

/// Errors that can occur in the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error (missing or invalid environment variable)
    #[error("configuration error: {0}")]
    Config(String),

    /// No function with the requested id is registered
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A function with the same id was registered twice
    #[error("function \"{0}\" is already registered")]
    DuplicateFunction(String),

    /// The transport delivered a request the SDK cannot interpret
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Fatal engine invariant violation
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Type alias for SDK results.
pub type Result<T> = std::result::Result<T, SdkError>;
