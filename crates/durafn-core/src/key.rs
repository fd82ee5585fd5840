// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hashed step keys.
//!
//! A step key is the digest the orchestrator stores step results under. It
//! is recomputed from the human-readable identity on every attempt; the same
//! call sequence always yields the same key sequence.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ident::StepId;

/// Deterministic digest identifying a step across attempts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepKey(String);

impl StepKey {
    /// Computes the key for a human-readable step id.
    pub fn of(human_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(human_id.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wraps an already-computed key, e.g. one received from the transport.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Hex digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&StepId> for StepKey {
    fn from(id: &StepId) -> Self {
        Self::of(&id.human())
    }
}
