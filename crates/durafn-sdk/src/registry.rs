// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Function registry.
//!
//! An explicit, owned registry of durable functions. It is constructed at
//! startup and passed by reference into the transport handler; there is no
//! process-wide mutable singleton.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SdkError};
use crate::function::DurableFunction;

/// Registry of the durable functions an app serves.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<DurableFunction>>,
}

impl FunctionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function under its id.
    ///
    /// Returns [`SdkError::DuplicateFunction`] if the id is already taken.
    pub fn register(&mut self, function: DurableFunction) -> Result<()> {
        let id = function.id().to_string();
        if self.functions.contains_key(&id) {
            return Err(SdkError::DuplicateFunction(id));
        }
        self.functions.insert(id, Arc::new(function));
        Ok(())
    }

    /// Looks up a function by id.
    pub fn get(&self, id: &str) -> Option<&Arc<DurableFunction>> {
        self.functions.get(id)
    }

    /// All registered ids, sorted for deterministic introspection.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
