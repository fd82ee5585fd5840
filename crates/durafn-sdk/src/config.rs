// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK configuration.

use std::env;

use crate::error::{Result, SdkError};

/// SDK configuration for an app serving durable functions.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// App id (required) - scopes function ids reported to the orchestrator
    pub app_id: String,
    /// Deployment environment label, e.g. "production" (default: none)
    pub env: Option<String>,
    /// Path the app serves the durafn endpoint under (default: "/api/durafn")
    pub serve_path: String,
}

impl SdkConfig {
    /// Create a new configuration with the given app id.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            env: None,
            serve_path: "/api/durafn".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Required Environment Variables
    /// - `DURAFN_APP_ID` - App id scoping this app's functions
    ///
    /// # Optional Environment Variables
    /// - `DURAFN_ENV` - Deployment environment label
    /// - `DURAFN_SERVE_PATH` - Serve path (default: "/api/durafn")
    pub fn from_env() -> Result<Self> {
        let app_id = env::var("DURAFN_APP_ID")
            .map_err(|_| SdkError::Config("DURAFN_APP_ID is required".to_string()))?;

        let env_label = env::var("DURAFN_ENV").ok();

        let serve_path =
            env::var("DURAFN_SERVE_PATH").unwrap_or_else(|_| "/api/durafn".to_string());

        Ok(Self {
            app_id,
            env: env_label,
            serve_path,
        })
    }

    /// Set the deployment environment label.
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    /// Set the serve path.
    pub fn with_serve_path(mut self, path: impl Into<String>) -> Self {
        self.serve_path = path.into();
        self
    }
}
