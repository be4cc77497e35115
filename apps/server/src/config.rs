//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to (0 = any free port).
    /// Override: `WALKIE_BIND_PORT`
    pub bind_port: u16,

    /// Origins allowed to call the API from a browser. Empty allows any.
    /// Override: `WALKIE_CORS_ORIGINS` (comma-separated)
    pub cors_origins: Vec<String>,

    /// Seat-race retries before a join gives up with a conflict.
    pub max_join_attempts: u32,

    /// Deadline for each storage call, in milliseconds.
    /// Override: `WALKIE_STORE_TIMEOUT_MS`
    pub store_timeout_ms: u64,

    /// Seconds between reaper sweeps.
    /// Override: `WALKIE_REAPER_INTERVAL`
    pub reaper_interval: u64,

    /// Seconds a room must sit untouched before its count may be repaired.
    pub reconcile_grace: u64,

    /// Maximum voice messages returned per listing.
    pub message_page_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = walkie_core::Config::default();
        Self {
            bind_port: core.preferred_port,
            cors_origins: core.cors_origins,
            max_join_attempts: core.max_join_attempts,
            store_timeout_ms: core.store_timeout_ms,
            reaper_interval: core.reaper_interval_secs,
            reconcile_grace: core.reconcile_grace_secs,
            message_page_limit: core.message_page_limit,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `WALKIE_*` overrides. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("WALKIE_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }

        if let Some(origins) = lookup("WALKIE_CORS_ORIGINS") {
            self.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(timeout) = lookup("WALKIE_STORE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.store_timeout_ms = timeout;
        }

        if let Some(interval) = lookup("WALKIE_REAPER_INTERVAL").and_then(|v| v.parse().ok()) {
            self.reaper_interval = interval;
        }

        // Note: WALKIE_LOG_LEVEL is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to walkie-core's Config type.
    pub fn to_core_config(&self) -> walkie_core::Config {
        walkie_core::Config {
            preferred_port: self.bind_port,
            cors_origins: self.cors_origins.clone(),
            max_join_attempts: self.max_join_attempts,
            store_timeout_ms: self.store_timeout_ms,
            reaper_interval_secs: self.reaper_interval,
            reconcile_grace_secs: self.reconcile_grace,
            message_page_limit: self.message_page_limit,
        }
    }
}
