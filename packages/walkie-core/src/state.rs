//! Core configuration types.
//!
//! [`Config`] holds every tunable knob of the matchmaking engine. The
//! standalone server builds one from YAML, environment and CLI overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the Walkie core.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    // Server
    /// Port for the HTTP server (0 = let the OS pick).
    pub preferred_port: u16,

    /// Origins allowed by CORS. Empty means any origin.
    pub cors_origins: Vec<String>,

    // Matchmaking
    /// How many times room selection rescans after losing seat races before
    /// giving up with a conflict.
    pub max_join_attempts: u32,

    /// Upper bound for a single storage call or session lock wait (milliseconds).
    pub store_timeout_ms: u64,

    // Maintenance
    /// Interval between reaper sweeps (seconds).
    pub reaper_interval_secs: u64,

    /// Minimum age of a room's last update before the reaper may repair its
    /// count (seconds). Keeps repairs away from joins still in flight.
    pub reconcile_grace_secs: u64,

    // Messages
    /// Maximum number of voice messages returned per listing.
    pub message_page_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 2022,
            cors_origins: Vec::new(),
            max_join_attempts: 8,
            store_timeout_ms: 2000,
            reaper_interval_secs: 30,
            reconcile_grace_secs: 10,
            message_page_limit: 100,
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_join_attempts == 0 {
            return Err("max_join_attempts must be >= 1".to_string());
        }
        if self.store_timeout_ms == 0 {
            return Err("store_timeout_ms must be >= 1".to_string());
        }
        if self.reaper_interval_secs == 0 {
            return Err(
                "reaper_interval_secs must be >= 1 (tokio::time::interval panics on 0)".to_string(),
            );
        }
        // A seat reserved by an in-flight join is assigned within a few
        // storage calls; repairs must not run inside that window.
        if self.reconcile_grace_secs.saturating_mul(1000) < self.store_timeout_ms.saturating_mul(3) {
            return Err(format!(
                "reconcile_grace_secs ({}s) must cover three store timeouts ({}ms)",
                self.reconcile_grace_secs, self.store_timeout_ms
            ));
        }
        if self.message_page_limit == 0 {
            return Err("message_page_limit must be >= 1".to_string());
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn reconcile_grace(&self) -> Duration {
        Duration::from_secs(self.reconcile_grace_secs)
    }
}
