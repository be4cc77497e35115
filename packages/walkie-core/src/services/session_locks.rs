//! Per-session request serialization.
//!
//! A session's own requests (`join`, `skip`, `leave`, `set_speaking`,
//! `disconnect`, recording a message) must never overlap. Each session id
//! maps to an async mutex that the owning request holds for its whole
//! duration.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{WalkieError, WalkieResult};

/// Keyed async mutexes, one per session id.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits up to `timeout` for exclusive access to `session_id`.
    ///
    /// Returns `Conflict` if another request for the same session holds the
    /// lock for longer than that.
    pub async fn acquire(
        &self,
        session_id: &str,
        timeout: Duration,
    ) -> WalkieResult<OwnedMutexGuard<()>> {
        // Clone under the shard lock so prune() never drops a mutex that is
        // about to be awaited.
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_default()
            .value()
            .clone();

        tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                WalkieError::Conflict(format!(
                    "another request for session {} is still in flight",
                    session_id
                ))
            })
    }

    /// Drops lock entries nobody holds or waits on. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }

    /// Number of tracked session locks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
