//! Deadline wrapper for storage calls.
//!
//! No service operation may block indefinitely on its storage collaborator.

use std::future::Future;
use std::time::Duration;

use crate::error::{WalkieError, WalkieResult};
use crate::store::{StoreError, StoreResult};

/// Awaits a storage call, converting expiry into `StorageUnavailable`.
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> WalkieResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(WalkieError::from),
        Err(_) => Err(WalkieError::from(StoreError::Timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let result: WalkieResult<()> = bounded(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(WalkieError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn store_error_is_converted() {
        let result: WalkieResult<()> = bounded(Duration::from_secs(1), async {
            Err(StoreError::Unavailable("connection refused".into()))
        })
        .await;

        assert!(matches!(result, Err(WalkieError::StorageUnavailable(msg)) if msg.contains("connection refused")));
    }
}
