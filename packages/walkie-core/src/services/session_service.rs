//! Session registration.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::bounded::bounded;
use crate::error::{WalkieError, WalkieResult};
use crate::events::{EventEmitter, SessionEvent};
use crate::model::Session;
use crate::store::SessionStore;
use crate::utils::{new_session_id, now_millis};

/// Mints and looks up anonymous sessions.
pub struct SessionService {
    sessions: Arc<dyn SessionStore>,
    emitter: Arc<dyn EventEmitter>,
    store_timeout: Duration,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        emitter: Arc<dyn EventEmitter>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            emitter,
            store_timeout,
        }
    }

    /// Registers a new connected session with no room.
    pub async fn create_session(&self) -> WalkieResult<Session> {
        let session = Session::new(new_session_id(), Utc::now());
        let session = bounded(self.store_timeout, self.sessions.insert_session(session)).await?;

        log::info!("[Sessions] Created session {}", session.id);
        self.emitter.emit_session(SessionEvent::Created {
            session_id: session.id.clone(),
            timestamp: now_millis(),
        });
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> WalkieResult<Session> {
        bounded(self.store_timeout, self.sessions.get_session(session_id))
            .await?
            .ok_or_else(|| WalkieError::NotFound(format!("session {}", session_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::Harness;

    #[tokio::test]
    async fn created_session_is_connected_and_unassigned() {
        let h = Harness::new();
        let session = h.sessions.create_session().await.unwrap();

        assert!(session.connected);
        assert!(!session.speaking);
        assert!(session.room_id.is_none());
        assert_eq!(h.sessions.get_session(&session.id).await.unwrap(), session);
        assert_eq!(h.emitter.session_events().len(), 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let h = Harness::new();
        let err = h.sessions.get_session("ghost").await.unwrap_err();
        assert!(matches!(err, WalkieError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_fails_when_store_is_down() {
        let h = Harness::new();
        h.store.fail_session_writes(true);
        let err = h.sessions.create_session().await.unwrap_err();
        assert!(matches!(err, WalkieError::StorageUnavailable(_)));
    }
}
