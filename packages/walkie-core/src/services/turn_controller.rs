//! Push-to-talk state and voice message records.
//!
//! "One speaker at a time" is a client convention. The speaking flag is
//! stored as given; only recording a message checks room state.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;

use super::bounded::bounded;
use super::session_locks::SessionLocks;
use crate::error::{WalkieError, WalkieResult};
use crate::events::{EventEmitter, SessionEvent};
use crate::model::{Session, VoiceMessage};
use crate::state::Config;
use crate::store::{RoomStore, SessionStore, VoiceMessageStore};
use crate::utils::{new_message_id, now_millis};

pub struct TurnController {
    sessions: Arc<dyn SessionStore>,
    rooms: Arc<dyn RoomStore>,
    messages: Arc<dyn VoiceMessageStore>,
    locks: Arc<SessionLocks>,
    emitter: Arc<dyn EventEmitter>,
    store_timeout: Duration,
    message_page_limit: usize,
}

impl TurnController {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        rooms: Arc<dyn RoomStore>,
        messages: Arc<dyn VoiceMessageStore>,
        locks: Arc<SessionLocks>,
        emitter: Arc<dyn EventEmitter>,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            rooms,
            messages,
            locks,
            emitter,
            store_timeout: config.store_timeout(),
            message_page_limit: config.message_page_limit,
        }
    }

    /// Sets the session's speaking flag.
    ///
    /// Serialized with the session's matchmaking calls, but otherwise not
    /// validated against room or partner state.
    pub async fn set_speaking(&self, session_id: &str, speaking: bool) -> WalkieResult<Session> {
        let _guard = self.locks.acquire(session_id, self.store_timeout).await?;
        let now = Utc::now();

        let session = bounded(
            self.store_timeout,
            self.sessions
                .update_session_if(session_id, &|_| true, &|s| s.set_speaking(speaking, now)),
        )
        .await?
        .updated()
        .ok_or_else(|| WalkieError::NotFound(format!("session {}", session_id)))?;

        log::debug!("[Turns] Session {} speaking={}", session_id, speaking);
        self.emitter.emit_session(SessionEvent::SpeakingChanged {
            session_id: session_id.to_string(),
            speaking,
            timestamp: now_millis(),
        });
        Ok(session)
    }

    /// Stores an opaque voice payload against the sender's current room.
    ///
    /// The payload must be non-empty and the duration positive. The sender
    /// must be connected and seated in an active room. Holds the sender's
    /// lock, so a concurrent skip or leave can't move it out from under the
    /// message.
    pub async fn record_voice_message(
        &self,
        session_id: &str,
        payload: Bytes,
        duration_ms: u32,
    ) -> WalkieResult<VoiceMessage> {
        if payload.is_empty() {
            return Err(WalkieError::InvalidRequest("audio payload is empty".into()));
        }
        if duration_ms == 0 {
            return Err(WalkieError::InvalidRequest(
                "durationMs must be positive".into(),
            ));
        }

        let _guard = self.locks.acquire(session_id, self.store_timeout).await?;
        let session = bounded(self.store_timeout, self.sessions.get_session(session_id))
            .await?
            .ok_or_else(|| WalkieError::NotFound(format!("session {}", session_id)))?;

        if !session.connected {
            return Err(WalkieError::InvalidState(format!(
                "session {} is disconnected",
                session_id
            )));
        }
        let room_id = session.room_id().ok_or_else(|| {
            WalkieError::InvalidState(format!("session {} is not in a room", session_id))
        })?;

        match bounded(self.store_timeout, self.rooms.get_room(room_id)).await? {
            Some(room) if room.active => {}
            Some(_) => {
                return Err(WalkieError::InvalidState(format!(
                    "room {} is inactive",
                    room_id
                )));
            }
            None => {
                return Err(WalkieError::InvalidState(format!(
                    "room {} no longer exists",
                    room_id
                )));
            }
        }

        let message = VoiceMessage {
            id: new_message_id(),
            room_id: room_id.to_string(),
            sender_session_id: session.id.clone(),
            sequence: 0,
            payload,
            duration_ms,
            created_at: Utc::now(),
        };
        let message = bounded(self.store_timeout, self.messages.insert_message(message)).await?;

        log::info!(
            "[Turns] Recorded message #{} in {} from {} ({} bytes, {}ms)",
            message.sequence,
            message.room_id,
            session_id,
            message.payload.len(),
            message.duration_ms
        );
        self.emitter.emit_session(SessionEvent::VoiceMessageRecorded {
            session_id: session_id.to_string(),
            room_id: message.room_id.clone(),
            sequence: message.sequence,
            duration_ms: message.duration_ms,
            timestamp: now_millis(),
        });
        Ok(message)
    }

    /// Lists a room's messages in sequence order, starting after `after`.
    pub async fn list_messages(
        &self,
        room_id: &str,
        after: Option<u64>,
    ) -> WalkieResult<Vec<VoiceMessage>> {
        if bounded(self.store_timeout, self.rooms.get_room(room_id))
            .await?
            .is_none()
        {
            return Err(WalkieError::NotFound(format!("room {}", room_id)));
        }

        bounded(
            self.store_timeout,
            self.messages
                .messages_for_room(room_id, after.unwrap_or(0), self.message_page_limit),
        )
        .await
    }
}
