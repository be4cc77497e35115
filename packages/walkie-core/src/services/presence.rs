//! Read-only room status for polling clients.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::bounded::bounded;
use crate::error::WalkieResult;
use crate::model::{Room, RoomPhase, Session, SessionPhase};
use crate::store::{RoomStore, SessionStore};

/// What a session sees when it polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub room: Option<Room>,
    /// Phase of `room` by its seat count. Can read `paired` while `phase` is
    /// `waiting` if the partner's seat is held by a disconnected session.
    pub room_phase: Option<RoomPhase>,
    pub partner: Option<Session>,
    pub phase: SessionPhase,
}

impl RoomStatus {
    fn unassigned() -> Self {
        Self {
            room: None,
            room_phase: None,
            partner: None,
            phase: SessionPhase::Unassigned,
        }
    }
}

/// Answers "which room am I in and who is with me" without mutating anything.
pub struct PresenceReporter {
    sessions: Arc<dyn SessionStore>,
    rooms: Arc<dyn RoomStore>,
    store_timeout: Duration,
}

impl PresenceReporter {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        rooms: Arc<dyn RoomStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            rooms,
            store_timeout,
        }
    }

    /// Returns the session's room and its connected partner.
    ///
    /// An unknown session, a session with no room, and a session pointing at
    /// a room that no longer exists all report an empty status. Storage
    /// failures are still returned as errors.
    pub async fn status(&self, session_id: &str) -> WalkieResult<RoomStatus> {
        let Some(session) = bounded(self.store_timeout, self.sessions.get_session(session_id)).await?
        else {
            return Ok(RoomStatus::unassigned());
        };
        let Some(room_id) = session.room_id() else {
            return Ok(RoomStatus::unassigned());
        };
        let Some(room) = bounded(self.store_timeout, self.rooms.get_room(room_id)).await? else {
            log::debug!(
                "[Presence] Session {} points at missing room {}",
                session_id,
                room_id
            );
            return Ok(RoomStatus::unassigned());
        };

        let mut others: Vec<Session> =
            bounded(self.store_timeout, self.sessions.sessions_in_room(room_id))
                .await?
                .into_iter()
                .filter(|s| s.id != session.id && s.connected)
                .collect();

        if others.len() > 1 {
            log::warn!(
                "[Presence] Room {} has {} partners for session {}",
                room_id,
                others.len(),
                session_id
            );
        }

        // Deterministic pick if the room ever holds more than one partner.
        others.sort_by(|a, b| a.id.cmp(&b.id));
        let partner = others.into_iter().next();
        let phase = if partner.is_some() {
            SessionPhase::Paired
        } else {
            SessionPhase::Waiting
        };

        Ok(RoomStatus {
            room_phase: Some(room.phase()),
            room: Some(room),
            partner,
            phase,
        })
    }
}
