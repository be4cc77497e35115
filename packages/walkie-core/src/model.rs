//! Domain records: sessions, rooms and voice messages.
//!
//! Every change to a room's seat count goes through [`Room::admit`],
//! [`Room::release`] or [`Room::reconcile`], so the capacity and activation
//! rules live in exactly one place. Stores apply these mutations inside their
//! conditional-update primitive.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::protocol_constants::ROOM_CAPACITY;

// ─────────────────────────────────────────────────────────────────────────────
// Room
// ─────────────────────────────────────────────────────────────────────────────

/// A capacity-two pairing context.
///
/// The room never enumerates its sessions; it only holds a count. Session
/// membership is a derived query against the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub active: bool,
    pub member_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle phase of a room, derived from its count and activation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    /// One seat taken, waiting for a partner.
    Waiting,
    /// Both seats taken.
    Paired,
    /// Emptied out. Inactive rooms are never admitted into again.
    Inactive,
}

impl Room {
    /// Creates a room that already holds its first member's seat.
    ///
    /// Inserting the room with the seat taken avoids ever exposing an active
    /// room with a zero count.
    pub fn with_first_member(id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            active: true,
            member_count: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether another session may be admitted right now.
    pub fn has_free_seat(&self) -> bool {
        self.active && self.member_count < ROOM_CAPACITY
    }

    pub fn phase(&self) -> RoomPhase {
        match (self.active, self.member_count) {
            (false, _) | (_, 0) => RoomPhase::Inactive,
            (true, n) if n >= ROOM_CAPACITY => RoomPhase::Paired,
            _ => RoomPhase::Waiting,
        }
    }

    /// Takes one seat. Callers must only apply this under a
    /// [`Room::has_free_seat`] predicate.
    pub fn admit(&mut self, now: DateTime<Utc>) {
        debug_assert!(self.has_free_seat(), "admit on a room without a free seat");
        self.member_count = (self.member_count + 1).min(ROOM_CAPACITY);
        self.active = true;
        self.updated_at = now;
    }

    /// Gives one seat back, floored at zero. The room deactivates when empty.
    pub fn release(&mut self, now: DateTime<Utc>) {
        self.member_count = self.member_count.saturating_sub(1);
        self.active = self.member_count > 0;
        self.updated_at = now;
    }

    /// Marks the room as changing without moving its count. Keeps the
    /// reaper's grace window open while a seat is being released.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Overwrites the count with the number of sessions actually referencing
    /// the room.
    pub fn reconcile(&mut self, members: u32, now: DateTime<Utc>) {
        self.member_count = members.min(ROOM_CAPACITY);
        self.active = self.member_count > 0;
        self.updated_at = now;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// An anonymous participant's handle across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Room this session is counted in, if any.
    pub room_id: Option<String>,
    pub connected: bool,
    pub speaking: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Matchmaking phase of a session as seen by a polling client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Not in any room.
    Unassigned,
    /// In a room with no connected partner.
    Waiting,
    /// In a room with a connected partner.
    Paired,
}

impl Session {
    pub fn new(id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            room_id: None,
            connected: true,
            speaking: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn is_in_room(&self, room_id: &str) -> bool {
        self.room_id() == Some(room_id)
    }

    pub fn assign(&mut self, room_id: &str, now: DateTime<Utc>) {
        self.room_id = Some(room_id.to_string());
        self.updated_at = now;
    }

    /// Drops the room reference. A session outside a room is never speaking.
    pub fn clear_room(&mut self, now: DateTime<Utc>) {
        self.room_id = None;
        self.speaking = false;
        self.updated_at = now;
    }

    pub fn set_speaking(&mut self, speaking: bool, now: DateTime<Utc>) {
        self.speaking = speaking;
        self.updated_at = now;
    }

    pub fn mark_disconnected(&mut self, now: DateTime<Utc>) {
        self.connected = false;
        self.speaking = false;
        self.updated_at = now;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Voice Message
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata record for one push-to-talk interval. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceMessage {
    pub id: String,
    pub room_id: String,
    pub sender_session_id: String,
    /// Store-assigned, strictly increasing in insertion order.
    pub sequence: u64,
    /// Opaque audio payload. Never decoded here.
    #[serde(rename = "audioData", serialize_with = "serialize_base64")]
    pub payload: Bytes,
    pub duration_ms: u32,
    pub created_at: DateTime<Utc>,
}

fn serialize_base64<S: Serializer>(payload: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(count: u32, active: bool) -> Room {
        let now = Utc::now();
        Room {
            id: "room-1".into(),
            active,
            member_count: count,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn new_room_holds_first_seat() {
        let room = Room::with_first_member("room-1".into(), Utc::now());
        assert_eq!(room.member_count, 1);
        assert!(room.active);
        assert_eq!(room.phase(), RoomPhase::Waiting);
        assert!(room.has_free_seat());
    }

    #[test]
    fn full_room_has_no_free_seat() {
        let room = room(2, true);
        assert!(!room.has_free_seat());
        assert_eq!(room.phase(), RoomPhase::Paired);
    }

    #[test]
    fn inactive_room_has_no_free_seat() {
        let room = room(0, false);
        assert!(!room.has_free_seat());
        assert_eq!(room.phase(), RoomPhase::Inactive);
    }

    #[test]
    fn release_deactivates_empty_room() {
        let mut room = room(1, true);
        room.release(Utc::now());
        assert_eq!(room.member_count, 0);
        assert!(!room.active);
    }

    #[test]
    fn release_floors_at_zero() {
        let mut room = room(0, false);
        room.release(Utc::now());
        assert_eq!(room.member_count, 0);
        assert!(!room.active);
    }

    #[test]
    fn touch_moves_only_the_timestamp() {
        let mut room = room(2, true);
        let before = room.clone();
        let later = before.updated_at + chrono::Duration::seconds(5);
        room.touch(later);
        assert_eq!(room.updated_at, later);
        assert_eq!(room.member_count, before.member_count);
        assert_eq!(room.active, before.active);
    }

    #[test]
    fn release_keeps_occupied_room_active() {
        let mut room = room(2, true);
        room.release(Utc::now());
        assert_eq!(room.member_count, 1);
        assert!(room.active);
    }

    #[test]
    fn reconcile_clamps_to_capacity() {
        let mut room = room(2, true);
        room.reconcile(5, Utc::now());
        assert_eq!(room.member_count, ROOM_CAPACITY);

        room.reconcile(0, Utc::now());
        assert_eq!(room.member_count, 0);
        assert!(!room.active);
    }

    #[test]
    fn clearing_room_stops_speaking() {
        let now = Utc::now();
        let mut session = Session::new("s1".into(), now);
        session.assign("room-1", now);
        session.set_speaking(true, now);

        session.clear_room(now);
        assert!(session.room_id.is_none());
        assert!(!session.speaking);
    }

    #[test]
    fn session_serializes_camel_case() {
        let session = Session::new("s1".into(), Utc::now());
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["id"], "s1");
        assert!(json["roomId"].is_null());
        assert_eq!(json["connected"], true);
        assert_eq!(json["speaking"], false);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn voice_message_payload_serializes_as_base64() {
        let message = VoiceMessage {
            id: "m1".into(),
            room_id: "room-1".into(),
            sender_session_id: "s1".into(),
            sequence: 1,
            payload: Bytes::from_static(b"hello"),
            duration_ms: 1200,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["audioData"], "aGVsbG8=");
        assert_eq!(json["durationMs"], 1200);
        assert_eq!(json["senderSessionId"], "s1");
    }
}
