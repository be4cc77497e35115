//! Trait abstractions for the storage collaborators.
//!
//! These traits enable dependency injection for testability and let a
//! durable backend replace [`MemoryStore`](super::MemoryStore) without
//! touching the services.

use async_trait::async_trait;

use super::{StoreResult, UpdateOutcome};
use crate::model::{Room, Session, VoiceMessage};

/// Durable record of each anonymous participant.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetches a session by id.
    async fn get_session(&self, id: &str) -> StoreResult<Option<Session>>;

    /// Inserts a new session. Fails with `DuplicateKey` if the id is taken.
    async fn insert_session(&self, session: Session) -> StoreResult<Session>;

    /// Applies `mutation` to the session iff `predicate` holds on its current
    /// value, atomically.
    ///
    /// # Arguments
    /// * `id` - Session to update
    /// * `predicate` - Checked against the current row under the row lock
    /// * `mutation` - Applied only when `predicate` returned true
    async fn update_session_if(
        &self,
        id: &str,
        predicate: &(dyn for<'r> Fn(&'r Session) -> bool + Send + Sync),
        mutation: &(dyn for<'r> Fn(&'r mut Session) + Send + Sync),
    ) -> StoreResult<UpdateOutcome<Session>>;

    /// Returns every session whose room reference equals `room_id`.
    async fn sessions_in_room(&self, room_id: &str) -> StoreResult<Vec<Session>>;

    /// Returns every session. Used by maintenance sweeps.
    async fn all_sessions(&self) -> StoreResult<Vec<Session>>;
}

/// Durable record of each room's seat count and activation flag.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Fetches a room by id.
    async fn get_room(&self, id: &str) -> StoreResult<Option<Room>>;

    /// Inserts a new room. Fails with `DuplicateKey` if the id is taken.
    async fn insert_room(&self, room: Room) -> StoreResult<Room>;

    /// Applies `mutation` to the room iff `predicate` holds on its current
    /// value, atomically. This is the compare-and-increment primitive the
    /// capacity invariant relies on.
    async fn update_room_if(
        &self,
        id: &str,
        predicate: &(dyn for<'r> Fn(&'r Room) -> bool + Send + Sync),
        mutation: &(dyn for<'r> Fn(&'r mut Room) + Send + Sync),
    ) -> StoreResult<UpdateOutcome<Room>>;

    /// Returns up to `limit` rooms that currently have a free seat, ordered
    /// by creation time.
    async fn available_rooms(&self, limit: usize) -> StoreResult<Vec<Room>>;

    /// Returns every room. Used by maintenance sweeps.
    async fn all_rooms(&self) -> StoreResult<Vec<Room>>;
}

/// Append-only record of voice message metadata.
#[async_trait]
pub trait VoiceMessageStore: Send + Sync {
    /// Stores a message, assigning its `sequence`. Any sequence set by the
    /// caller is overwritten.
    async fn insert_message(&self, message: VoiceMessage) -> StoreResult<VoiceMessage>;

    /// Returns messages for a room with `sequence > after`, ascending,
    /// at most `limit` of them.
    async fn messages_for_room(
        &self,
        room_id: &str,
        after: u64,
        limit: usize,
    ) -> StoreResult<Vec<VoiceMessage>>;
}
