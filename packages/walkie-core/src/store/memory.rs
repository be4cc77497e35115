//! In-process storage backend.
//!
//! Each table is a [`DashMap`]; a conditional update holds the entry's shard
//! lock while it evaluates the predicate and applies the mutation, which makes
//! the check-and-write indivisible.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::traits::{RoomStore, SessionStore, VoiceMessageStore};
use super::{StoreError, StoreResult, UpdateOutcome};
use crate::model::{Room, Session, VoiceMessage};

/// Storage for all three tables, shared behind `Arc`.
pub struct MemoryStore {
    sessions: DashMap<String, Session>,
    rooms: DashMap<String, Room>,
    /// room_id -> messages in sequence order
    messages: DashMap<String, Vec<VoiceMessage>>,
    /// Last assigned message sequence.
    last_sequence: AtomicU64,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
            messages: DashMap::new(),
            last_sequence: AtomicU64::new(0),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
        Ok(self.sessions.get(id).map(|r| r.value().clone()))
    }

    async fn insert_session(&self, session: Session) -> StoreResult<Session> {
        match self.sessions.entry(session.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(session.id)),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(session)
            }
        }
    }

    async fn update_session_if(
        &self,
        id: &str,
        predicate: &(dyn for<'r> Fn(&'r Session) -> bool + Send + Sync),
        mutation: &(dyn for<'r> Fn(&'r mut Session) + Send + Sync),
    ) -> StoreResult<UpdateOutcome<Session>> {
        let Some(mut entry) = self.sessions.get_mut(id) else {
            return Ok(UpdateOutcome::Missing);
        };
        let outcome = if predicate(entry.value()) {
            mutation(entry.value_mut());
            UpdateOutcome::Updated(entry.value().clone())
        } else {
            UpdateOutcome::NoMatch(entry.value().clone())
        };
        drop(entry);
        Ok(outcome)
    }

    async fn sessions_in_room(&self, room_id: &str) -> StoreResult<Vec<Session>> {
        Ok(self
            .sessions
            .iter()
            .filter(|r| r.value().is_in_room(room_id))
            .map(|r| r.value().clone())
            .collect())
    }

    async fn all_sessions(&self) -> StoreResult<Vec<Session>> {
        Ok(self.sessions.iter().map(|r| r.value().clone()).collect())
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn get_room(&self, id: &str) -> StoreResult<Option<Room>> {
        Ok(self.rooms.get(id).map(|r| r.value().clone()))
    }

    async fn insert_room(&self, room: Room) -> StoreResult<Room> {
        match self.rooms.entry(room.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(room.id)),
            Entry::Vacant(slot) => {
                slot.insert(room.clone());
                Ok(room)
            }
        }
    }

    async fn update_room_if(
        &self,
        id: &str,
        predicate: &(dyn for<'r> Fn(&'r Room) -> bool + Send + Sync),
        mutation: &(dyn for<'r> Fn(&'r mut Room) + Send + Sync),
    ) -> StoreResult<UpdateOutcome<Room>> {
        let Some(mut entry) = self.rooms.get_mut(id) else {
            return Ok(UpdateOutcome::Missing);
        };
        let outcome = if predicate(entry.value()) {
            mutation(entry.value_mut());
            UpdateOutcome::Updated(entry.value().clone())
        } else {
            UpdateOutcome::NoMatch(entry.value().clone())
        };
        drop(entry);
        Ok(outcome)
    }

    async fn available_rooms(&self, limit: usize) -> StoreResult<Vec<Room>> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .filter(|r| r.value().has_free_seat())
            .map(|r| r.value().clone())
            .collect();
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rooms.truncate(limit);
        Ok(rooms)
    }

    async fn all_rooms(&self) -> StoreResult<Vec<Room>> {
        Ok(self.rooms.iter().map(|r| r.value().clone()).collect())
    }
}

#[async_trait]
impl VoiceMessageStore for MemoryStore {
    async fn insert_message(&self, mut message: VoiceMessage) -> StoreResult<VoiceMessage> {
        // Assign the sequence while holding the room's entry so per-room
        // order always matches sequence order.
        let mut room_messages = self.messages.entry(message.room_id.clone()).or_default();
        message.sequence = self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        room_messages.push(message.clone());
        Ok(message)
    }

    async fn messages_for_room(
        &self,
        room_id: &str,
        after: u64,
        limit: usize,
    ) -> StoreResult<Vec<VoiceMessage>> {
        let Some(room_messages) = self.messages.get(room_id) else {
            return Ok(Vec::new());
        };
        Ok(room_messages
            .iter()
            .filter(|m| m.sequence > after)
            .take(limit)
            .cloned()
            .collect())
    }
}
