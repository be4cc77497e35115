//! Shared test fixtures for the service and API tests.
//!
//! [`Harness`] wires every service over one [`FlakyStore`], so tests can
//! drive the real matchmaking paths and inject storage failures mid-flow.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Notify, RwLock, RwLockWriteGuard};

use crate::events::{EventEmitter, RoomEvent, SessionEvent};
use crate::model::{Room, Session, VoiceMessage};
use crate::protocol_constants::ROOM_CAPACITY;
use crate::services::{
    Matchmaker, PresenceReporter, Reaper, SessionLocks, SessionService, TurnController,
};
use crate::state::Config;
use crate::store::{
    MemoryStore, RoomStore, SessionStore, StoreError, StoreResult, UpdateOutcome,
    VoiceMessageStore,
};

// ─────────────────────────────────────────────────────────────────────────────
// Recording Emitter
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps every emitted event for later assertions.
#[derive(Default)]
pub struct RecordingEventEmitter {
    room: Mutex<Vec<RoomEvent>>,
    session: Mutex<Vec<SessionEvent>>,
}

impl RecordingEventEmitter {
    pub fn room_events(&self) -> Vec<RoomEvent> {
        self.room.lock().clone()
    }

    pub fn session_events(&self) -> Vec<SessionEvent> {
        self.session.lock().clone()
    }
}

impl EventEmitter for RecordingEventEmitter {
    fn emit_room(&self, event: RoomEvent) {
        self.room.lock().push(event);
    }

    fn emit_session(&self, event: SessionEvent) {
        self.session.lock().push(event);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure-Injecting Store
// ─────────────────────────────────────────────────────────────────────────────

/// [`MemoryStore`] wrapper whose reads and writes can be switched off, or
/// parked to force a specific interleaving.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_session_writes: AtomicBool,
    fail_room_writes: AtomicBool,
    /// Room writes still allowed through while `fail_room_writes` is set.
    room_writes_left: AtomicUsize,
    room_write_gate: RwLock<()>,
    /// Room writes that skip the gate while it is held.
    gate_passes: AtomicUsize,
    room_write_parked: Notify,
}

impl FlakyStore {
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_session_writes(&self, fail: bool) {
        self.fail_session_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_room_writes(&self, fail: bool) {
        self.room_writes_left.store(0, Ordering::SeqCst);
        self.fail_room_writes.store(fail, Ordering::SeqCst);
    }

    /// Lets `allowed` more room writes succeed, then fails the rest.
    pub fn fail_room_writes_after(&self, allowed: usize) {
        self.room_writes_left.store(allowed, Ordering::SeqCst);
        self.fail_room_writes.store(true, Ordering::SeqCst);
    }

    /// Parks every room write after the next `passes` until the guard drops.
    pub async fn hold_room_writes(&self, passes: usize) -> RwLockWriteGuard<'_, ()> {
        let guard = self.room_write_gate.write().await;
        self.gate_passes.store(passes, Ordering::SeqCst);
        guard
    }

    /// Resolves once a room write is parked behind [`FlakyStore::hold_room_writes`].
    pub async fn room_write_parked(&self) {
        self.room_write_parked.notified().await;
    }

    async fn room_write(&self) -> StoreResult<()> {
        if self.fail_room_writes.load(Ordering::SeqCst)
            && self
                .room_writes_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
        {
            return Err(StoreError::Unavailable("injected room write failure".into()));
        }

        if self.room_write_gate.try_read().is_err()
            && self
                .gate_passes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
        {
            self.room_write_parked.notify_one();
            drop(self.room_write_gate.read().await);
        }
        Ok(())
    }

    fn check(flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("injected {} failure", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get_session(id).await
    }

    async fn insert_session(&self, session: Session) -> StoreResult<Session> {
        Self::check(&self.fail_session_writes, "session write")?;
        self.inner.insert_session(session).await
    }

    async fn update_session_if(
        &self,
        id: &str,
        predicate: &(dyn for<'r> Fn(&'r Session) -> bool + Send + Sync),
        mutation: &(dyn for<'r> Fn(&'r mut Session) + Send + Sync),
    ) -> StoreResult<UpdateOutcome<Session>> {
        Self::check(&self.fail_session_writes, "session write")?;
        self.inner.update_session_if(id, predicate, mutation).await
    }

    async fn sessions_in_room(&self, room_id: &str) -> StoreResult<Vec<Session>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.sessions_in_room(room_id).await
    }

    async fn all_sessions(&self) -> StoreResult<Vec<Session>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.all_sessions().await
    }
}

#[async_trait]
impl RoomStore for FlakyStore {
    async fn get_room(&self, id: &str) -> StoreResult<Option<Room>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get_room(id).await
    }

    async fn insert_room(&self, room: Room) -> StoreResult<Room> {
        self.room_write().await?;
        self.inner.insert_room(room).await
    }

    async fn update_room_if(
        &self,
        id: &str,
        predicate: &(dyn for<'r> Fn(&'r Room) -> bool + Send + Sync),
        mutation: &(dyn for<'r> Fn(&'r mut Room) + Send + Sync),
    ) -> StoreResult<UpdateOutcome<Room>> {
        self.room_write().await?;
        self.inner.update_room_if(id, predicate, mutation).await
    }

    async fn available_rooms(&self, limit: usize) -> StoreResult<Vec<Room>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.available_rooms(limit).await
    }

    async fn all_rooms(&self) -> StoreResult<Vec<Room>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.all_rooms().await
    }
}

#[async_trait]
impl VoiceMessageStore for FlakyStore {
    async fn insert_message(&self, message: VoiceMessage) -> StoreResult<VoiceMessage> {
        self.inner.insert_message(message).await
    }

    async fn messages_for_room(
        &self,
        room_id: &str,
        after: u64,
        limit: usize,
    ) -> StoreResult<Vec<VoiceMessage>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.messages_for_room(room_id, after, limit).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

/// All services wired over a single [`FlakyStore`].
pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub emitter: Arc<RecordingEventEmitter>,
    pub sessions: SessionService,
    pub matchmaker: Arc<Matchmaker>,
    pub presence: PresenceReporter,
    pub turns: TurnController,
    pub reaper: Arc<Reaper>,
    pub locks: Arc<SessionLocks>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(FlakyStore::default());
        let emitter = Arc::new(RecordingEventEmitter::default());
        let locks = Arc::new(SessionLocks::new());

        let sessions = SessionService::new(store.clone(), emitter.clone(), config.store_timeout());
        let matchmaker = Arc::new(Matchmaker::new(
            store.clone(),
            store.clone(),
            locks.clone(),
            emitter.clone(),
            &config,
        ));
        let presence = PresenceReporter::new(store.clone(), store.clone(), config.store_timeout());
        let turns = TurnController::new(
            store.clone(),
            store.clone(),
            store.clone(),
            locks.clone(),
            emitter.clone(),
            &config,
        );
        let reaper = Arc::new(Reaper::new(
            store.clone(),
            store.clone(),
            matchmaker.clone(),
            locks.clone(),
            emitter.clone(),
            &config,
        ));

        Self {
            store,
            emitter,
            sessions,
            matchmaker,
            presence,
            turns,
            reaper,
            locks,
        }
    }

    /// Creates a session and returns its id.
    pub async fn new_session(&self) -> String {
        self.sessions.create_session().await.unwrap().id
    }

    pub async fn session(&self, id: &str) -> Session {
        self.store.inner().get_session(id).await.unwrap().unwrap()
    }

    pub async fn room(&self, id: &str) -> Room {
        self.store.inner().get_room(id).await.unwrap().unwrap()
    }

    pub async fn all_rooms(&self) -> Vec<Room> {
        self.store.inner().all_rooms().await.unwrap()
    }

    pub async fn all_sessions(&self) -> Vec<Session> {
        self.store.inner().all_sessions().await.unwrap()
    }

    /// Checks the seat accounting rules across every stored row.
    pub async fn assert_invariants(&self) {
        let sessions = self.all_sessions().await;
        for room in self.all_rooms().await {
            assert!(room.member_count <= ROOM_CAPACITY, "{:?}", room);
            assert_eq!(room.active, room.member_count > 0, "{:?}", room);

            let members = sessions.iter().filter(|s| s.is_in_room(&room.id)).count() as u32;
            assert_eq!(members, room.member_count, "seat count mismatch for {:?}", room);
        }
        for session in &sessions {
            if let Some(room_id) = session.room_id() {
                assert!(
                    self.store.inner().get_room(room_id).await.unwrap().is_some(),
                    "session {} points at missing room {}",
                    session.id,
                    room_id
                );
            }
        }
    }
}
