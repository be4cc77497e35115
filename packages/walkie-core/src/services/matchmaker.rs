//! Room matchmaking: join, skip, leave and disconnect.
//!
//! Seat accounting follows two fixed orders so that a failure between steps
//! can only ever leave a room over-counted with the session in no room:
//!
//! - **Taking a seat**: reserve it with a conditional increment on the room,
//!   then point the session at the room. If pointing fails, give the seat back.
//! - **Releasing a seat**: touch the room, clear the session's room reference,
//!   then decrement. The touch restarts the room's reconcile grace period, so
//!   the reaper never counts members in the gap between the last two steps.
//!
//! A session is therefore never counted in two rooms. Over-counts left behind
//! by storage failures are repaired by the [`Reaper`](super::Reaper).

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use super::bounded::bounded;
use super::session_locks::SessionLocks;
use crate::error::{WalkieError, WalkieResult};
use crate::events::{EventEmitter, RoomEvent, SessionEvent};
use crate::model::{Room, Session};
use crate::state::Config;
use crate::store::{RoomStore, SessionStore, StoreResult, UpdateOutcome};
use crate::utils::{new_room_id, now_millis};

/// Maximum candidate rooms fetched per selection scan.
const CANDIDATE_SCAN_LIMIT: usize = 16;

/// Result of trying to take a seat in any available room.
enum Claim {
    /// A seat was reserved; carries the post-increment room.
    Reserved(Room),
    /// No room had a free seat when scanned.
    NoCandidates,
    /// Candidates existed but every seat race was lost, `max_join_attempts` times.
    Contended,
}

/// Assigns sessions to rooms under the two-seat capacity rule.
pub struct Matchmaker {
    sessions: Arc<dyn SessionStore>,
    rooms: Arc<dyn RoomStore>,
    locks: Arc<SessionLocks>,
    emitter: Arc<dyn EventEmitter>,
    /// Serializes "no room available, create one" so concurrent joiners pair
    /// up instead of each opening their own room.
    creation_gate: Mutex<()>,
    /// Rotates the starting candidate so concurrent callers spread out.
    next_ticket: AtomicUsize,
    max_join_attempts: u32,
    store_timeout: Duration,
}

impl Matchmaker {
    /// Creates a new Matchmaker.
    ///
    /// # Arguments
    /// * `sessions` - Session storage collaborator
    /// * `rooms` - Room storage collaborator
    /// * `locks` - Per-session request locks, shared with the turn controller
    /// * `emitter` - Sink for room and session events
    /// * `config` - Supplies retry bound and storage deadline
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        rooms: Arc<dyn RoomStore>,
        locks: Arc<SessionLocks>,
        emitter: Arc<dyn EventEmitter>,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            rooms,
            locks,
            emitter,
            creation_gate: Mutex::new(()),
            next_ticket: AtomicUsize::new(0),
            max_join_attempts: config.max_join_attempts,
            store_timeout: config.store_timeout(),
        }
    }

    /// Moves a session into a room.
    ///
    /// With `room_id`, the session joins exactly that room or fails
    /// (`NotFound` if it doesn't exist, `Conflict` if it is full or inactive).
    /// Without it, any room with a free seat is taken, or a new one created.
    /// A session already in a room leaves it first. Re-joining the room the
    /// session already occupies returns that room unchanged.
    ///
    /// Returns the room state right after the session's seat was taken.
    /// Disconnected sessions are rejected with `InvalidState`.
    pub async fn join(&self, session_id: &str, room_id: Option<&str>) -> WalkieResult<Room> {
        let _guard = self.locks.acquire(session_id, self.store_timeout).await?;
        let session = self.load_connected(session_id).await?;

        if let Some(target) = room_id.filter(|target| session.is_in_room(target)) {
            if let Some(room) = self.call(self.rooms.get_room(target)).await? {
                if room.active {
                    log::debug!(
                        "[Matchmaker] Session {} already seated in {}",
                        session_id,
                        target
                    );
                    return Ok(room);
                }
            }
        }

        self.release_seat(&session).await?;

        match room_id {
            Some(target) => self.join_target(session_id, target).await,
            None => self.join_any(session_id, None).await,
        }
    }

    /// Leaves the current room (if any) and re-matches with no target room.
    ///
    /// The room just left is not offered again in the same call, so a skip
    /// never lands back with the partner being skipped.
    pub async fn skip(&self, session_id: &str) -> WalkieResult<Room> {
        let _guard = self.locks.acquire(session_id, self.store_timeout).await?;
        let session = self.load_connected(session_id).await?;

        let previous = self.release_seat(&session).await?;
        log::info!(
            "[Matchmaker] Session {} skipping{}",
            session_id,
            previous
                .as_ref()
                .map(|id| format!(" away from {}", id))
                .unwrap_or_default()
        );

        self.join_any(session_id, previous.as_deref()).await
    }

    /// Gives the session's seat back. Succeeds without change if the session
    /// is not in a room, so repeated calls are safe.
    pub async fn leave(&self, session_id: &str) -> WalkieResult<()> {
        let _guard = self.locks.acquire(session_id, self.store_timeout).await?;
        let session = self.load_session(session_id).await?;
        self.release_seat(&session).await?;
        Ok(())
    }

    /// Marks a session disconnected and releases its seat.
    pub async fn disconnect(&self, session_id: &str) -> WalkieResult<Session> {
        let _guard = self.locks.acquire(session_id, self.store_timeout).await?;
        let session = self.load_session(session_id).await?;
        self.release_seat(&session).await?;

        let now = Utc::now();
        let outcome = self
            .call(self.sessions.update_session_if(
                session_id,
                &|_| true,
                &|s| s.mark_disconnected(now),
            ))
            .await?;

        let session = outcome
            .updated()
            .ok_or_else(|| WalkieError::NotFound(format!("session {}", session_id)))?;

        log::info!("[Matchmaker] Session {} disconnected", session_id);
        self.emitter.emit_session(SessionEvent::Disconnected {
            session_id: session_id.to_string(),
            timestamp: now_millis(),
        });
        Ok(session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Seat Accounting
    // ─────────────────────────────────────────────────────────────────────────

    /// Releases the session's current seat. Returns the room it left.
    async fn release_seat(&self, session: &Session) -> WalkieResult<Option<String>> {
        let Some(room_id) = session.room_id.clone() else {
            return Ok(None);
        };
        let now = Utc::now();

        let touched = self
            .call(self.rooms.update_room_if(
                &room_id,
                &|r| r.member_count > 0,
                &|r| r.touch(now),
            ))
            .await?;
        if !touched.is_updated() {
            log::debug!(
                "[Matchmaker] Room {} has no seat to touch for session {}",
                room_id,
                session.id
            );
        }

        let cleared = self
            .call(self.sessions.update_session_if(
                &session.id,
                &|s| s.is_in_room(&room_id),
                &|s| s.clear_room(now),
            ))
            .await?;

        match cleared {
            UpdateOutcome::Updated(_) => {}
            UpdateOutcome::NoMatch(current) => {
                log::warn!(
                    "[Matchmaker] Session {} no longer in {} (now {:?}), nothing to release",
                    session.id,
                    room_id,
                    current.room_id
                );
                return Ok(None);
            }
            UpdateOutcome::Missing => {
                return Err(WalkieError::NotFound(format!("session {}", session.id)));
            }
        }

        let released = self
            .call(
                self.rooms
                    .update_room_if(&room_id, &|_| true, &|r| r.release(now)),
            )
            .await?;

        match released {
            UpdateOutcome::Updated(room) => {
                log::info!(
                    "[Matchmaker] Session {} left {} ({} remaining)",
                    session.id,
                    room.id,
                    room.member_count
                );
                self.emitter.emit_room(RoomEvent::Left {
                    room_id: room.id.clone(),
                    session_id: session.id.clone(),
                    member_count: room.member_count,
                    timestamp: now_millis(),
                });
                if !room.active {
                    self.emitter.emit_room(RoomEvent::Deactivated {
                        room_id: room.id,
                        timestamp: now_millis(),
                    });
                }
            }
            UpdateOutcome::NoMatch(_) | UpdateOutcome::Missing => {
                log::warn!(
                    "[Matchmaker] Session {} referenced missing room {}",
                    session.id,
                    room_id
                );
            }
        }

        Ok(Some(room_id))
    }

    /// Takes a seat in one specific room.
    async fn join_target(&self, session_id: &str, room_id: &str) -> WalkieResult<Room> {
        let now = Utc::now();
        let outcome = self
            .call(
                self.rooms
                    .update_room_if(room_id, &Room::has_free_seat, &|r| r.admit(now)),
            )
            .await?;

        match outcome {
            UpdateOutcome::Updated(room) => self.seat_session(session_id, room).await,
            UpdateOutcome::NoMatch(room) => Err(WalkieError::Conflict(format!(
                "room {} is {}",
                room_id,
                if room.active { "full" } else { "inactive" }
            ))),
            UpdateOutcome::Missing => Err(WalkieError::NotFound(format!("room {}", room_id))),
        }
    }

    /// Takes a seat in any room with space, creating a room if none has any.
    async fn join_any(&self, session_id: &str, exclude: Option<&str>) -> WalkieResult<Room> {
        if let Claim::Reserved(room) = self.claim_any(exclude).await? {
            return self.seat_session(session_id, room).await;
        }

        // Re-scan under the gate: rooms are only created while holding it, so
        // a room opened by an earlier gate holder is always seen here.
        let room = {
            let _gate = tokio::time::timeout(self.store_timeout, self.creation_gate.lock())
                .await
                .map_err(|_| WalkieError::Conflict("matchmaking is busy, retry".into()))?;

            match self.claim_any(exclude).await? {
                Claim::Reserved(room) => room,
                Claim::NoCandidates => self.create_room(session_id).await?,
                Claim::Contended => {
                    return Err(WalkieError::Conflict(format!(
                        "lost every seat race after {} attempts",
                        self.max_join_attempts
                    )));
                }
            }
        };

        self.seat_session(session_id, room).await
    }

    /// Scans for rooms with a free seat and tries to reserve one.
    async fn claim_any(&self, exclude: Option<&str>) -> WalkieResult<Claim> {
        for attempt in 1..=self.max_join_attempts {
            let candidates: Vec<Room> = self
                .call(self.rooms.available_rooms(CANDIDATE_SCAN_LIMIT))
                .await?
                .into_iter()
                .filter(|room| Some(room.id.as_str()) != exclude)
                .collect();

            if candidates.is_empty() {
                return Ok(Claim::NoCandidates);
            }

            let start = self.next_ticket.fetch_add(1, Ordering::Relaxed) % candidates.len();
            for candidate in candidates.iter().cycle().skip(start).take(candidates.len()) {
                let now = Utc::now();
                let outcome = self
                    .call(self.rooms.update_room_if(
                        &candidate.id,
                        &Room::has_free_seat,
                        &|r| r.admit(now),
                    ))
                    .await?;
                if let UpdateOutcome::Updated(room) = outcome {
                    return Ok(Claim::Reserved(room));
                }
            }

            log::debug!(
                "[Matchmaker] Lost every seat race on attempt {}/{}",
                attempt,
                self.max_join_attempts
            );
        }

        Ok(Claim::Contended)
    }

    /// Inserts a new room that already holds the caller's seat.
    async fn create_room(&self, session_id: &str) -> WalkieResult<Room> {
        let room = Room::with_first_member(new_room_id(), Utc::now());
        let room = self.call(self.rooms.insert_room(room)).await?;

        log::info!(
            "[Matchmaker] Created room {} for session {}",
            room.id,
            session_id
        );
        self.emitter.emit_room(RoomEvent::Created {
            room_id: room.id.clone(),
            session_id: session_id.to_string(),
            timestamp: now_millis(),
        });
        Ok(room)
    }

    /// Points the session at a room whose seat has already been reserved.
    async fn seat_session(&self, session_id: &str, room: Room) -> WalkieResult<Room> {
        let now = Utc::now();
        let assigned = self
            .call(self.sessions.update_session_if(
                session_id,
                &|s| s.room_id.is_none(),
                &|s| s.assign(&room.id, now),
            ))
            .await;

        let error = match assigned {
            Ok(UpdateOutcome::Updated(_)) => {
                log::info!(
                    "[Matchmaker] Session {} joined {} ({}/{})",
                    session_id,
                    room.id,
                    room.member_count,
                    crate::protocol_constants::ROOM_CAPACITY
                );
                self.emitter.emit_room(RoomEvent::Joined {
                    room_id: room.id.clone(),
                    session_id: session_id.to_string(),
                    member_count: room.member_count,
                    timestamp: now_millis(),
                });
                return Ok(room);
            }
            Ok(UpdateOutcome::NoMatch(current)) => WalkieError::Conflict(format!(
                "session {} is already in room {}",
                session_id,
                current.room_id.unwrap_or_default()
            )),
            Ok(UpdateOutcome::Missing) => {
                WalkieError::NotFound(format!("session {}", session_id))
            }
            Err(e) => {
                // The write may have landed before the deadline expired. Keep
                // the seat if it did, so the count never drops below the
                // number of sessions pointing at the room.
                if let Ok(Some(current)) = self.call(self.sessions.get_session(session_id)).await
                {
                    if current.is_in_room(&room.id) {
                        return Ok(room);
                    }
                }
                e
            }
        };

        self.give_back(&room.id).await;
        Err(error)
    }

    /// Returns a reserved seat nobody ended up taking.
    async fn give_back(&self, room_id: &str) {
        let now = Utc::now();
        let outcome = self
            .call(
                self.rooms
                    .update_room_if(room_id, &|r| r.member_count > 0, &|r| r.release(now)),
            )
            .await;

        match outcome {
            Ok(UpdateOutcome::Updated(room)) if !room.active => {
                self.emitter.emit_room(RoomEvent::Deactivated {
                    room_id: room.id,
                    timestamp: now_millis(),
                });
            }
            Ok(_) => {}
            Err(e) => log::warn!(
                "[Matchmaker] Failed to give back reserved seat in {}: {} (left for the reaper)",
                room_id,
                e
            ),
        }
    }

    async fn load_session(&self, session_id: &str) -> WalkieResult<Session> {
        self.call(self.sessions.get_session(session_id))
            .await?
            .ok_or_else(|| WalkieError::NotFound(format!("session {}", session_id)))
    }

    async fn load_connected(&self, session_id: &str) -> WalkieResult<Session> {
        let session = self.load_session(session_id).await?;
        if !session.connected {
            return Err(WalkieError::InvalidState(format!(
                "session {} is disconnected",
                session_id
            )));
        }
        Ok(session)
    }

    async fn call<T>(&self, call: impl Future<Output = StoreResult<T>>) -> WalkieResult<T> {
        bounded(self.store_timeout, call).await
    }
}
