//! Background maintenance for seat accounting.
//!
//! Each sweep:
//! 1. Releases seats still held by disconnected sessions.
//! 2. Lowers room counts that exceed the number of sessions referencing the
//!    room. These are left behind when a storage call fails between clearing
//!    a session and decrementing its room.
//! 3. Prunes idle per-session locks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::bounded::bounded;
use super::matchmaker::Matchmaker;
use super::session_locks::SessionLocks;
use crate::error::{WalkieError, WalkieResult};
use crate::events::{EventEmitter, RoomEvent};
use crate::model::Room;
use crate::state::Config;
use crate::store::{RoomStore, SessionStore, UpdateOutcome};
use crate::utils::now_millis;

/// What one sweep changed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Disconnected sessions whose seats were released.
    pub released: usize,
    /// Rooms whose over-stated count was lowered.
    pub repaired: usize,
    /// Idle session locks dropped.
    pub locks_pruned: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.released == 0 && self.repaired == 0 && self.locks_pruned == 0
    }
}

/// Periodically repairs seat accounting.
pub struct Reaper {
    sessions: Arc<dyn SessionStore>,
    rooms: Arc<dyn RoomStore>,
    matchmaker: Arc<Matchmaker>,
    locks: Arc<SessionLocks>,
    emitter: Arc<dyn EventEmitter>,
    interval: Duration,
    /// Rooms updated more recently than this are left alone.
    grace: Duration,
    store_timeout: Duration,
    cancel_token: CancellationToken,
}

impl Reaper {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        rooms: Arc<dyn RoomStore>,
        matchmaker: Arc<Matchmaker>,
        locks: Arc<SessionLocks>,
        emitter: Arc<dyn EventEmitter>,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            rooms,
            matchmaker,
            locks,
            emitter,
            interval: config.reaper_interval(),
            grace: config.reconcile_grace(),
            store_timeout: config.store_timeout(),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Starts the sweep loop.
    ///
    /// The first sweep runs one interval after start. The loop exits when
    /// [`Reaper::shutdown`] is called.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        log::info!("[Reaper] Shutting down");
                        break;
                    }
                    _ = interval.tick() => {}
                }

                match this.sweep().await {
                    Ok(report) if !report.is_empty() => {
                        log::info!(
                            "[Reaper] Released {} seat(s), repaired {} room(s), pruned {} lock(s)",
                            report.released,
                            report.repaired,
                            report.locks_pruned
                        );
                    }
                    Ok(_) => log::trace!("[Reaper] Nothing to do"),
                    Err(e) => log::warn!("[Reaper] Sweep failed: {}", e),
                }
            }
        })
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Runs one maintenance pass.
    pub async fn sweep(&self) -> WalkieResult<SweepReport> {
        let released = self.release_disconnected().await?;
        let repaired = self.repair_overcounted().await?;
        let locks_pruned = self.locks.prune();

        Ok(SweepReport {
            released,
            repaired,
            locks_pruned,
        })
    }

    async fn release_disconnected(&self) -> WalkieResult<usize> {
        let stranded: Vec<String> = bounded(self.store_timeout, self.sessions.all_sessions())
            .await?
            .into_iter()
            .filter(|s| !s.connected && s.room_id.is_some())
            .map(|s| s.id)
            .collect();

        let mut released = 0;
        for session_id in stranded {
            match self.matchmaker.leave(&session_id).await {
                Ok(()) => released += 1,
                // Busy with a request of its own; pick it up next sweep.
                Err(WalkieError::Conflict(_)) => {
                    log::debug!("[Reaper] Session {} busy, skipping", session_id)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(released)
    }

    async fn repair_overcounted(&self) -> WalkieResult<usize> {
        let now = Utc::now();
        let grace = chrono::Duration::from_std(self.grace).unwrap_or_else(|_| chrono::Duration::zero());
        let cutoff = now - grace;

        let settled: Vec<Room> = bounded(self.store_timeout, self.rooms.all_rooms())
            .await?
            .into_iter()
            .filter(|r| r.member_count > 0 && r.updated_at <= cutoff)
            .collect();

        let mut repaired = 0;
        for observed in settled {
            let members = bounded(self.store_timeout, self.sessions.sessions_in_room(&observed.id))
                .await?
                .len() as u32;

            if members > observed.member_count {
                log::warn!(
                    "[Reaper] Room {} counts {} but {} session(s) reference it",
                    observed.id,
                    observed.member_count,
                    members
                );
                continue;
            }
            if members == observed.member_count {
                continue;
            }

            // Only rewrite the row if nothing touched it since it was read.
            let outcome = bounded(
                self.store_timeout,
                self.rooms.update_room_if(
                    &observed.id,
                    &|r| {
                        r.member_count == observed.member_count && r.updated_at == observed.updated_at
                    },
                    &|r| r.reconcile(members, now),
                ),
            )
            .await?;

            if let UpdateOutcome::Updated(room) = outcome {
                log::warn!(
                    "[Reaper] Repaired room {}: count {} -> {}",
                    room.id,
                    observed.member_count,
                    room.member_count
                );
                self.emitter.emit_room(RoomEvent::Repaired {
                    room_id: room.id.clone(),
                    previous_count: observed.member_count,
                    member_count: room.member_count,
                    timestamp: now_millis(),
                });
                if !room.active {
                    self.emitter.emit_room(RoomEvent::Deactivated {
                        room_id: room.id,
                        timestamp: now_millis(),
                    });
                }
                repaired += 1;
            }
        }
        Ok(repaired)
    }
}
