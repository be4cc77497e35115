//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where the
//! stores, the event emitter and every service are instantiated and wired
//! together. Swapping the storage backend or the emitter happens here and
//! nowhere else.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::error::{WalkieError, WalkieResult};
use crate::events::{EventEmitter, LoggingEventEmitter};
use crate::services::{
    Matchmaker, PresenceReporter, Reaper, SessionLocks, SessionService, TurnController,
};
use crate::state::Config;
use crate::store::{MemoryStore, RoomStore, SessionStore, VoiceMessageStore};

/// Storage collaborators handed to [`bootstrap_services_with_stores`].
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub rooms: Arc<dyn RoomStore>,
    pub messages: Arc<dyn VoiceMessageStore>,
}

impl Stores {
    /// All three tables backed by one in-process [`MemoryStore`].
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            sessions: store.clone(),
            rooms: store.clone(),
            messages: store,
        }
    }
}

/// Container for all bootstrapped services.
///
/// This struct holds all the wired services created during bootstrap.
/// It's consumed by `AppState` to build the final application state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Validated configuration.
    pub config: Arc<Config>,
    /// Mints and looks up sessions.
    pub sessions: Arc<SessionService>,
    /// Join, skip, leave and disconnect.
    pub matchmaker: Arc<Matchmaker>,
    /// Read-only status for polling clients.
    pub presence: Arc<PresenceReporter>,
    /// Speaking flag and voice messages.
    pub turns: Arc<TurnController>,
    /// Seat accounting maintenance.
    pub reaper: Arc<Reaper>,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Builds the API state over these services.
    pub fn app_state(&self) -> AppState {
        AppState {
            sessions: Arc::clone(&self.sessions),
            matchmaker: Arc::clone(&self.matchmaker),
            presence: Arc::clone(&self.presence),
            turns: Arc::clone(&self.turns),
            config: Arc::clone(&self.config),
        }
    }

    /// Starts the reaper loop.
    pub fn start_background_tasks(&self) -> JoinHandle<()> {
        log::info!(
            "[Bootstrap] Starting reaper (every {}s)",
            self.config.reaper_interval_secs
        );
        self.reaper.start()
    }

    /// Signals every background task and the HTTP server to stop.
    pub fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.reaper.shutdown();
        self.cancel_token.cancel();
    }
}

/// Bootstraps all services over in-memory storage with a logging emitter.
///
/// # Errors
///
/// Returns [`WalkieError::Configuration`] if the configuration is invalid.
pub fn bootstrap_services(config: Config) -> WalkieResult<BootstrappedServices> {
    bootstrap_services_with_stores(config, Stores::in_memory(), Arc::new(LoggingEventEmitter))
}

/// Bootstraps all services over the given storage collaborators.
pub fn bootstrap_services_with_stores(
    config: Config,
    stores: Stores,
    emitter: Arc<dyn EventEmitter>,
) -> WalkieResult<BootstrappedServices> {
    config.validate().map_err(WalkieError::Configuration)?;

    let locks = Arc::new(SessionLocks::new());

    let sessions = Arc::new(SessionService::new(
        Arc::clone(&stores.sessions),
        Arc::clone(&emitter),
        config.store_timeout(),
    ));

    let matchmaker = Arc::new(Matchmaker::new(
        Arc::clone(&stores.sessions),
        Arc::clone(&stores.rooms),
        Arc::clone(&locks),
        Arc::clone(&emitter),
        &config,
    ));

    let presence = Arc::new(PresenceReporter::new(
        Arc::clone(&stores.sessions),
        Arc::clone(&stores.rooms),
        config.store_timeout(),
    ));

    let turns = Arc::new(TurnController::new(
        Arc::clone(&stores.sessions),
        Arc::clone(&stores.rooms),
        Arc::clone(&stores.messages),
        Arc::clone(&locks),
        Arc::clone(&emitter),
        &config,
    ));

    let reaper = Arc::new(Reaper::new(
        Arc::clone(&stores.sessions),
        Arc::clone(&stores.rooms),
        Arc::clone(&matchmaker),
        locks,
        emitter,
        &config,
    ));

    Ok(BootstrappedServices {
        config: Arc::new(config),
        sessions,
        matchmaker,
        presence,
        turns,
        reaper,
        cancel_token: CancellationToken::new(),
    })
}
