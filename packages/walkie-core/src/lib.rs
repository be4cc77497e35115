//! Walkie Core - matchmaking engine for anonymous push-to-talk rooms.
//!
//! Sessions are paired into two-seat rooms, can skip to a new partner, and
//! exchange opaque voice messages while seated. Clients poll for their room
//! and partner; nothing is pushed.
//!
//! # Architecture
//!
//! - [`model`]: Sessions, rooms and voice messages, with their derived phases
//! - [`store`]: Storage collaborator traits and the in-memory backend
//! - [`services`]: Matchmaker, presence, turn-taking and the maintenance reaper
//! - [`events`]: Domain events and emitters
//! - [`api`]: HTTP routes over the services
//! - [`bootstrap`]: Composition root
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`SessionStore`](store::SessionStore), [`RoomStore`](store::RoomStore) and
//!   [`VoiceMessageStore`](store::VoiceMessageStore): storage with an atomic
//!   conditional update
//! - [`EventEmitter`](events::EventEmitter): Emitting domain events

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod error;
pub mod events;
pub mod model;
pub mod protocol_constants;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_fixtures;

// Re-export commonly used types at the crate root
pub use error::{ErrorCode, WalkieError, WalkieResult};
pub use events::{EventEmitter, LoggingEventEmitter, NoopEventEmitter, RoomEvent, SessionEvent};
pub use model::{Room, RoomPhase, Session, SessionPhase, VoiceMessage};
pub use state::Config;
pub use store::{MemoryStore, RoomStore, SessionStore, StoreError, UpdateOutcome, VoiceMessageStore};
pub use utils::now_millis;

// Re-export service types
pub use services::{
    Matchmaker, PresenceReporter, Reaper, RoomStatus, SessionService, SweepReport, TurnController,
};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, bootstrap_services_with_stores, BootstrappedServices, Stores};

// Re-export API types
pub use api::{start_server, AppState, ServerError};
