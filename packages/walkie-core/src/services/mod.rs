//! Application services layer.
//!
//! This module contains the matchmaking and turn-taking services that sit
//! between the API layer and the storage collaborators (store/).

mod bounded;
pub mod matchmaker;
pub mod presence;
pub mod reaper;
pub(crate) mod session_locks;
pub mod session_service;
pub mod turn_controller;

pub use matchmaker::Matchmaker;
pub use presence::{PresenceReporter, RoomStatus};
pub use reaper::{Reaper, SweepReport};
pub use session_locks::SessionLocks;
pub use session_service::SessionService;
pub use turn_controller::TurnController;
