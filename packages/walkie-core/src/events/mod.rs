//! Domain events emitted by the matchmaking services.
//!
//! This module provides:
//! - [`EventEmitter`] trait for domain services to emit events
//! - Event types for rooms and sessions
//!
//! Events are not pushed to clients; clients poll room status. Emitters exist
//! so the lifecycle of rooms and sessions is observable in logs and tests.

mod emitter;

pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// Events related to room lifecycle and seat changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RoomEvent {
    /// A new room was created holding its first seat.
    Created {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A session took a seat in an existing room.
    Joined {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "memberCount")]
        member_count: u32,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A session gave its seat back.
    Left {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "memberCount")]
        member_count: u32,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The last seat was released and the room went inactive.
    Deactivated {
        #[serde(rename = "roomId")]
        room_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The reaper corrected an over-counted room.
    Repaired {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "previousCount")]
        previous_count: u32,
        #[serde(rename = "memberCount")]
        member_count: u32,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Events related to session state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A new anonymous session was minted.
    Created {
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A session was marked disconnected.
    Disconnected {
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Push-to-talk state toggled.
    SpeakingChanged {
        #[serde(rename = "sessionId")]
        session_id: String,
        speaking: bool,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A voice message record was stored.
    VoiceMessageRecorded {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "roomId")]
        room_id: String,
        sequence: u64,
        #[serde(rename = "durationMs")]
        duration_ms: u32,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}
