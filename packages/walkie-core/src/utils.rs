//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::protocol_constants::ROOM_ID_PREFIX;

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Mints an opaque session identifier.
#[must_use]
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Mints an opaque room identifier.
#[must_use]
pub fn new_room_id() -> String {
    format!("{}{}", ROOM_ID_PREFIX, Uuid::new_v4())
}

/// Mints an opaque voice message identifier.
#[must_use]
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}
