//! Fixed constants that should NOT be changed.
//!
//! Clients depend on these values (room size, identifiers on the wire), so
//! they are not part of the tunable [`Config`](crate::state::Config).

// ─────────────────────────────────────────────────────────────────────────────
// Room Model
// ─────────────────────────────────────────────────────────────────────────────

/// Number of seats in every room. The walkie-talkie model is strictly one-to-one.
pub const ROOM_CAPACITY: u32 = 2;

/// Prefix for minted room identifiers.
pub const ROOM_ID_PREFIX: &str = "room-";

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier reported by the health endpoint.
pub const SERVICE_ID: &str = "walkie";
