//! Storage collaborators for sessions, rooms and voice messages.
//!
//! Services depend on the traits in [`traits`], never on a concrete backend.
//! The only primitive a backend must provide beyond get/insert is an atomic
//! conditional update: the predicate is checked and the mutation applied in
//! one indivisible step. [`MemoryStore`] implements all three traits.

mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{RoomStore, SessionStore, VoiceMessageStore};

use thiserror::Error;

/// Errors reported by a storage backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable or refusing requests.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Backend did not answer in time.
    #[error("store operation timed out")]
    Timeout,

    /// Insert collided with an existing key.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
}

/// Convenient Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome<T> {
    /// Predicate held; carries the post-update row.
    Updated(T),
    /// Predicate failed; carries the row as it currently is.
    NoMatch(T),
    /// No row with that id.
    Missing,
}

impl<T> UpdateOutcome<T> {
    /// Returns the post-update row if the update was applied.
    pub fn updated(self) -> Option<T> {
        match self {
            Self::Updated(row) => Some(row),
            Self::NoMatch(_) | Self::Missing => None,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}
