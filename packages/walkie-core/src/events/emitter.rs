//! Event emitter abstraction for decoupling services from observers.
//!
//! Services depend on the [`EventEmitter`] trait rather than a concrete sink,
//! enabling testing and alternative observers.

use super::{RoomEvent, SessionEvent};

/// Trait for emitting domain events without knowledge of the observer.
pub trait EventEmitter: Send + Sync {
    /// Emits a room lifecycle event.
    fn emit_room(&self, event: RoomEvent);

    /// Emits a session state event.
    fn emit_session(&self, event: SessionEvent);
}

/// No-op emitter for tests and embedders that don't observe events.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_room(&self, _event: RoomEvent) {}

    fn emit_session(&self, _event: SessionEvent) {}
}

/// Logging emitter used by the standalone server.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_room(&self, event: RoomEvent) {
        tracing::debug!(?event, "room_event");
    }

    fn emit_session(&self, event: SessionEvent) {
        tracing::debug!(?event, "session_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::RecordingEventEmitter;

    #[test]
    fn recording_emitter_tracks_events() {
        let emitter = RecordingEventEmitter::default();

        emitter.emit_room(RoomEvent::Deactivated {
            room_id: "room-1".into(),
            timestamp: 0,
        });
        emitter.emit_session(SessionEvent::Created {
            session_id: "s1".into(),
            timestamp: 0,
        });
        emitter.emit_session(SessionEvent::Disconnected {
            session_id: "s1".into(),
            timestamp: 0,
        });

        assert_eq!(emitter.room_events().len(), 1);
        assert_eq!(emitter.session_events().len(), 2);
    }

    #[test]
    fn noop_emitter_accepts_events() {
        NoopEventEmitter.emit_room(RoomEvent::Deactivated {
            room_id: "room-1".into(),
            timestamp: 0,
        });
    }
}
