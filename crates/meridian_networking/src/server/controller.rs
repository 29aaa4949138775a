//! Server-side input pacing and sequence bookkeeping.

use std::collections::HashMap;

use meridian_core::EntityId;

use super::ConnectionId;

/// Throttles inputs per connection and remembers the last accepted
/// sequence per entity.
#[derive(Debug, Default)]
pub struct InputController {
    throttle_ms: f64,
    last_accepted: HashMap<ConnectionId, f64>,
    sequences: HashMap<EntityId, u32>,
}

impl InputController {
    /// Creates a controller accepting at most one input per `throttle_ms`.
    #[must_use]
    pub fn new(throttle_ms: f64) -> Self {
        Self {
            throttle_ms,
            ..Self::default()
        }
    }

    /// Decides whether an input arriving at `now` is accepted.
    ///
    /// The first input of a connection is always accepted. Accepted inputs
    /// record `sequence` for `entity`.
    pub fn accept(&mut self, connection: ConnectionId, entity: EntityId, sequence: u32, now: f64) -> bool {
        if let Some(&last) = self.last_accepted.get(&connection) {
            if now - last < self.throttle_ms {
                return false;
            }
        }
        self.last_accepted.insert(connection, now);
        self.sequences.insert(entity, sequence);
        true
    }

    /// Last accepted input sequence for `entity`.
    #[must_use]
    pub fn last_sequence(&self, entity: EntityId) -> Option<u32> {
        self.sequences.get(&entity).copied()
    }

    /// Drops the records of a closed connection.
    pub fn forget(&mut self, connection: ConnectionId, entity: EntityId) {
        self.last_accepted.remove(&connection);
        self.sequences.remove(&entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_window() {
        let mut controller = InputController::new(10.0);
        let (conn, e) = (ConnectionId(1), EntityId::new(1, 0));

        assert!(controller.accept(conn, e, 1, 0.0));
        assert!(!controller.accept(conn, e, 2, 5.0));
        assert_eq!(controller.last_sequence(e), Some(1));
        assert!(controller.accept(conn, e, 3, 10.0));
        assert_eq!(controller.last_sequence(e), Some(3));

        // Throttling is per connection.
        assert!(controller.accept(ConnectionId(2), EntityId::new(2, 0), 1, 10.0));

        controller.forget(conn, e);
        assert_eq!(controller.last_sequence(e), None);
        assert!(controller.accept(conn, e, 4, 11.0));
    }
}
