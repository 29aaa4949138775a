//! # Delta Tracking
//!
//! Per connection, the last values sent for each `(entity, kind)`.
//!
//! A component is resent only when some field moved by at least the
//! kind's threshold since the last send, or it was never sent at all.
//! State lives until the connection closes or the entity is despawned.

use std::collections::HashMap;

use meridian_core::{ComponentKind, EntityId, Store};

use crate::config::Thresholds;
use crate::server::ConnectionId;

type SentValues = HashMap<(EntityId, ComponentKind), Vec<f64>>;

/// Last-sent values for every connection.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    thresholds: Thresholds,
    sent: HashMap<ConnectionId, SentValues>,
}

impl DeltaTracker {
    /// Creates a tracker with per-kind dead-bands.
    #[must_use]
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            sent: HashMap::new(),
        }
    }

    /// Dead-bands in use.
    #[must_use]
    pub const fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Number of connections with recorded state.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.sent.len()
    }

    /// Returns `true` if `kind` on `entity` should be resent to `connection`.
    ///
    /// Kinds without a threshold compare exactly. An entity missing the
    /// component is never dirty.
    #[must_use]
    pub fn is_dirty(&self, connection: ConnectionId, store: &Store, entity: EntityId, kind: ComponentKind) -> bool {
        let Some(current) = store.get(entity, kind) else {
            return false;
        };
        let Some(last) = self.sent.get(&connection).and_then(|s| s.get(&(entity, kind))) else {
            return true;
        };
        if last.len() != current.len() {
            return true;
        }
        match self.thresholds.get(kind) {
            Some(threshold) => current
                .iter()
                .zip(last)
                .any(|(cur, prev)| (cur - prev).abs() >= threshold),
            None => current != *last,
        }
    }

    /// Stores the current values of `kind` on `entity` as sent to `connection`.
    pub fn record(&mut self, connection: ConnectionId, store: &Store, entity: EntityId, kind: ComponentKind) {
        if let Some(values) = store.get(entity, kind) {
            self.sent
                .entry(connection)
                .or_default()
                .insert((entity, kind), values);
        }
    }

    /// Drops everything recorded for `connection`.
    pub fn forget_connection(&mut self, connection: ConnectionId) {
        self.sent.remove(&connection);
    }

    /// Drops every record of `entity` across connections.
    pub fn forget_entity(&mut self, entity: EntityId) {
        for sent in self.sent.values_mut() {
            sent.retain(|(e, _), _| *e != entity);
        }
    }
}

/// Returns `true` if any owner-carrying component of `entity` names `owner`.
///
/// Clients predict what they own, so those components are not replicated
/// back to them.
#[must_use]
pub fn owned_by(store: &Store, entity: EntityId, owner: EntityId) -> bool {
    ComponentKind::ALL.iter().any(|&kind| {
        kind.owner_field()
            .and_then(|field| store.get_field(entity, kind, field))
            .is_some_and(|value| value == f64::from(owner.to_bits()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::{Position, Projectile};

    fn setup() -> (Store, EntityId, DeltaTracker) {
        let mut store = Store::new(8);
        let e = store.spawn().unwrap();
        store.insert(e, Position::new(0.0, 0.0));
        (store, e, DeltaTracker::new(Thresholds::default()))
    }

    #[test]
    fn test_never_sent_is_dirty() {
        let (store, e, tracker) = setup();
        assert!(tracker.is_dirty(ConnectionId(1), &store, e, ComponentKind::Position));
        assert!(!tracker.is_dirty(ConnectionId(1), &store, e, ComponentKind::Velocity));
    }

    #[test]
    fn test_threshold_boundary() {
        let (mut store, e, mut tracker) = setup();
        let conn = ConnectionId(1);
        tracker.record(conn, &store, e, ComponentKind::Position);
        assert!(!tracker.is_dirty(conn, &store, e, ComponentKind::Position));

        store.set_as(e, Position::new(0.5, 0.0));
        assert!(!tracker.is_dirty(conn, &store, e, ComponentKind::Position));

        store.set_as(e, Position::new(1.0, 0.0));
        assert!(tracker.is_dirty(conn, &store, e, ComponentKind::Position));

        tracker.record(conn, &store, e, ComponentKind::Position);
        assert!(!tracker.is_dirty(conn, &store, e, ComponentKind::Position));
        // Another connection has its own record.
        assert!(tracker.is_dirty(ConnectionId(2), &store, e, ComponentKind::Position));
    }

    #[test]
    fn test_forget_purges() {
        let (store, e, mut tracker) = setup();
        tracker.record(ConnectionId(1), &store, e, ComponentKind::Position);
        tracker.record(ConnectionId(2), &store, e, ComponentKind::Position);

        tracker.forget_connection(ConnectionId(1));
        assert_eq!(tracker.connections(), 1);
        assert!(tracker.is_dirty(ConnectionId(1), &store, e, ComponentKind::Position));

        tracker.forget_entity(e);
        assert!(tracker.is_dirty(ConnectionId(2), &store, e, ComponentKind::Position));
    }

    #[test]
    fn test_owned_by() {
        let mut store = Store::new(8);
        let shooter = store.spawn().unwrap();
        let other = store.spawn().unwrap();
        let bullet = store.spawn().unwrap();
        store.insert(
            bullet,
            Projectile {
                owner: shooter.to_bits(),
                damage: 5.0,
                lifetime: 1000.0,
                spawned_at: 0.0,
            },
        );
        assert!(owned_by(&store, bullet, shooter));
        assert!(!owned_by(&store, bullet, other));
        assert!(!owned_by(&store, shooter, shooter));
    }
}
