//! # Physics Boundary
//!
//! The simulation drives physics through [`Physics`]. The bundled
//! [`KinematicPhysics`] only integrates velocity; collision and forces
//! belong to richer implementations.

use meridian_core::{ComponentKind, EntityId, Position, Store, Velocity};

/// Steps the physical state of the store by one tick.
pub trait Physics: Send {
    /// Advances every simulated entity by `delta_ms`.
    fn step(&mut self, store: &mut Store, delta_ms: f64);
}

/// `position += velocity × delta` for every entity with both.
#[derive(Clone, Copy, Debug, Default)]
pub struct KinematicPhysics;

impl Physics for KinematicPhysics {
    fn step(&mut self, store: &mut Store, delta_ms: f64) {
        for entity in store.query_kinds(&[ComponentKind::Position, ComponentKind::Velocity]) {
            integrate_entity(store, entity, delta_ms);
        }
    }
}

/// Integrates one entity's velocity over `delta_ms`.
///
/// Returns `false` if the entity lacks a position or a velocity.
#[allow(clippy::cast_possible_truncation)]
pub fn integrate_entity(store: &mut Store, entity: EntityId, delta_ms: f64) -> bool {
    let (Some(position), Some(velocity)) = (store.get_as::<Position>(entity), store.get_as::<Velocity>(entity))
    else {
        return false;
    };
    if velocity == Velocity::ZERO {
        return true;
    }
    let seconds = (delta_ms / 1000.0) as f32;
    store.set_as(
        entity,
        Position::new(position.x + velocity.x * seconds, position.y + velocity.y * seconds),
    )
}
