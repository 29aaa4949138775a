//! The deterministic per-input mutation shared by the server, client
//! prediction, and replay.

use meridian_core::{ActionId, ActionParams, ActionPhase, Actions, Button, EntityId, InputState, Store, TickClock};

use crate::physics::integrate_entity;

/// Steers `entity` with `input` through the channeled move action.
///
/// Holding [`Button::Action1`] keeps the sprint running; releasing it
/// cancels the sprint. Sprint is settled first so velocity becomes the
/// normalised input direction times the resulting speed. Returns `false`
/// if the move action could not run.
pub fn apply_input(
    store: &mut Store,
    actions: &mut Actions,
    clock: &TickClock,
    entity: EntityId,
    input: InputState,
) -> bool {
    let sprinting = actions.state(ActionId::Sprint, entity) == Some(ActionPhase::Active);
    if input.is_pressed(Button::Action1) {
        if !sprinting {
            actions.activate(store, clock, ActionId::Sprint, entity, ActionParams::from(input));
        }
    } else if sprinting {
        actions.cancel(store, clock, ActionId::Sprint, entity);
    }
    actions.activate(store, clock, ActionId::Move, entity, ActionParams::from(input))
}

/// [`apply_input`] followed by `steps` integration steps of `delta_ms`.
///
/// This is what one buffered input amounts to during replay: it stays in
/// force until the next input replaces it.
pub fn replay_input(
    store: &mut Store,
    actions: &mut Actions,
    clock: &TickClock,
    entity: EntityId,
    input: InputState,
    delta_ms: f64,
    steps: u32,
) {
    apply_input(store, actions, clock, entity, input);
    for _ in 0..steps {
        integrate_entity(store, entity, delta_ms);
    }
}
