//! Built-in action descriptors.

use super::{ActionContext, ActionDescriptor, ActionId, ActionKind, Hooks};
use crate::ecs::{ComponentKind, Energy, Movement, Stats, Velocity};

/// Speed multiplier applied while sprinting.
pub const SPRINT_MULTIPLIER: f32 = 1.5;

/// Energy drained per second while sprinting.
const SPRINT_ENERGY_PER_SECOND: f32 = 10.0;

fn speed_of(ctx: &ActionContext<'_>) -> f32 {
    ctx.store
        .get_as::<Stats>(ctx.entity)
        .map(|s| s.speed)
        .or_else(|| ctx.store.get_as::<Movement>(ctx.entity).map(|m| m.speed))
        .unwrap_or(0.0)
}

fn steer(ctx: &mut ActionContext<'_>) {
    if !ctx.store.has(ctx.entity, ComponentKind::Velocity) {
        return;
    }
    let (x, y) = ctx.params.input.direction();
    let speed = speed_of(ctx);
    ctx.store.set_as(ctx.entity, Velocity::new(x * speed, y * speed));
}

fn halt(ctx: &mut ActionContext<'_>) {
    if ctx.store.has(ctx.entity, ComponentKind::Velocity) {
        ctx.store.set_as(ctx.entity, Velocity::ZERO);
    }
}

/// Channeled movement: velocity is the normalised input direction times speed.
#[must_use]
pub fn move_descriptor() -> ActionDescriptor {
    ActionDescriptor {
        hooks: Hooks {
            on_channel_tick: Some(steer),
            on_deactivate: Some(halt),
            ..Hooks::default()
        },
        ..ActionDescriptor::new(ActionId::Move, ActionKind::Channeled)
    }
}

fn scale_speed(ctx: &mut ActionContext<'_>, boosted: bool) {
    let apply = |speed: f32| {
        if boosted {
            speed * SPRINT_MULTIPLIER
        } else {
            speed / SPRINT_MULTIPLIER
        }
    };
    if let Some(mut stats) = ctx.store.get_as::<Stats>(ctx.entity) {
        stats.speed = apply(stats.speed);
        ctx.store.set_as(ctx.entity, stats);
    } else if let Some(mut movement) = ctx.store.get_as::<Movement>(ctx.entity) {
        movement.speed = apply(movement.speed);
        ctx.store.set_as(ctx.entity, movement);
    }
}

fn boost(ctx: &mut ActionContext<'_>) {
    scale_speed(ctx, true);
}

fn unboost(ctx: &mut ActionContext<'_>) {
    scale_speed(ctx, false);
}

/// Channeled sprint: raises Stats or Movement speed, drains energy until
/// cancelled or empty.
#[must_use]
pub fn sprint_descriptor() -> ActionDescriptor {
    ActionDescriptor {
        energy_per_second: SPRINT_ENERGY_PER_SECOND,
        hooks: Hooks {
            on_activate: Some(boost),
            on_deactivate: Some(unboost),
            ..Hooks::default()
        },
        ..ActionDescriptor::new(ActionId::Sprint, ActionKind::Channeled)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn regenerate(ctx: &mut ActionContext<'_>) {
    let seconds = (ctx.delta_ms / 1000.0) as f32;
    if let Some(mut stats) = ctx.store.get_as::<Stats>(ctx.entity) {
        let health = (stats.health_current + stats.health_regeneration * seconds).min(stats.health_maximum);
        let energy = (stats.energy_current + stats.energy_regeneration * seconds).min(stats.energy_maximum);
        if health != stats.health_current || energy != stats.energy_current {
            stats.health_current = health;
            stats.energy_current = energy;
            ctx.store.set_as(ctx.entity, stats);
        }
    }
    if let Some(mut energy) = ctx.store.get_as::<Energy>(ctx.entity) {
        if energy.current < energy.maximum {
            energy.current = (energy.current + energy.regeneration * seconds).min(energy.maximum);
            ctx.store.set_as(ctx.entity, energy);
        }
    }
}

/// Passive regeneration of Stats health and energy and of the Energy
/// component, each up to its maximum.
#[must_use]
pub fn regeneration_descriptor() -> ActionDescriptor {
    ActionDescriptor {
        hooks: Hooks {
            on_channel_tick: Some(regenerate),
            ..Hooks::default()
        },
        ..ActionDescriptor::new(ActionId::Regeneration, ActionKind::Passive)
    }
}
