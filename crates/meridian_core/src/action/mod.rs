//! # Action State Machine
//!
//! Phase-based execution of entity actions, driven by the tick clock.
//!
//! ## Phases
//!
//! ```text
//! Activated:  Idle ─► Startup ─► Active ─► Recovery ─► Cooldown ─► Idle
//! Channeled:  Idle ─► Active ──(cancel / energy / max duration)──► Idle
//! Passive:    Idle ─► Active
//! ```
//!
//! Lifecycle hooks are plain `fn` pointers on the descriptor and run in a
//! fixed order. Every elapsed-time check reads [`TickClock::now`], never
//! wall-clock time.

mod builtin;

pub use builtin::{move_descriptor, regeneration_descriptor, sprint_descriptor, SPRINT_MULTIPLIER};

use std::collections::BTreeMap;

use crate::clock::TickClock;
use crate::ecs::{Energy, EntityId, Stats, Store, Velocity};
use crate::events::Event;
use crate::input::InputState;

/// Closed set of actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ActionId {
    /// Directional movement from input.
    Move = 0,
    /// Speed boost paid for with energy.
    Sprint = 1,
    /// Health and energy regeneration.
    Regeneration = 2,
}

/// Number of actions.
pub const ACTION_COUNT: usize = 3;

impl ActionId {
    /// Every action, ordered by id.
    pub const ALL: [Self; ACTION_COUNT] = [Self::Move, Self::Sprint, Self::Regeneration];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// Execution phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionPhase {
    /// Not running.
    #[default]
    Idle = 0,
    /// Wind-up before the effect.
    Startup = 1,
    /// Effect in progress.
    Active = 2,
    /// Wind-down after the effect.
    Recovery = 3,
    /// Waiting before it can run again.
    Cooldown = 4,
}

/// How an action is driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// Always on once equipped.
    Passive,
    /// Fire-and-forget with timed phases.
    Activated,
    /// Held; active until cancelled.
    Channeled,
    /// Held to charge, released to fire.
    Charged,
    /// Flipped on and off.
    Toggled,
    /// Started by a game event rather than input.
    Triggered,
}

/// Activation preconditions, as bit flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Conditions(u8);

impl Conditions {
    /// No preconditions.
    pub const NONE: Self = Self(0);
    /// Entity must have non-zero velocity.
    pub const MOVING: Self = Self(1);
    /// Entity must have zero velocity.
    pub const STANDING: Self = Self(1 << 1);

    /// Returns `true` if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

/// Parameters passed to [`Actions::activate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionParams {
    /// Input that triggered the action.
    pub input: InputState,
}

impl From<InputState> for ActionParams {
    fn from(input: InputState) -> Self {
        Self { input }
    }
}

/// Per-entity runtime state of one action.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ActionState {
    /// Current phase.
    pub phase: ActionPhase,
    /// Tick-clock time the phase began.
    pub phase_started_at: f64,
    /// Tick-clock time of the last successful activation.
    pub last_activated: f64,
    /// Parameters of the last activation.
    pub params: ActionParams,
}

/// What a hook can see and touch.
pub struct ActionContext<'a> {
    /// Store to mutate.
    pub store: &'a mut Store,
    /// Acting entity.
    pub entity: EntityId,
    /// Action being run.
    pub action: ActionId,
    /// Phase at the time of the call.
    pub phase: ActionPhase,
    /// Parameters of the current activation.
    pub params: ActionParams,
    /// Tick delta in milliseconds (zero outside `tick`).
    pub delta_ms: f64,
}

/// Lifecycle callback.
pub type Hook = fn(&mut ActionContext<'_>);

/// Lifecycle callbacks, called in a fixed order. Any may be `None`.
#[derive(Clone, Copy, Default)]
pub struct Hooks {
    /// Entered the first running phase.
    pub on_activate: Option<Hook>,
    /// Entered Startup.
    pub on_startup: Option<Hook>,
    /// Entered Active from Startup.
    pub on_active: Option<Hook>,
    /// Entered Recovery.
    pub on_recovery: Option<Hook>,
    /// Entered Cooldown.
    pub on_cooldown: Option<Hook>,
    /// Every tick, in any phase.
    pub on_tick: Option<Hook>,
    /// Every tick while a channeled or passive action is Active, and on
    /// every channeled activation.
    pub on_channel_tick: Option<Hook>,
    /// Cancelled.
    pub on_cancel: Option<Hook>,
    /// Returned to Idle by cancellation.
    pub on_deactivate: Option<Hook>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_activate", &self.on_activate.is_some())
            .field("on_startup", &self.on_startup.is_some())
            .field("on_active", &self.on_active.is_some())
            .field("on_recovery", &self.on_recovery.is_some())
            .field("on_cooldown", &self.on_cooldown.is_some())
            .field("on_tick", &self.on_tick.is_some())
            .field("on_channel_tick", &self.on_channel_tick.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .field("on_deactivate", &self.on_deactivate.is_some())
            .finish()
    }
}

fn call(hook: Option<Hook>, ctx: &mut ActionContext<'_>) {
    if let Some(hook) = hook {
        hook(ctx);
    }
}

/// Static definition of an action.
#[derive(Clone, Copy, Debug)]
pub struct ActionDescriptor {
    /// Identifier.
    pub id: ActionId,
    /// Driving model.
    pub kind: ActionKind,
    /// Startup duration in milliseconds.
    pub startup_ms: f64,
    /// Active duration in milliseconds.
    pub active_ms: f64,
    /// Recovery duration in milliseconds.
    pub recovery_ms: f64,
    /// Cooldown duration in milliseconds.
    pub cooldown_ms: f64,
    /// Channel cap in milliseconds (0 = unlimited).
    pub max_channel_ms: f64,
    /// Energy paid on activation.
    pub energy_cost: f32,
    /// Energy drained per second while channeling.
    pub energy_per_second: f32,
    /// Activation preconditions.
    pub conditions: Conditions,
    /// Lifecycle callbacks.
    pub hooks: Hooks,
}

impl ActionDescriptor {
    /// Descriptor with zero durations, no costs, and no hooks.
    #[must_use]
    pub fn new(id: ActionId, kind: ActionKind) -> Self {
        Self {
            id,
            kind,
            startup_ms: 0.0,
            active_ms: 0.0,
            recovery_ms: 0.0,
            cooldown_ms: 0.0,
            max_channel_ms: 0.0,
            energy_cost: 0.0,
            energy_per_second: 0.0,
            conditions: Conditions::NONE,
            hooks: Hooks::default(),
        }
    }
}

type EntityStates = [Option<ActionState>; ACTION_COUNT];

/// Action registry plus per-entity state.
///
/// Descriptors are registered once at startup into a table indexed by
/// [`ActionId`].
#[derive(Debug)]
pub struct Actions {
    descriptors: [Option<ActionDescriptor>; ACTION_COUNT],
    states: BTreeMap<EntityId, EntityStates>,
}

impl Default for Actions {
    fn default() -> Self {
        Self::new()
    }
}

impl Actions {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptors: [None; ACTION_COUNT],
            states: BTreeMap::new(),
        }
    }

    /// Registry with `move`, `sprint`, and `regeneration` registered.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut actions = Self::new();
        actions.register(move_descriptor());
        actions.register(sprint_descriptor());
        actions.register(regeneration_descriptor());
        actions
    }

    /// Registers or replaces a descriptor.
    pub fn register(&mut self, descriptor: ActionDescriptor) {
        self.descriptors[descriptor.id.index()] = Some(descriptor);
    }

    /// Descriptor for `id`, if registered.
    #[must_use]
    pub fn descriptor(&self, id: ActionId) -> Option<&ActionDescriptor> {
        self.descriptors[id.index()].as_ref()
    }

    /// Current phase of `id` on `entity`, or `None` if it never ran.
    #[must_use]
    pub fn state(&self, id: ActionId, entity: EntityId) -> Option<ActionPhase> {
        self.states
            .get(&entity)
            .and_then(|states| states[id.index()])
            .map(|state| state.phase)
    }

    /// Full runtime state of `id` on `entity`.
    #[must_use]
    pub fn runtime(&self, id: ActionId, entity: EntityId) -> Option<&ActionState> {
        self.states
            .get(&entity)
            .and_then(|states| states[id.index()].as_ref())
    }

    /// Drops every state belonging to `entity`.
    pub fn forget(&mut self, entity: EntityId) {
        self.states.remove(&entity);
    }

    /// Tries to start `id` on `entity`.
    ///
    /// Returns `false` if the action is unknown, the entity is stale, or
    /// the action cannot start in its current phase.
    pub fn activate(
        &mut self,
        store: &mut Store,
        clock: &TickClock,
        id: ActionId,
        entity: EntityId,
        params: ActionParams,
    ) -> bool {
        let Some(descriptor) = self.descriptors[id.index()] else {
            tracing::warn!(action = ?id, "action not registered");
            return false;
        };
        if !store.exists(entity) {
            return false;
        }
        let now = clock.now();
        let slot = &mut self.states.entry(entity).or_insert([None; ACTION_COUNT])[id.index()];
        let state = slot.get_or_insert(ActionState {
            phase_started_at: now,
            ..ActionState::default()
        });

        let activated = match descriptor.kind {
            ActionKind::Channeled => activate_channeled(&descriptor, store, entity, state, params, now),
            ActionKind::Activated => activate_timed(&descriptor, store, entity, state, params, now),
            ActionKind::Passive | ActionKind::Triggered => {
                activate_passive(&descriptor, store, entity, state, params, now)
            }
            ActionKind::Charged | ActionKind::Toggled => false,
        };
        if activated {
            store.events_mut().emit(&Event::ActionActivated { entity, action: id });
        }
        activated
    }

    /// Cancels `id` on `entity`, returning it to Idle.
    ///
    /// Returns `false` if the action never ran on this entity.
    pub fn cancel(&mut self, store: &mut Store, clock: &TickClock, id: ActionId, entity: EntityId) -> bool {
        let Some(descriptor) = self.descriptors[id.index()] else {
            return false;
        };
        let Some(state) = self
            .states
            .get_mut(&entity)
            .and_then(|states| states[id.index()].as_mut())
        else {
            return false;
        };
        cancel_state(&descriptor, store, entity, state, clock.now());
        store.events_mut().emit(&Event::ActionCancelled { entity, action: id });
        true
    }

    /// Advances every running action by one tick.
    ///
    /// States of entities that no longer exist are dropped.
    pub fn tick(&mut self, store: &mut Store, clock: &TickClock) {
        self.states.retain(|entity, _| store.exists(*entity));
        let now = clock.now();
        let delta = clock.delta();

        for (&entity, states) in &mut self.states {
            for id in ActionId::ALL {
                let (Some(descriptor), Some(state)) =
                    (self.descriptors[id.index()], states[id.index()].as_mut())
                else {
                    continue;
                };
                let mut ctx = context(&descriptor, store, entity, state, delta);
                call(descriptor.hooks.on_tick, &mut ctx);

                match descriptor.kind {
                    ActionKind::Channeled => tick_channeled(&descriptor, store, entity, state, now, delta),
                    ActionKind::Activated => tick_timed(&descriptor, store, entity, state, now),
                    ActionKind::Passive if state.phase == ActionPhase::Active => {
                        let mut ctx = context(&descriptor, store, entity, state, delta);
                        call(descriptor.hooks.on_channel_tick, &mut ctx);
                    }
                    _ => {}
                }
            }
        }
    }
}

fn context<'a>(
    descriptor: &ActionDescriptor,
    store: &'a mut Store,
    entity: EntityId,
    state: &ActionState,
    delta_ms: f64,
) -> ActionContext<'a> {
    ActionContext {
        store,
        entity,
        action: descriptor.id,
        phase: state.phase,
        params: state.params,
        delta_ms,
    }
}

fn enter(state: &mut ActionState, phase: ActionPhase, now: f64) {
    state.phase = phase;
    state.phase_started_at = now;
}

fn activate_channeled(
    descriptor: &ActionDescriptor,
    store: &mut Store,
    entity: EntityId,
    state: &mut ActionState,
    params: ActionParams,
    now: f64,
) -> bool {
    match state.phase {
        ActionPhase::Idle => {
            enter(state, ActionPhase::Active, now);
            state.params = params;
            state.last_activated = now;
            let mut ctx = context(descriptor, store, entity, state, 0.0);
            call(descriptor.hooks.on_activate, &mut ctx);
            call(descriptor.hooks.on_channel_tick, &mut ctx);
            true
        }
        ActionPhase::Active => {
            state.params = params;
            let mut ctx = context(descriptor, store, entity, state, 0.0);
            call(descriptor.hooks.on_channel_tick, &mut ctx);
            true
        }
        _ => false,
    }
}

fn activate_timed(
    descriptor: &ActionDescriptor,
    store: &mut Store,
    entity: EntityId,
    state: &mut ActionState,
    params: ActionParams,
    now: f64,
) -> bool {
    match state.phase {
        ActionPhase::Idle => {}
        ActionPhase::Cooldown if now - state.phase_started_at >= descriptor.cooldown_ms => {}
        _ => return false,
    }
    if !conditions_met(descriptor, store, entity) {
        return false;
    }
    if !pay_energy(store, entity, descriptor.energy_cost) {
        return false;
    }

    let phase = if descriptor.startup_ms > 0.0 {
        ActionPhase::Startup
    } else {
        ActionPhase::Active
    };
    enter(state, phase, now);
    state.params = params;
    state.last_activated = now;

    let mut ctx = context(descriptor, store, entity, state, 0.0);
    if phase == ActionPhase::Startup {
        call(descriptor.hooks.on_startup, &mut ctx);
    } else {
        call(descriptor.hooks.on_activate, &mut ctx);
        call(descriptor.hooks.on_active, &mut ctx);
    }
    true
}

fn activate_passive(
    descriptor: &ActionDescriptor,
    store: &mut Store,
    entity: EntityId,
    state: &mut ActionState,
    params: ActionParams,
    now: f64,
) -> bool {
    if state.phase != ActionPhase::Idle {
        return false;
    }
    enter(state, ActionPhase::Active, now);
    state.params = params;
    state.last_activated = now;
    let mut ctx = context(descriptor, store, entity, state, 0.0);
    call(descriptor.hooks.on_activate, &mut ctx);
    true
}

fn cancel_state(
    descriptor: &ActionDescriptor,
    store: &mut Store,
    entity: EntityId,
    state: &mut ActionState,
    now: f64,
) {
    let mut ctx = context(descriptor, store, entity, state, 0.0);
    call(descriptor.hooks.on_cancel, &mut ctx);
    call(descriptor.hooks.on_deactivate, &mut ctx);
    enter(state, ActionPhase::Idle, now);
}

fn conditions_met(descriptor: &ActionDescriptor, store: &Store, entity: EntityId) -> bool {
    if descriptor.conditions == Conditions::NONE {
        return true;
    }
    let Some(velocity) = store.get_as::<Velocity>(entity) else {
        return false;
    };
    let moving = velocity.x != 0.0 || velocity.y != 0.0;
    if descriptor.conditions.contains(Conditions::MOVING) && !moving {
        return false;
    }
    if descriptor.conditions.contains(Conditions::STANDING) && moving {
        return false;
    }
    true
}

/// Pays `cost` from the Stats energy pool, or the Energy component if the
/// entity has no Stats.
fn pay_energy(store: &mut Store, entity: EntityId, cost: f32) -> bool {
    if cost <= 0.0 {
        return true;
    }
    if let Some(mut stats) = store.get_as::<Stats>(entity) {
        if stats.energy_current < cost {
            return false;
        }
        stats.energy_current -= cost;
        return store.set_as(entity, stats);
    }
    let Some(mut energy) = store.get_as::<Energy>(entity) else {
        return false;
    };
    if energy.current < cost {
        return false;
    }
    energy.current -= cost;
    store.set_as(entity, energy)
}

#[allow(clippy::cast_possible_truncation)]
fn tick_channeled(
    descriptor: &ActionDescriptor,
    store: &mut Store,
    entity: EntityId,
    state: &mut ActionState,
    now: f64,
    delta: f64,
) {
    if state.phase != ActionPhase::Active {
        return;
    }
    let mut ctx = context(descriptor, store, entity, state, delta);
    call(descriptor.hooks.on_channel_tick, &mut ctx);

    let drain = descriptor.energy_per_second * (delta / 1000.0) as f32;
    if drain > 0.0 && !pay_energy(store, entity, drain) {
        cancel_state(descriptor, store, entity, state, now);
        store.events_mut().emit(&Event::ActionCancelled {
            entity,
            action: descriptor.id,
        });
        return;
    }

    if descriptor.max_channel_ms > 0.0 && now - state.phase_started_at >= descriptor.max_channel_ms {
        cancel_state(descriptor, store, entity, state, now);
        store.events_mut().emit(&Event::ActionCancelled {
            entity,
            action: descriptor.id,
        });
    }
}

fn tick_timed(
    descriptor: &ActionDescriptor,
    store: &mut Store,
    entity: EntityId,
    state: &mut ActionState,
    now: f64,
) {
    if state.phase == ActionPhase::Startup && now - state.phase_started_at >= descriptor.startup_ms {
        advance(descriptor, store, entity, state, ActionPhase::Active, descriptor.hooks.on_active, now);
    }
    if state.phase == ActionPhase::Active && now - state.phase_started_at >= descriptor.active_ms {
        advance(descriptor, store, entity, state, ActionPhase::Recovery, descriptor.hooks.on_recovery, now);
    }
    if state.phase == ActionPhase::Recovery && now - state.phase_started_at >= descriptor.recovery_ms {
        if descriptor.cooldown_ms > 0.0 {
            advance(descriptor, store, entity, state, ActionPhase::Cooldown, descriptor.hooks.on_cooldown, now);
        } else {
            advance(descriptor, store, entity, state, ActionPhase::Idle, None, now);
        }
    }
    if state.phase == ActionPhase::Cooldown && now - state.phase_started_at >= descriptor.cooldown_ms {
        advance(descriptor, store, entity, state, ActionPhase::Idle, None, now);
    }
}

fn advance(
    descriptor: &ActionDescriptor,
    store: &mut Store,
    entity: EntityId,
    state: &mut ActionState,
    phase: ActionPhase,
    hook: Option<Hook>,
    now: f64,
) {
    enter(state, phase, now);
    let mut ctx = context(descriptor, store, entity, state, 0.0);
    call(hook, &mut ctx);
    store.events_mut().emit(&Event::PhaseChanged {
        entity,
        action: descriptor.id,
        phase,
    });
}
