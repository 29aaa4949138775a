//! # MERIDIAN Core
//!
//! Shared state engine for server-authoritative multiplayer simulation.
//! Both the server and the client build on the same store, so a client
//! can re-run the exact mutations the server applied.
//!
//! ## Contents
//!
//! - [`Store`]: packed handles, SoA component tables, bitmap queries, and
//!   deferred despawn
//! - [`Bitmap`]: growable bit set with word-wise set algebra
//! - [`Actions`]: phase machine for moves, sprints, and passives
//! - [`EventBus`]: typed subscriptions with limits and deadlines
//! - [`TickClock`]: the only time source simulation code reads
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_core::{ComponentKind, Position, Store, Velocity};
//!
//! let mut store = Store::new(1024);
//! let entity = store.spawn()?;
//! store.insert(entity, Position::new(0.0, 0.0));
//! store.insert(entity, Velocity::new(1.0, 0.0));
//! let moving = store.query_kinds(&[ComponentKind::Position, ComponentKind::Velocity]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod action;
pub mod bitmap;
pub mod clock;
pub mod config;
pub mod ecs;
pub mod error;
pub mod events;
pub mod input;

pub use action::{
    ActionContext, ActionDescriptor, ActionId, ActionKind, ActionParams, ActionPhase, ActionState,
    Actions, Conditions, Hook, Hooks,
};
pub use bitmap::Bitmap;
pub use clock::TickClock;
pub use config::StoreConfig;
pub use ecs::{
    Component, ComponentKind, Energy, EntityId, Filter, Health, Input, Movement, Position, Projectile,
    Rotation, Snapshot, Stats, Store, Velocity,
};
pub use error::{ConfigError, StoreError, StoreResult};
pub use events::{Event, EventBus, EventKind, SubscribeOptions, SubscriptionId};
pub use input::{Button, InputState};
