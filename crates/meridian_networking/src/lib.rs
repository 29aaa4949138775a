//! # MERIDIAN Networking
//!
//! Server-authoritative state synchronization over a byte-level protocol.
//!
//! ## Architecture
//!
//! ```text
//! SERVER                                          CLIENT
//!   │                                               │
//!   │<──── Input [seq][buttons][mouse] ─────────────│  apply locally, buffer
//!   │  throttle, apply                              │
//!   │  actions, physics, interest grid              │
//!   │                                               │
//!   │───── Entities (observer diff) ───────────────>│  spawn / despawn mirrors
//!   │───── Position, Velocity, ... (SoA, deltas) ──>│  capture authoritative view
//!   │───── Acknowledge [seq] ──────────────────────>│  reconcile: lerp or replay
//! ```
//!
//! The server and each client own separate stores. Only framed bytes cross
//! between them, carried by bounded crossbeam channels.
//!
//! ## Example
//!
//! ```rust,ignore
//! use meridian_networking::{Client, MeridianConfig, RandomWalkInput, Server, ConnectionId};
//!
//! let config = MeridianConfig::default();
//! let (mut server, outbox) = Server::new(config.clone());
//! let (mut client, link) = Client::new(config, Box::new(RandomWalkInput::new(7)));
//! server.handle().connect(ConnectionId(1))?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod config;
pub mod delta;
pub mod entity_map;
pub mod error;
pub mod interest;
pub mod logging;
pub mod loopback;
pub mod physics;
pub mod protocol;
pub mod server;
pub mod simulation;
pub mod tick;

pub use client::{
    Client, ClientController, ClientLink, ClientState, ClientStats, InputSource, Interpolation, Prediction,
    RandomWalkInput, ReconciliationResult, ScriptedInput, Track,
};
pub use config::MeridianConfig;
pub use delta::{owned_by, DeltaTracker};
pub use entity_map::EntityMap;
pub use error::{DecodeError, DecodeResult, NetError, NetResult};
pub use interest::InterestGrid;
pub use logging::init_logging;
pub use loopback::{Loopback, Peer};
pub use physics::{integrate_entity, KinematicPhysics, Physics};
pub use protocol::{CodecRegistry, MessageKind, ObserverCodec, SoaCodec};
pub use server::{ConnectionId, Outgoing, Server, ServerEvent, ServerHandle, ServerStats};
pub use simulation::{apply_input, replay_input};
pub use tick::{TickLoop, TickStats};
