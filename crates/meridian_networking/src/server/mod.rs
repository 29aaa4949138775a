//! # Authoritative Server
//!
//! Owns the one true store and replicates it to connections.
//!
//! ## Tick
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ drain inbox  │──►│ actions +    │──►│ interest     │──►│ sync every N │
//! │ (connect,    │   │ physics      │   │ grid refresh │   │ ticks, flush │
//! │  input, ...) │   │              │   │              │   │ on cadence   │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Sync pass, per connection
//!
//! 1. Interest: replicated entities in the grid cells around its entity
//! 2. Membership: observer codec diff, sent as one `Entities` frame
//! 3. Values: per component kind, the visible entities that are not owned
//!    by the connection's entity and moved past the delta threshold
//! 4. `Acknowledge` with the last input sequence applied for its entity
//!
//! The transport is a pair of bounded crossbeam channels: [`ServerEvent`]s
//! in, [`Outgoing`] frames out. Nothing in the tick blocks.

mod connection;
mod controller;

pub use connection::{Connection, ConnectionId};
pub use controller::InputController;

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use meridian_core::{
    ActionId, ActionParams, Actions, ComponentKind, Energy, EntityId, Event, Health, Input, Movement, Position,
    Rotation, Store, StoreResult, TickClock, Velocity,
};
use parking_lot::RwLock;

use crate::config::MeridianConfig;
use crate::delta::{owned_by, DeltaTracker};
use crate::error::{DecodeError, NetError, NetResult};
use crate::interest::InterestGrid;
use crate::physics::{KinematicPhysics, Physics};
use crate::protocol::{self, encode_acknowledge, encode_connected, CodecRegistry, InputMessage, MessageKind};
use crate::simulation::apply_input;

/// Where new players appear.
pub const SPAWN_POSITION: Position = Position::new(50.0, 25.0);

/// Starting and maximum player health.
pub const PLAYER_HEALTH: f32 = 100.0;

/// Player movement speed in units per second.
pub const PLAYER_SPEED: f32 = 6.0;

/// Starting and maximum player energy.
pub const PLAYER_ENERGY: f32 = 100.0;

/// Player energy regained per second.
pub const PLAYER_ENERGY_REGENERATION: f32 = 5.0;

/// What the transport tells the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client connected.
    Connected(ConnectionId),
    /// A client went away.
    Disconnected(ConnectionId),
    /// A client sent a frame.
    Message {
        /// Sender.
        connection: ConnectionId,
        /// Raw frame.
        bytes: Vec<u8>,
    },
}

/// A frame for the transport to deliver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
    /// Recipient.
    pub connection: ConnectionId,
    /// Raw frame.
    pub bytes: Vec<u8>,
}

/// Counters published after every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Ticks run.
    pub tick: u64,
    /// Open connections.
    pub connections: usize,
    /// Live entities.
    pub entities: usize,
    /// Frames handed to the outbox.
    pub frames_sent: u64,
    /// Bytes handed to the outbox.
    pub bytes_sent: u64,
    /// Frames the outbox refused.
    pub frames_dropped: u64,
    /// Inbound frames that failed to decode.
    pub decode_errors: u64,
    /// Inputs rejected by the throttle.
    pub inputs_throttled: u64,
}

/// Cloneable handle for the transport side.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    inbox: Sender<ServerEvent>,
    stats: Arc<RwLock<ServerStats>>,
}

impl ServerHandle {
    /// Queues an event for the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::ChannelFull`] when the inbox is at capacity and
    /// [`NetError::ChannelClosed`] when the server is gone.
    pub fn send(&self, event: ServerEvent) -> NetResult<()> {
        self.inbox.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => NetError::ChannelFull,
            TrySendError::Disconnected(_) => NetError::ChannelClosed,
        })
    }

    /// Queues a connect.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send).
    pub fn connect(&self, connection: ConnectionId) -> NetResult<()> {
        self.send(ServerEvent::Connected(connection))
    }

    /// Queues a disconnect.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send).
    pub fn disconnect(&self, connection: ConnectionId) -> NetResult<()> {
        self.send(ServerEvent::Disconnected(connection))
    }

    /// Queues a received frame.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send).
    pub fn deliver(&self, connection: ConnectionId, bytes: Vec<u8>) -> NetResult<()> {
        self.send(ServerEvent::Message { connection, bytes })
    }

    /// Stats as of the last completed tick.
    #[must_use]
    pub fn stats(&self) -> ServerStats {
        *self.stats.read()
    }
}

/// Spawns a player entity with its starting components.
///
/// # Errors
///
/// Returns [`StoreError::CapacityExhausted`](meridian_core::StoreError::CapacityExhausted)
/// when no handle is left.
pub fn spawn_player(store: &mut Store) -> StoreResult<EntityId> {
    let entity = store.spawn()?;
    store.add(entity, ComponentKind::Sync, None);
    store.insert(entity, Input::default());
    store.insert(entity, SPAWN_POSITION);
    store.insert(entity, Velocity::ZERO);
    store.insert(entity, Rotation::default());
    store.insert(
        entity,
        Health {
            current: PLAYER_HEALTH,
            maximum: PLAYER_HEALTH,
        },
    );
    store.insert(
        entity,
        Energy {
            current: PLAYER_ENERGY,
            maximum: PLAYER_ENERGY,
            regeneration: PLAYER_ENERGY_REGENERATION,
        },
    );
    store.insert(entity, Movement { speed: PLAYER_SPEED });
    tracing::debug!(%entity, "spawned player");
    Ok(entity)
}

/// The authoritative simulation and its connections.
pub struct Server {
    config: MeridianConfig,
    store: Store,
    clock: TickClock,
    actions: Actions,
    physics: Box<dyn Physics>,
    registry: CodecRegistry,
    delta: DeltaTracker,
    grid: InterestGrid,
    controller: InputController,
    connections: BTreeMap<ConnectionId, Connection>,
    inbox: Receiver<ServerEvent>,
    inbox_tx: Sender<ServerEvent>,
    outbox: Sender<Outgoing>,
    stats: ServerStats,
    shared_stats: Arc<RwLock<ServerStats>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("frame", &self.clock.frame())
            .field("connections", &self.connections.len())
            .field("entities", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server with kinematic physics.
    ///
    /// Returns the server and the receiving end of its outbox.
    #[must_use]
    pub fn new(config: MeridianConfig) -> (Self, Receiver<Outgoing>) {
        Self::with_physics(config, Box::new(KinematicPhysics))
    }

    /// Creates a server driving the given physics.
    #[must_use]
    pub fn with_physics(config: MeridianConfig, physics: Box<dyn Physics>) -> (Self, Receiver<Outgoing>) {
        let capacity = config.channels.inbox_capacity;
        let (inbox_tx, inbox) = bounded(capacity);
        let (outbox, outbox_rx) = bounded(capacity);
        let server = Self {
            store: Store::from_config(&config.store),
            clock: TickClock::new(),
            actions: Actions::with_builtin(),
            physics,
            registry: CodecRegistry::new(),
            delta: DeltaTracker::new(config.sync.thresholds),
            grid: InterestGrid::new(&config.interest),
            controller: InputController::new(config.input.server_throttle_ms),
            connections: BTreeMap::new(),
            inbox,
            inbox_tx,
            outbox,
            stats: ServerStats::default(),
            shared_stats: Arc::new(RwLock::new(ServerStats::default())),
            config,
        };
        (server, outbox_rx)
    }

    /// Handle for feeding the inbox from other threads.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            inbox: self.inbox_tx.clone(),
            stats: Arc::clone(&self.shared_stats),
        }
    }

    /// Authoritative store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Mutable store, for seeding world entities.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Tick clock.
    #[must_use]
    pub const fn clock(&self) -> &TickClock {
        &self.clock
    }

    /// Stats as of the last completed tick.
    #[must_use]
    pub const fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Open connection, if any.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Delta state, for inspection.
    #[must_use]
    pub const fn delta(&self) -> &DeltaTracker {
        &self.delta
    }

    /// Interest grid, for inspection.
    #[must_use]
    pub const fn grid(&self) -> &InterestGrid {
        &self.grid
    }

    /// Runs one tick of `delta_ms`.
    pub fn tick(&mut self, delta_ms: f64) {
        self.clock.advance(delta_ms);

        while let Ok(event) = self.inbox.try_recv() {
            self.handle_event(event);
        }

        self.actions.tick(&mut self.store, &self.clock);
        self.physics.step(&mut self.store, self.clock.delta());
        self.grid.refresh(&self.store);

        if self.clock.every(self.config.sync.sync_interval) {
            self.sync();
        }

        if self.clock.every(self.config.store.despawn_interval) {
            for entity in self.store.flush() {
                self.delta.forget_entity(entity);
            }
        }
        self.store.events_mut().expire(self.clock.now());

        self.stats.tick = self.clock.frame();
        self.stats.connections = self.connections.len();
        self.stats.entities = self.store.len();
        *self.shared_stats.write() = self.stats;
    }

    fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected(id) => self.connect(id),
            ServerEvent::Disconnected(id) => self.disconnect(id),
            ServerEvent::Message { connection, bytes } => {
                if let Err(err) = self.handle_message(connection, &bytes) {
                    self.stats.decode_errors += 1;
                    tracing::warn!(%connection, %err, len = bytes.len(), "dropped message");
                }
            }
        }
    }

    fn connect(&mut self, id: ConnectionId) {
        if self.connections.contains_key(&id) {
            tracing::debug!(connection = %id, "duplicate connect ignored");
            return;
        }
        let entity = match spawn_player(&mut self.store) {
            Ok(entity) => entity,
            Err(err) => {
                tracing::warn!(connection = %id, %err, "refused connection");
                return;
            }
        };
        self.actions.activate(
            &mut self.store,
            &self.clock,
            ActionId::Regeneration,
            entity,
            ActionParams::default(),
        );
        self.connections.insert(id, Connection::new(id, entity));
        push(&self.outbox, &mut self.stats, id, encode_connected(entity.to_bits()));
        self.store.events_mut().emit(&Event::Connected { entity });
        tracing::info!(connection = %id, %entity, "client connected");
    }

    fn disconnect(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.remove(&id) else {
            return;
        };
        let entity = connection.entity;
        self.store.despawn(entity);
        self.actions.forget(entity);
        self.delta.forget_connection(id);
        self.delta.forget_entity(entity);
        self.grid.remove(entity);
        self.controller.forget(id, entity);
        self.store.events_mut().emit(&Event::Disconnected {
            connection: id.0,
            entity,
        });
        tracing::info!(connection = %id, %entity, "client disconnected");
    }

    fn handle_message(&mut self, id: ConnectionId, bytes: &[u8]) -> NetResult<()> {
        let (kind, payload) = protocol::parse(bytes)?;
        if kind != MessageKind::Input {
            return Err(DecodeError::Unexpected(kind as u8).into());
        }
        let message = InputMessage::decode(payload)?;
        let Some(entity) = self.connections.get(&id).map(|c| c.entity) else {
            tracing::debug!(connection = %id, "input from unknown connection");
            return Ok(());
        };

        if !self
            .controller
            .accept(id, entity, message.sequence, self.clock.now())
        {
            self.stats.inputs_throttled += 1;
            self.store.events_mut().emit(&Event::InputThrottled {
                connection: id.0,
                entity,
            });
            tracing::warn!(connection = %id, sequence = message.sequence, "input throttled");
            return Ok(());
        }

        self.store.set_as(
            entity,
            Input {
                sequence: message.sequence,
                buttons: message.input.buttons,
                _padding: 0,
            },
        );
        self.store.events_mut().emit(&Event::InputReceived {
            connection: id.0,
            entity,
            sequence: message.sequence,
        });
        apply_input(&mut self.store, &mut self.actions, &self.clock, entity, message.input);
        Ok(())
    }

    fn sync(&mut self) {
        let Self {
            store,
            registry,
            delta,
            grid,
            controller,
            connections,
            outbox,
            stats,
            ..
        } = self;
        let store = &*store;

        for connection in connections.values_mut() {
            let Some(origin) = store.get_as::<Position>(connection.entity) else {
                continue;
            };
            let visible: Vec<EntityId> = grid
                .nearby(f64::from(origin.x), f64::from(origin.y))
                .into_iter()
                .filter(|e| store.has(*e, ComponentKind::Sync))
                .collect();

            let membership = connection.observer.serialize(store, &visible);
            if !membership.is_empty() {
                push(outbox, stats, connection.id, protocol::frame(MessageKind::Entities, &membership));
            }

            let mut records = 0usize;
            for (message, codec) in registry.iter() {
                let kind = codec.kind();
                let changed: Vec<EntityId> = visible
                    .iter()
                    .copied()
                    .filter(|&e| {
                        store.has(e, kind)
                            && !owned_by(store, e, connection.entity)
                            && delta.is_dirty(connection.id, store, e, kind)
                    })
                    .collect();
                if changed.is_empty() {
                    continue;
                }
                let payload = codec.serialize(store, &changed);
                push(outbox, stats, connection.id, protocol::frame(message, &payload));
                for entity in &changed {
                    delta.record(connection.id, store, *entity, kind);
                }
                records += changed.len();
            }

            let ack = controller.last_sequence(connection.entity).unwrap_or(0);
            push(outbox, stats, connection.id, encode_acknowledge(ack));
            tracing::trace!(connection = %connection.id, visible = visible.len(), records, "synced");
        }
    }
}

fn push(outbox: &Sender<Outgoing>, stats: &mut ServerStats, connection: ConnectionId, bytes: Vec<u8>) {
    let len = bytes.len() as u64;
    match outbox.try_send(Outgoing { connection, bytes }) {
        Ok(()) => {
            stats.frames_sent += 1;
            stats.bytes_sent += len;
        }
        Err(TrySendError::Full(_)) => {
            stats.frames_dropped += 1;
            tracing::warn!(%connection, "outbox full, frame dropped");
        }
        Err(TrySendError::Disconnected(_)) => {
            stats.frames_dropped += 1;
            tracing::trace!(%connection, "outbox closed");
        }
    }
}
