//! # Client
//!
//! Mirrors the server's replicated entities and predicts its own.
//!
//! ## Tick
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ drain inbox  │──►│ reconcile    │──►│ sample input │──►│ physics,     │
//! │ (membership, │   │ local entity │   │ send + apply │   │ smooth remote│
//! │  values, ack)│   │              │   │ + buffer     │   │ flush        │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Values arriving for the local entity are not applied directly. They are
//! captured as the authoritative view and the predicted state is put back;
//! the next `Acknowledge` hands that view to prediction.

mod controller;
mod input;
mod interpolation;
mod prediction;

pub use controller::ClientController;
pub use input::{InputSource, RandomWalkInput, ScriptedInput};
pub use interpolation::{Interpolation, Track};
pub use prediction::{divergence, sequence_after, HistoryEntry, Prediction, ReconciliationResult};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use meridian_core::{ActionId, ActionParams, Actions, EntityId, Event, Snapshot, Store, TickClock};

use crate::config::MeridianConfig;
use crate::entity_map::EntityMap;
use crate::error::{DecodeError, NetError, NetResult};
use crate::physics::{KinematicPhysics, Physics};
use crate::protocol::{self, decode_acknowledge, decode_connected, CodecRegistry, InputMessage, MessageKind, ObserverCodec};
use crate::simulation::apply_input;

/// Where the client is in its session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientState {
    /// No entity assigned yet.
    #[default]
    Disconnected,
    /// Entity assigned but not yet mirrored.
    Connected,
    /// Controlled entity exists locally.
    Synced,
}

/// Transport ends of a client's channels.
#[derive(Clone, Debug)]
pub struct ClientLink {
    /// Frames from the server go here.
    pub to_client: Sender<Vec<u8>>,
    /// Frames for the server come out here.
    pub from_client: Receiver<Vec<u8>>,
}

/// Client counters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClientStats {
    /// Ticks run.
    pub tick: u64,
    /// Frames drained from the inbox.
    pub frames_received: u64,
    /// Frames that failed to decode.
    pub decode_errors: u64,
    /// Inputs sent.
    pub inputs_sent: u64,
    /// Smoothing corrections.
    pub soft_corrections: u64,
    /// Rollback corrections.
    pub hard_corrections: u64,
    /// Divergence measured by the last check.
    pub last_divergence: f64,
}

/// A predicting client.
pub struct Client {
    config: MeridianConfig,
    store: Store,
    clock: TickClock,
    actions: Actions,
    physics: Box<dyn Physics>,
    registry: CodecRegistry,
    map: EntityMap,
    controller: ClientController,
    prediction: Prediction,
    interpolation: Interpolation,
    source: Box<dyn InputSource>,
    server_entity: Option<u32>,
    authoritative: Snapshot,
    fresh: bool,
    inbox: Receiver<Vec<u8>>,
    outbox: Sender<Vec<u8>>,
    stats: ClientStats,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("frame", &self.clock.frame())
            .field("state", &self.state())
            .field("entities", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client sampling `source` with kinematic physics.
    #[must_use]
    pub fn new(config: MeridianConfig, source: Box<dyn InputSource>) -> (Self, ClientLink) {
        Self::with_physics(config, source, Box::new(KinematicPhysics))
    }

    /// Creates a client driving the given physics.
    #[must_use]
    pub fn with_physics(
        config: MeridianConfig,
        source: Box<dyn InputSource>,
        physics: Box<dyn Physics>,
    ) -> (Self, ClientLink) {
        let capacity = config.channels.inbox_capacity;
        let (to_client, inbox) = bounded(capacity);
        let (outbox, from_client) = bounded(capacity);
        let client = Self {
            store: Store::from_config(&config.store),
            clock: TickClock::new(),
            actions: Actions::with_builtin(),
            physics,
            registry: CodecRegistry::new(),
            map: EntityMap::new(),
            controller: ClientController::new(&config.input),
            prediction: Prediction::new(config.prediction),
            interpolation: Interpolation::new(config.interpolation),
            source,
            server_entity: None,
            authoritative: Snapshot::new(),
            fresh: false,
            inbox,
            outbox,
            stats: ClientStats::default(),
            config,
        };
        (client, ClientLink { to_client, from_client })
    }

    /// Session state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        match (self.server_entity, self.local_entity()) {
            (None, _) => ClientState::Disconnected,
            (Some(_), None) => ClientState::Connected,
            (Some(_), Some(_)) => ClientState::Synced,
        }
    }

    /// Local mirror of the server store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Mutable local store, for presentation-side subscriptions.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// Server-side id of the controlled entity.
    #[must_use]
    pub const fn server_entity(&self) -> Option<u32> {
        self.server_entity
    }

    /// Local handle of the controlled entity, once mirrored.
    #[must_use]
    pub fn local_entity(&self) -> Option<EntityId> {
        self.server_entity
            .and_then(|remote| self.map.local(remote))
            .filter(|e| self.store.exists(*e))
    }

    /// Server-to-local id map.
    #[must_use]
    pub const fn entity_map(&self) -> &EntityMap {
        &self.map
    }

    /// Prediction state.
    #[must_use]
    pub const fn prediction(&self) -> &Prediction {
        &self.prediction
    }

    /// Smoothing state of remote entities.
    #[must_use]
    pub const fn interpolation(&self) -> &Interpolation {
        &self.interpolation
    }

    /// Counters.
    #[must_use]
    pub const fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Runs one tick of `delta_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::ChannelClosed`] when the server side of the link is gone.
    pub fn tick(&mut self, delta_ms: f64) -> NetResult<()> {
        self.clock.advance(delta_ms);

        while let Ok(bytes) = self.inbox.try_recv() {
            self.stats.frames_received += 1;
            if let Err(err) = self.handle_frame(&bytes) {
                self.stats.decode_errors += 1;
                tracing::warn!(%err, len = bytes.len(), "dropped server frame");
            }
        }

        let local = self.local_entity();
        if let Some(entity) = local {
            self.reconcile(entity);
            self.regenerate(entity);
        }

        self.actions.tick(&mut self.store, &self.clock);

        let sent = match local {
            Some(entity) => self.send_input(entity),
            None => Ok(()),
        };

        self.physics.step(&mut self.store, self.clock.delta());
        self.interpolation.update(&self.store, local);

        if self.clock.every(self.config.store.despawn_interval) {
            self.store.flush();
        }
        self.store.events_mut().expire(self.clock.now());
        self.stats.tick = self.clock.frame();
        sent
    }

    fn reconcile(&mut self, entity: EntityId) {
        let delta = self.clock.delta();
        let result = self
            .prediction
            .reconcile(&mut self.store, &mut self.actions, &self.clock, entity, delta);
        match result {
            ReconciliationResult::Skipped => {}
            ReconciliationResult::NoCorrection { divergence } => self.stats.last_divergence = divergence,
            ReconciliationResult::SoftCorrection { divergence } => {
                self.stats.soft_corrections += 1;
                self.stats.last_divergence = divergence;
            }
            ReconciliationResult::HardCorrection { divergence, .. } => {
                self.stats.hard_corrections += 1;
                self.stats.last_divergence = divergence;
            }
        }
    }

    /// Predicts the local entity's passive regeneration, as the server runs it.
    fn regenerate(&mut self, entity: EntityId) {
        if !self.prediction.enabled() || self.actions.state(ActionId::Regeneration, entity).is_some() {
            return;
        }
        self.actions.activate(
            &mut self.store,
            &self.clock,
            ActionId::Regeneration,
            entity,
            ActionParams::default(),
        );
    }

    fn send_input(&mut self, entity: EntityId) -> NetResult<()> {
        let input = self.source.sample();
        let now = self.clock.now();
        let Some(sequence) = self.controller.poll(input, now) else {
            return Ok(());
        };

        match self.outbox.try_send(InputMessage { sequence, input }.encode()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(sequence, "outbox full, input dropped");
            }
            Err(TrySendError::Disconnected(_)) => return Err(NetError::ChannelClosed),
        }
        self.stats.inputs_sent += 1;
        self.store.events_mut().emit(&Event::InputSent {
            sequence,
            buttons: input.buttons,
        });

        if self.prediction.enabled() {
            apply_input(&mut self.store, &mut self.actions, &self.clock, entity, input);
            if let Some(snapshot) = self.store.snapshot(entity) {
                self.prediction.record(HistoryEntry {
                    sequence,
                    timestamp: now,
                    input,
                    snapshot,
                });
            }
        }
        Ok(())
    }

    fn handle_frame(&mut self, bytes: &[u8]) -> NetResult<()> {
        let (kind, payload) = protocol::parse(bytes)?;
        match kind {
            MessageKind::Connected => {
                let remote = decode_connected(payload)?;
                self.server_entity = Some(remote);
                self.authoritative = Snapshot::new();
                self.fresh = false;
                tracing::info!(remote, "assigned entity");
            }
            MessageKind::Entities => {
                let summary = ObserverCodec::deserialize(&mut self.store, payload, &mut self.map)?;
                tracing::debug!(
                    spawned = summary.spawned,
                    updated = summary.updated,
                    removed = summary.removed,
                    "membership"
                );
            }
            MessageKind::Acknowledge => {
                let sequence = decode_acknowledge(payload)?;
                if self.fresh {
                    self.prediction.receive(self.authoritative.clone(), sequence);
                    self.fresh = false;
                } else {
                    self.prediction.acknowledge(sequence);
                }
            }
            MessageKind::Input => return Err(DecodeError::Unexpected(kind as u8).into()),
            _ => self.apply_values(kind, payload)?,
        }
        Ok(())
    }

    fn apply_values(&mut self, kind: MessageKind, payload: &[u8]) -> NetResult<()> {
        let Some(codec) = self.registry.codec(kind) else {
            return Err(DecodeError::Unexpected(kind as u8).into());
        };
        let local = self.local_entity().filter(|_| self.prediction.enabled());
        let predicted = local.and_then(|e| self.store.snapshot(e));

        let applied = codec.deserialize(&mut self.store, payload, &self.map)?;

        if let (Some(entity), Some(predicted)) = (local, predicted) {
            if applied.contains(&entity) {
                if let Some(values) = self.store.get(entity, codec.kind()) {
                    self.authoritative.insert(codec.kind(), values);
                    self.fresh = true;
                }
                self.store.restore(entity, &predicted);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_acknowledge, encode_connected, SoaCodec};
    use meridian_core::{ComponentKind, InputState, Position, Velocity};

    fn client() -> (Client, ClientLink) {
        Client::new(MeridianConfig::default(), Box::new(ScriptedInput::default()))
    }

    /// Server-side store with one synced player, plus the frames that
    /// announce it.
    fn announce() -> (Store, EntityId, Vec<Vec<u8>>) {
        let mut server = Store::new(8);
        let e = server.spawn().unwrap();
        server.add(e, ComponentKind::Sync, None);
        server.insert(e, Position::new(10.0, 20.0));
        server.insert(e, Velocity::ZERO);
        let mut observer = ObserverCodec::new();
        let frames = vec![
            encode_connected(e.to_bits()),
            protocol::frame(MessageKind::Entities, &observer.serialize(&server, &[e])),
        ];
        (server, e, frames)
    }

    #[test]
    fn test_session_states() {
        let (mut client, link) = client();
        assert_eq!(client.state(), ClientState::Disconnected);

        let (_server, e, frames) = announce();
        link.to_client.send(frames[0].clone()).unwrap();
        client.tick(16.0).unwrap();
        assert_eq!(client.state(), ClientState::Connected);
        assert_eq!(client.server_entity(), Some(e.to_bits()));

        link.to_client.send(frames[1].clone()).unwrap();
        client.tick(16.0).unwrap();
        assert_eq!(client.state(), ClientState::Synced);
    }

    #[test]
    fn test_local_values_go_through_prediction() {
        let (mut client, link) = client();
        let (mut server, e, frames) = announce();
        for frame in frames {
            link.to_client.send(frame).unwrap();
        }
        let codec = SoaCodec::new(ComponentKind::Position);
        link.to_client
            .send(protocol::frame(MessageKind::Position, &codec.serialize(&server, &[e])))
            .unwrap();
        link.to_client.send(encode_acknowledge(0)).unwrap();
        client.tick(16.0).unwrap();

        // The fresh mirror starts at zero, far enough away to roll back.
        let local = client.local_entity().unwrap();
        assert_eq!(client.store().get_as::<Position>(local), Some(Position::new(10.0, 20.0)));
        assert_eq!(client.stats().hard_corrections, 1);

        // Values without an acknowledge are captured but not applied.
        server.set_as(e, Position::new(12.0, 20.0));
        link.to_client
            .send(protocol::frame(MessageKind::Position, &codec.serialize(&server, &[e])))
            .unwrap();
        client.tick(16.0).unwrap();
        assert_eq!(client.store().get_as::<Position>(local), Some(Position::new(10.0, 20.0)));
        assert!(!client.prediction().has_pending());

        link.to_client.send(encode_acknowledge(1)).unwrap();
        client.tick(16.0).unwrap();
        let position = client.store().get_as::<Position>(local).unwrap();
        assert!((position.x - 10.3).abs() < 1e-4);
        assert_eq!(client.stats().soft_corrections, 1);
    }

    #[test]
    fn test_garbage_frames_are_counted() {
        let (mut client, link) = client();
        link.to_client.send(vec![]).unwrap();
        link.to_client.send(vec![99]).unwrap();
        link.to_client.send(InputMessage::default().encode()).unwrap();
        client.tick(16.0).unwrap();
        assert_eq!(client.stats().decode_errors, 3);
        assert_eq!(client.stats().frames_received, 3);
    }

    #[test]
    fn test_input_sent_once_synced() {
        let (mut client, link) = Client::new(
            MeridianConfig::default(),
            Box::new(ScriptedInput::new(vec![InputState::default()])),
        );
        client.tick(16.0).unwrap();
        assert!(link.from_client.try_recv().is_err());

        let (_server, _e, frames) = announce();
        for frame in frames {
            link.to_client.send(frame).unwrap();
        }
        client.tick(16.0).unwrap();
        let bytes = link.from_client.try_recv().unwrap();
        let (kind, payload) = protocol::parse(&bytes).unwrap();
        assert_eq!(kind, MessageKind::Input);
        assert_eq!(InputMessage::decode(payload).unwrap().sequence, 1);
        assert_eq!(client.prediction().history().count(), 1);
    }
}
