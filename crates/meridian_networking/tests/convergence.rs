//! # End-to-End Convergence Tests
//!
//! A server and real clients exchange framed bytes over the loopback.
//! Nothing but bytes crosses between the stores.
//!
//! Run with: cargo test --package meridian_networking --test convergence

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use meridian_core::{Button, ComponentKind, Energy, EventKind, InputState, Position, SubscribeOptions};
use meridian_networking::config::{PredictionConfig, SyncConfig, Thresholds};
use meridian_networking::{
    Client, ClientState, ConnectionId, Loopback, MeridianConfig, Outgoing, RandomWalkInput,
    ScriptedInput, Server,
};

/// Every sync resends every value.
fn exact_config() -> MeridianConfig {
    MeridianConfig {
        sync: SyncConfig {
            thresholds: Thresholds::uniform(0.0),
            ..SyncConfig::default()
        },
        ..MeridianConfig::default()
    }
}

fn run(network: &mut Loopback, ticks: usize, delta_ms: f64) {
    for _ in 0..ticks {
        network.tick(delta_ms).unwrap();
    }
}

#[test]
fn predicted_client_converges_to_server() {
    let config = exact_config();
    let delta = config.tick_delta_ms();
    let mut network = Loopback::new(config);
    let id = network
        .add_client(Box::new(ScriptedInput::hold(InputState::pressed(&[Button::Right]), 30)))
        .unwrap();

    run(&mut network, 210, delta);

    let client = network.client(id).unwrap();
    assert_eq!(client.state(), ClientState::Synced);
    let entity = network.server().connection(id).unwrap().entity;
    let server_position = network.server().store().get_as::<Position>(entity).unwrap();
    assert!(server_position.x > 52.0, "player moved right: {server_position:?}");
    assert_eq!(server_position.y, 25.0);

    let error = network.position_error(id).unwrap();
    assert!(error < 0.2, "client diverged by {error}");
    assert!(client.stats().inputs_sent >= 2);
}

#[test]
fn only_the_initial_mirror_needs_a_rollback() {
    let config = exact_config();
    let delta = config.tick_delta_ms();
    let mut network = Loopback::new(config);
    let id = network
        .add_client(Box::new(ScriptedInput::hold(InputState::pressed(&[Button::Down]), 45)))
        .unwrap();

    run(&mut network, 120, delta);

    let stats = *network.client(id).unwrap().stats();
    assert_eq!(stats.hard_corrections, 1);
    assert_eq!(stats.soft_corrections, 0);
    assert_eq!(stats.last_divergence, 0.0);
}

#[test]
fn hand_wired_client_reports_first_rollback() {
    let config = exact_config();
    let delta = config.tick_delta_ms();
    let (mut server, outbox) = Server::new(config.clone());
    let handle = server.handle();
    let (mut client, link) = Client::new(config, Box::new(ScriptedInput::default()));

    let count = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&count);
    client.store_mut().events_mut().on(
        EventKind::Reconciled,
        move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        },
        SubscribeOptions::default(),
    );

    let connection = ConnectionId(7);
    handle.connect(connection).unwrap();
    for _ in 0..30 {
        client.tick(delta).unwrap();
        for bytes in link.from_client.try_iter() {
            handle.deliver(connection, bytes).unwrap();
        }
        server.tick(delta);
        for Outgoing { bytes, .. } in outbox.try_iter() {
            link.to_client.send(bytes).unwrap();
        }
    }

    assert_eq!(client.state(), ClientState::Synced);
    let entity = server.connection(connection).unwrap().entity;
    assert_eq!(client.server_entity(), Some(entity.to_bits()));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(handle.stats().decode_errors, 0);
}

#[test]
fn disconnect_purges_server_state_and_remote_mirrors() {
    let config = MeridianConfig::default();
    let delta = config.tick_delta_ms();
    let mut network = Loopback::new(config);
    let a = network.add_client(Box::new(ScriptedInput::default())).unwrap();
    let b = network.add_client(Box::new(ScriptedInput::default())).unwrap();

    run(&mut network, 6, delta);
    assert_eq!(network.client(b).unwrap().entity_map().len(), 2);
    assert_eq!(network.server().delta().connections(), 2);
    let gone = network.server().connection(a).unwrap().entity;

    network.remove_client(a).unwrap();
    run(&mut network, 4, delta);
    assert!(network.server().connection(a).is_none());
    assert_eq!(network.server().delta().connections(), 1);
    assert_eq!(network.client(b).unwrap().entity_map().len(), 1);
    assert_eq!(network.handle().stats().connections, 1);

    run(&mut network, 60, delta);
    assert!(!network.server().store().exists(gone));
}

#[test]
fn unpredicted_client_follows_server_values() {
    let config = MeridianConfig {
        prediction: PredictionConfig {
            enabled: false,
            ..PredictionConfig::default()
        },
        ..exact_config()
    };
    let delta = config.tick_delta_ms();
    let mut network = Loopback::new(config);
    let id = network
        .add_client(Box::new(ScriptedInput::hold(InputState::pressed(&[Button::Up]), 20)))
        .unwrap();

    run(&mut network, 120, delta);

    let client = network.client(id).unwrap();
    assert_eq!(client.stats().hard_corrections, 0);
    assert_eq!(client.prediction().history().count(), 0);
    let error = network.position_error(id).unwrap();
    assert!(error < 1e-4, "client diverged by {error}");
}

#[test]
fn random_walkers_stay_close_to_server() {
    let config = exact_config();
    let delta = config.tick_delta_ms();
    let mut network = Loopback::new(config);
    let ids: Vec<_> = (0..4)
        .map(|seed| network.add_client(Box::new(RandomWalkInput::new(seed))).unwrap())
        .collect();

    run(&mut network, 300, delta);

    for id in ids {
        let error = network.position_error(id).unwrap();
        assert!(error < 0.2, "client {id} diverged by {error}");
    }
    assert_eq!(network.handle().stats().decode_errors, 0);
}

#[test]
fn delayed_link_holds_frames_in_flight() {
    let config = MeridianConfig::default();
    let delta = config.tick_delta_ms();
    let mut network = Loopback::with_latency(config, 2);
    let id = network.add_client(Box::new(ScriptedInput::default())).unwrap();

    run(&mut network, 1, delta);
    assert!(network.in_flight() > 0);

    run(&mut network, 2, delta);
    assert_eq!(network.client(id).unwrap().state(), ClientState::Disconnected);

    run(&mut network, 1, delta);
    assert_eq!(network.client(id).unwrap().state(), ClientState::Connected);

    run(&mut network, 10, delta);
    assert_eq!(network.client(id).unwrap().state(), ClientState::Synced);
}

#[test]
fn delayed_link_rolls_back_with_inputs_in_flight() {
    let config = exact_config();
    let delta = config.tick_delta_ms();
    let mut network = Loopback::with_latency(config, 3);

    let mut frames = Vec::new();
    for turn in 0..10 {
        let button = if turn % 2 == 0 { Button::Right } else { Button::Down };
        frames.extend(std::iter::repeat(InputState::pressed(&[button])).take(6));
    }
    frames.push(InputState::default());
    let id = network.add_client(Box::new(ScriptedInput::new(frames))).unwrap();

    run(&mut network, 40, delta);
    let client = network.client(id).unwrap();
    assert_eq!(client.state(), ClientState::Synced);
    assert!(client.prediction().history().count() > 0, "no input awaiting an ack");
    let hard_before = client.stats().hard_corrections;

    let entity = network.server().connection(id).unwrap().entity;
    network.server_mut().store_mut().set_as(entity, Position::new(150.0, 120.0));

    run(&mut network, 150, delta);

    let stats = *network.client(id).unwrap().stats();
    assert!(stats.hard_corrections > hard_before, "teleport was not rolled back");
    let error = network.position_error(id).unwrap();
    assert!(error < 0.2, "client diverged by {error}");
    let server_position = network.server().store().get_as::<Position>(entity).unwrap();
    assert!(server_position.x > 150.0 || server_position.y > 120.0);
}

#[test]
fn remote_players_glide_and_settle() {
    let config = MeridianConfig::default();
    let delta = config.tick_delta_ms();
    let mut network = Loopback::new(config);
    let _mover = network
        .add_client(Box::new(ScriptedInput::hold(InputState::pressed(&[Button::Right]), 40)))
        .unwrap();
    let watcher = network.add_client(Box::new(ScriptedInput::default())).unwrap();

    run(&mut network, 30, delta);
    let client = network.client(watcher).unwrap();
    assert_eq!(client.interpolation().len(), 1);
    let local = client.local_entity();
    assert!(local.is_some_and(|e| client.interpolation().track(e).is_none()));

    run(&mut network, 150, delta);
    let client = network.client(watcher).unwrap();
    let remote = client
        .store()
        .query_kinds(&[ComponentKind::Position])
        .into_iter()
        .find(|e| Some(*e) != client.local_entity())
        .unwrap();
    let track = client.interpolation().track(remote).unwrap();
    assert_eq!(track.current, track.target);
    assert_eq!(Some(track.target), client.store().get_as::<Position>(remote));
    assert!(track.target.x > 52.0);
}

#[test]
fn sprinting_client_tracks_server_energy() {
    let config = exact_config();
    let delta = config.tick_delta_ms();
    let mut network = Loopback::new(config);
    let id = network
        .add_client(Box::new(ScriptedInput::hold(
            InputState::pressed(&[Button::Right, Button::Action1]),
            30,
        )))
        .unwrap();

    run(&mut network, 25, delta);
    let entity = network.server().connection(id).unwrap().entity;
    let spent = network.server().store().get_as::<Energy>(entity).unwrap();
    assert!(spent.current < spent.maximum, "sprint drained nothing: {spent:?}");

    run(&mut network, 200, delta);
    let server = network.server().store().get_as::<Energy>(entity).unwrap();
    assert_eq!(server.current, server.maximum);
    let client = network.client(id).unwrap();
    let local = client.store().get_as::<Energy>(client.local_entity().unwrap()).unwrap();
    assert_eq!(local, server);

    let error = network.position_error(id).unwrap();
    assert!(error < 0.2, "client diverged by {error}");
}
