//! # Headless Simulation
//!
//! Runs one server and N random-walking clients in-process, paced by a
//! fixed-timestep loop, then reports sync counters and per-client error.
//!
//! ```text
//! meridian_sim [config.toml] [clients] [ticks]
//! ```
//!
//! Logging follows `RUST_LOG` (default `info`).

use std::process::ExitCode;

use meridian_networking::{init_logging, Loopback, MeridianConfig, NetResult, RandomWalkInput, TickLoop};

const DEFAULT_CLIENTS: usize = 8;
const DEFAULT_TICKS: u64 = 600;

fn main() -> ExitCode {
    init_logging("info");

    let mut args = std::env::args().skip(1);
    let config = match args.next().filter(|a| !a.is_empty() && a != "-") {
        Some(path) => match MeridianConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(%path, %err, "cannot load config");
                return ExitCode::FAILURE;
            }
        },
        None => MeridianConfig::default(),
    };
    let clients = args.next().and_then(|a| a.parse().ok()).unwrap_or(DEFAULT_CLIENTS);
    let ticks = args.next().and_then(|a| a.parse().ok()).unwrap_or(DEFAULT_TICKS);

    match run(config, clients, ticks) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "simulation aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(config: MeridianConfig, clients: usize, ticks: u64) -> NetResult<()> {
    tracing::info!(clients, ticks, tick_rate = config.tick.tick_rate, "starting simulation");
    let delta_ms = config.tick_delta_ms();
    let mut tick_loop = TickLoop::new(config.tick.tick_rate);
    let mut network = Loopback::new(config);

    for seed in (0u64..).take(clients) {
        network.add_client(Box::new(RandomWalkInput::new(seed)))?;
    }

    tick_loop.run(ticks, |_| network.tick(delta_ms))?;

    let timing = tick_loop.stats();
    tracing::info!(
        ticks = timing.total_ticks,
        avg_us = timing.avg_tick_us,
        max_us = timing.max_tick_us,
        late = timing.late_ticks,
        "tick timing"
    );

    let server = network.handle().stats();
    tracing::info!(
        connections = server.connections,
        entities = server.entities,
        frames = server.frames_sent,
        bytes = server.bytes_sent,
        dropped = server.frames_dropped,
        throttled = server.inputs_throttled,
        decode_errors = server.decode_errors,
        "server sync"
    );

    for peer in network.peers() {
        let stats = peer.client.stats();
        let error = network.position_error(peer.connection).unwrap_or(f64::NAN);
        tracing::info!(
            connection = %peer.connection,
            inputs = stats.inputs_sent,
            soft = stats.soft_corrections,
            hard = stats.hard_corrections,
            divergence = stats.last_divergence,
            position_error = error,
            "client"
        );
    }
    Ok(())
}
