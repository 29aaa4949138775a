//! # In-Process Loopback
//!
//! Runs a server and its clients in one thread. Each tick:
//!
//! ```text
//! clients tick ──► client frames → server inbox ──► server tick ──► outbox → clients
//! ```
//!
//! With a latency of `n` ticks every frame waits `n` ticks in flight in
//! each direction; zero delivers within the same tick.
//!
//! Used by the headless simulation and end-to-end tests.

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, TrySendError};
use meridian_core::Position;

use crate::client::{Client, ClientLink, InputSource};
use crate::config::MeridianConfig;
use crate::error::NetResult;
use crate::server::{ConnectionId, Outgoing, Server, ServerHandle};

/// One client wired to the loopback server.
#[derive(Debug)]
pub struct Peer {
    /// Connection id the server knows this client by.
    pub connection: ConnectionId,
    /// The client.
    pub client: Client,
    link: ClientLink,
}

/// A frame waiting out the link latency.
#[derive(Debug)]
struct InFlight {
    due: u64,
    connection: ConnectionId,
    bytes: Vec<u8>,
}

/// Server plus clients exchanging frames over channels.
#[derive(Debug)]
pub struct Loopback {
    config: MeridianConfig,
    server: Server,
    outbox: Receiver<Outgoing>,
    handle: ServerHandle,
    peers: Vec<Peer>,
    next_connection: u32,
    latency: u64,
    ticks: u64,
    upstream: VecDeque<InFlight>,
    downstream: VecDeque<InFlight>,
}

impl Loopback {
    /// Creates a server with no clients and instant delivery.
    #[must_use]
    pub fn new(config: MeridianConfig) -> Self {
        Self::with_latency(config, 0)
    }

    /// Creates a server with no clients whose frames spend `ticks` ticks in
    /// flight each way.
    #[must_use]
    pub fn with_latency(config: MeridianConfig, ticks: u32) -> Self {
        let (server, outbox) = Server::new(config.clone());
        let handle = server.handle();
        Self {
            config,
            server,
            outbox,
            handle,
            peers: Vec::new(),
            next_connection: 1,
            latency: u64::from(ticks),
            ticks: 0,
            upstream: VecDeque::new(),
            downstream: VecDeque::new(),
        }
    }

    /// One-way delay in ticks.
    #[must_use]
    pub const fn latency(&self) -> u64 {
        self.latency
    }

    /// The server.
    #[must_use]
    pub const fn server(&self) -> &Server {
        &self.server
    }

    /// The server, for out-of-band changes to its world.
    pub fn server_mut(&mut self) -> &mut Server {
        &mut self.server
    }

    /// Handle to the server's inbox and stats.
    #[must_use]
    pub const fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    /// Connected clients.
    #[must_use]
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Client by connection id.
    #[must_use]
    pub fn client(&self, connection: ConnectionId) -> Option<&Client> {
        self.peers
            .iter()
            .find(|p| p.connection == connection)
            .map(|p| &p.client)
    }

    /// Creates a client and queues its connect.
    ///
    /// # Errors
    ///
    /// Returns a channel error if the server inbox refuses the connect.
    pub fn add_client(&mut self, source: Box<dyn InputSource>) -> NetResult<ConnectionId> {
        let connection = ConnectionId(self.next_connection);
        self.next_connection += 1;
        let (client, link) = Client::new(self.config.clone(), source);
        self.handle.connect(connection)?;
        self.peers.push(Peer {
            connection,
            client,
            link,
        });
        Ok(connection)
    }

    /// Drops a client and queues its disconnect.
    ///
    /// # Errors
    ///
    /// Returns a channel error if the server inbox refuses the disconnect.
    pub fn remove_client(&mut self, connection: ConnectionId) -> NetResult<Option<Client>> {
        self.handle.disconnect(connection)?;
        self.upstream.retain(|f| f.connection != connection);
        self.downstream.retain(|f| f.connection != connection);
        let index = self.peers.iter().position(|p| p.connection == connection);
        Ok(index.map(|i| self.peers.remove(i).client))
    }

    /// Runs one tick of every participant and delivers all frames.
    ///
    /// # Errors
    ///
    /// Returns a channel error if a client or the server inbox is gone.
    pub fn tick(&mut self, delta_ms: f64) -> NetResult<()> {
        self.ticks += 1;
        let due = self.ticks + self.latency;

        for peer in &mut self.peers {
            peer.client.tick(delta_ms)?;
            for bytes in peer.link.from_client.try_iter() {
                self.upstream.push_back(InFlight {
                    due,
                    connection: peer.connection,
                    bytes,
                });
            }
        }
        while let Some(frame) = pop_due(&mut self.upstream, self.ticks) {
            self.handle.deliver(frame.connection, frame.bytes)?;
        }

        self.server.tick(delta_ms);

        for Outgoing { connection, bytes } in self.outbox.try_iter() {
            self.downstream.push_back(InFlight { due, connection, bytes });
        }
        while let Some(InFlight { connection, bytes, .. }) = pop_due(&mut self.downstream, self.ticks) {
            let Some(peer) = self.peers.iter().find(|p| p.connection == connection) else {
                continue;
            };
            match peer.link.to_client.try_send(bytes) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => tracing::warn!(%connection, "client inbox full, frame dropped"),
            }
        }
        Ok(())
    }

    /// Frames still in flight, both directions.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.upstream.len() + self.downstream.len()
    }

    /// Manhattan distance between a client's predicted position and the
    /// server's, or `None` until the client has mirrored its entity.
    #[must_use]
    pub fn position_error(&self, connection: ConnectionId) -> Option<f64> {
        let entity = self.server.connection(connection)?.entity;
        let server = self.server.store().get_as::<Position>(entity)?;
        let client = self.client(connection)?;
        let local = client.store().get_as::<Position>(client.local_entity()?)?;
        Some(f64::from((server.x - local.x).abs()) + f64::from((server.y - local.y).abs()))
    }
}

fn pop_due(queue: &mut VecDeque<InFlight>, now: u64) -> Option<InFlight> {
    if queue.front().is_some_and(|f| f.due <= now) {
        queue.pop_front()
    } else {
        None
    }
}
