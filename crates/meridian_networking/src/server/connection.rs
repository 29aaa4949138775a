//! Per-client server state.

use meridian_core::EntityId;

use crate::protocol::ObserverCodec;

/// Transport-assigned identifier of a client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Invalid/null connection id.
    pub const NULL: Self = Self(u32::MAX);

    /// Returns `true` if this is the null id.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A connected client and what it has been told.
#[derive(Debug)]
pub struct Connection {
    /// Connection id.
    pub id: ConnectionId,
    /// Entity the client controls.
    pub entity: EntityId,
    /// Entities announced to this client.
    pub observer: ObserverCodec,
}

impl Connection {
    /// Creates a connection controlling `entity`.
    #[must_use]
    pub fn new(id: ConnectionId, entity: EntityId) -> Self {
        Self {
            id,
            entity,
            observer: ObserverCodec::new(),
        }
    }
}
