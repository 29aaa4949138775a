//! # Entity Mapping
//!
//! Connection-local translation between the server's entity ids and the
//! client's own handles. Server ids travel as raw `u32` handle bits.

use std::collections::HashMap;

use meridian_core::EntityId;

/// Bidirectional server id ↔ local handle map.
#[derive(Clone, Debug, Default)]
pub struct EntityMap {
    remote_to_local: HashMap<u32, EntityId>,
    local_to_remote: HashMap<EntityId, u32>,
}

impl EntityMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mapped entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.remote_to_local.len()
    }

    /// Returns `true` if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remote_to_local.is_empty()
    }

    /// Maps `remote` to `local`, replacing any previous pairing of either side.
    pub fn insert(&mut self, remote: u32, local: EntityId) {
        if let Some(old) = self.remote_to_local.insert(remote, local) {
            self.local_to_remote.remove(&old);
        }
        if let Some(old) = self.local_to_remote.insert(local, remote) {
            if old != remote {
                self.remote_to_local.remove(&old);
            }
        }
    }

    /// Local handle for a server id.
    #[inline]
    #[must_use]
    pub fn local(&self, remote: u32) -> Option<EntityId> {
        self.remote_to_local.get(&remote).copied()
    }

    /// Server id for a local handle.
    #[inline]
    #[must_use]
    pub fn remote(&self, local: EntityId) -> Option<u32> {
        self.local_to_remote.get(&local).copied()
    }

    /// Unmaps a server id, returning its local handle.
    pub fn remove_remote(&mut self, remote: u32) -> Option<EntityId> {
        let local = self.remote_to_local.remove(&remote)?;
        self.local_to_remote.remove(&local);
        Some(local)
    }

    /// Unmaps a local handle, returning its server id.
    pub fn remove_local(&mut self, local: EntityId) -> Option<u32> {
        let remote = self.local_to_remote.remove(&local)?;
        self.remote_to_local.remove(&remote);
        Some(remote)
    }

    /// Drops every mapping.
    pub fn clear(&mut self) {
        self.remote_to_local.clear();
        self.local_to_remote.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_directions() {
        let mut map = EntityMap::new();
        let local = EntityId::new(3, 1);
        map.insert(900, local);
        assert_eq!(map.local(900), Some(local));
        assert_eq!(map.remote(local), Some(900));

        assert_eq!(map.remove_remote(900), Some(local));
        assert!(map.is_empty());
        assert_eq!(map.remote(local), None);
    }

    #[test]
    fn test_remap_drops_stale_pairs() {
        let mut map = EntityMap::new();
        let a = EntityId::new(1, 0);
        let b = EntityId::new(2, 0);
        map.insert(10, a);
        map.insert(10, b);
        assert_eq!(map.local(10), Some(b));
        assert_eq!(map.remote(a), None);
        assert_eq!(map.len(), 1);

        map.insert(11, b);
        assert_eq!(map.local(10), None);
        assert_eq!(map.remote(b), Some(11));
        assert_eq!(map.len(), 1);
    }
}
