//! # Observer Codec
//!
//! Tracks which entities a connection has been told about and emits only
//! membership changes:
//!
//! ```text
//! [added_count:u32]   then added × [id:u32][kind_count:u8][kind:u8]...
//! [removed_count:u32] then removed × [id:u32]
//! ```
//!
//! An entity whose kind set changed is re-announced as added. The
//! announced list is complete, so the receiver adds the kinds it is missing
//! and drops the ones no longer listed.

use std::collections::BTreeMap;

use meridian_core::{ComponentKind, EntityId, Store};

use super::serialization::{Reader, Writer};
use crate::entity_map::EntityMap;
use crate::error::{DecodeError, DecodeResult};

/// Per-connection seen-set.
#[derive(Clone, Debug, Default)]
pub struct ObserverCodec {
    seen: BTreeMap<EntityId, Vec<ComponentKind>>,
}

/// What a received membership message changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObserverSummary {
    /// Entities spawned locally.
    pub spawned: usize,
    /// Already-known entities whose kind set was re-announced.
    pub updated: usize,
    /// Entities despawned locally.
    pub removed: usize,
}

fn announced_kinds(store: &Store, entity: EntityId) -> Vec<ComponentKind> {
    store
        .kinds_of(entity)
        .into_iter()
        .filter(|k| *k != ComponentKind::Despawned)
        .collect()
}

impl ObserverCodec {
    /// Creates an empty seen-set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities the peer currently knows about.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if the peer knows no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Returns `true` if `entity` has been announced.
    #[must_use]
    pub fn has_seen(&self, entity: EntityId) -> bool {
        self.seen.contains_key(&entity)
    }

    /// Encodes the difference between the seen-set and `current`.
    ///
    /// Returns an empty payload when nothing changed. The seen-set is
    /// replaced only when a payload is produced.
    #[must_use]
    pub fn serialize(&mut self, store: &Store, current: &[EntityId]) -> Vec<u8> {
        let next: BTreeMap<EntityId, Vec<ComponentKind>> = current
            .iter()
            .filter(|e| store.exists(**e))
            .map(|&e| (e, announced_kinds(store, e)))
            .collect();

        let added: Vec<(&EntityId, &Vec<ComponentKind>)> = next
            .iter()
            .filter(|(e, kinds)| self.seen.get(*e) != Some(*kinds))
            .collect();
        let removed: Vec<EntityId> = self
            .seen
            .keys()
            .filter(|e| !next.contains_key(*e))
            .copied()
            .collect();

        if added.is_empty() && removed.is_empty() {
            return Vec::new();
        }

        let mut writer = Writer::new();
        writer.write_u32(u32::try_from(added.len()).unwrap_or(u32::MAX));
        for (entity, kinds) in &added {
            writer.write_u32(entity.to_bits());
            writer.write_u8(u8::try_from(kinds.len()).unwrap_or(u8::MAX));
            for kind in *kinds {
                writer.write_u8(*kind as u8);
            }
        }
        writer.write_u32(u32::try_from(removed.len()).unwrap_or(u32::MAX));
        for entity in &removed {
            writer.write_u32(entity.to_bits());
        }

        self.seen = next;
        writer.into_vec()
    }

    /// Applies a membership message to `store`, maintaining `map`.
    ///
    /// The payload is parsed in full before anything is applied.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] for short payloads and
    /// [`DecodeError::UnknownComponent`] for unknown kind tags.
    pub fn deserialize(store: &mut Store, payload: &[u8], map: &mut EntityMap) -> DecodeResult<ObserverSummary> {
        let mut reader = Reader::new(payload);
        let added_count = reader.read_u32()?;
        let mut added = Vec::new();
        for _ in 0..added_count {
            let remote = reader.read_u32()?;
            let kind_count = reader.read_u8()?;
            let mut kinds = Vec::with_capacity(usize::from(kind_count));
            for _ in 0..kind_count {
                let tag = reader.read_u8()?;
                kinds.push(ComponentKind::from_u8(tag).ok_or(DecodeError::UnknownComponent(tag))?);
            }
            added.push((remote, kinds));
        }
        let removed_count = reader.read_u32()?;
        let mut removed = Vec::new();
        for _ in 0..removed_count {
            removed.push(reader.read_u32()?);
        }

        let mut summary = ObserverSummary::default();
        for (remote, kinds) in added {
            let local = match map.local(remote).filter(|e| store.exists(*e)) {
                Some(local) => {
                    summary.updated += 1;
                    local
                }
                None => match store.spawn() {
                    Ok(local) => {
                        map.insert(remote, local);
                        summary.spawned += 1;
                        local
                    }
                    Err(err) => {
                        tracing::warn!(remote, %err, "cannot mirror server entity");
                        continue;
                    }
                },
            };
            for stale in announced_kinds(store, local) {
                if !kinds.contains(&stale) {
                    store.remove(local, stale);
                }
            }
            for kind in kinds {
                if !store.has(local, kind) {
                    store.add(local, kind, None);
                }
            }
        }
        for remote in removed {
            if let Some(local) = map.remove_remote(remote) {
                store.despawn(local);
                summary.removed += 1;
            }
        }
        Ok(summary)
    }
}
