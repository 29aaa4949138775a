//! # Struct-of-Arrays Codec
//!
//! One codec per component kind, optionally restricted to a field subset.
//!
//! ```text
//! [count:u32] then count × [entity_id:u32][field_0]...[field_n]
//! ```
//!
//! Fields are copied straight from and into the store's typed columns, so a
//! round-trip is bit-exact. Records for unmapped ids are skipped by their
//! fixed size.

use meridian_core::{ComponentKind, EntityId, Store};

use super::serialization::{Reader, Writer};
use crate::entity_map::EntityMap;
use crate::error::{DecodeError, DecodeResult};

/// Batch codec for one component kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoaCodec {
    kind: ComponentKind,
    fields: Vec<usize>,
    record_size: usize,
}

impl SoaCodec {
    /// Codec covering every declared field of `kind`.
    #[must_use]
    pub fn new(kind: ComponentKind) -> Self {
        let fields: Vec<usize> = (0..kind.fields().len()).collect();
        Self::from_indices(kind, fields)
    }

    /// Codec covering only the named fields, in declared order.
    ///
    /// Returns `None` if a name is not a field of `kind`.
    #[must_use]
    pub fn with_fields(kind: ComponentKind, names: &[&str]) -> Option<Self> {
        let mut fields = names
            .iter()
            .map(|name| kind.field_index(name))
            .collect::<Option<Vec<_>>>()?;
        fields.sort_unstable();
        fields.dedup();
        Some(Self::from_indices(kind, fields))
    }

    fn from_indices(kind: ComponentKind, fields: Vec<usize>) -> Self {
        let record_size = 4 + fields.iter().map(|&f| kind.fields()[f].ty.size()).sum::<usize>();
        Self {
            kind,
            fields,
            record_size,
        }
    }

    /// Component kind this codec carries.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Encoded size of one record, entity id included.
    #[inline]
    #[must_use]
    pub const fn record_size(&self) -> usize {
        self.record_size
    }

    /// Encodes the entities of `entities` that hold this kind.
    ///
    /// Returns an empty payload when none qualify; callers skip sending it.
    #[must_use]
    pub fn serialize(&self, store: &Store, entities: &[EntityId]) -> Vec<u8> {
        let table = store.table(self.kind);
        let mut writer = Writer::with_capacity(4 + entities.len() * self.record_size);
        writer.write_u32(0);
        let mut count = 0u32;

        for &entity in entities {
            if !store.has(entity, self.kind) {
                continue;
            }
            let index = entity.index() as usize;
            writer.write_u32(entity.to_bits());
            for &field in &self.fields {
                if let Some(column) = table.column(field) {
                    column.write_le(index, writer.buffer_mut());
                }
            }
            count += 1;
        }

        if count == 0 {
            return Vec::new();
        }
        writer.patch_u32(0, count);
        writer.into_vec()
    }

    /// Applies a batch to `store`, translating ids through `map`.
    ///
    /// Mapped entities missing the component get it added. Returns the
    /// local entities that were written, in record order.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if the payload is shorter than its
    /// declared count. Nothing is applied in that case.
    pub fn deserialize(&self, store: &mut Store, payload: &[u8], map: &EntityMap) -> DecodeResult<Vec<EntityId>> {
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        let mut reader = Reader::new(payload);
        let count = reader.read_u32()? as usize;
        let needed = count
            .checked_mul(self.record_size)
            .ok_or(DecodeError::Truncated {
                needed: usize::MAX,
                remaining: reader.remaining(),
            })?;
        if needed > reader.remaining() {
            return Err(DecodeError::Truncated {
                needed,
                remaining: reader.remaining(),
            });
        }

        let mut applied = Vec::with_capacity(count);
        for _ in 0..count {
            let remote = reader.read_u32()?;
            let Some(local) = map.local(remote).filter(|e| store.exists(*e)) else {
                reader.skip(self.record_size - 4)?;
                continue;
            };
            if !store.has(local, self.kind) {
                store.add(local, self.kind, None);
            }
            let index = local.index() as usize;
            let table = store.table_mut(self.kind);
            for &field in &self.fields {
                let bytes = reader.take(self.kind.fields()[field].ty.size())?;
                if let Some(column) = table.column_mut(field) {
                    column.read_le(index, bytes);
                }
            }
            table.mark_dirty(index);
            applied.push(local);
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::{Energy, Position, Projectile};

    fn identity_map(store: &Store) -> EntityMap {
        let mut map = EntityMap::new();
        for e in store.entities() {
            map.insert(e.to_bits(), e);
        }
        map
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let mut server = Store::new(8);
        let a = server.spawn().unwrap();
        let b = server.spawn().unwrap();
        server.insert(a, Position::new(0.1, -3.0e-7));
        server.insert(b, Position::new(f32::MAX, 1.5));

        let codec = SoaCodec::new(ComponentKind::Position);
        let payload = codec.serialize(&server, &[a, b]);
        assert_eq!(payload.len(), 4 + 2 * 12);

        let mut client = Store::new(8);
        let ca = client.spawn().unwrap();
        let cb = client.spawn().unwrap();
        let mut map = EntityMap::new();
        map.insert(a.to_bits(), ca);
        map.insert(b.to_bits(), cb);

        assert_eq!(codec.deserialize(&mut client, &payload, &map).unwrap(), vec![ca, cb]);
        let pa = client.get_as::<Position>(ca).unwrap();
        assert_eq!(pa.x.to_bits(), 0.1f32.to_bits());
        assert_eq!(pa.y.to_bits(), (-3.0e-7f32).to_bits());
        assert_eq!(client.get_as::<Position>(cb), Some(Position::new(f32::MAX, 1.5)));
        assert!(client.is_dirty(ca, ComponentKind::Position));
    }

    #[test]
    fn test_energy_carries_its_regeneration_rate() {
        let mut server = Store::new(4);
        let a = server.spawn().unwrap();
        let energy = Energy {
            current: 42.5,
            maximum: 100.0,
            regeneration: 5.0,
        };
        server.insert(a, energy);

        let codec = SoaCodec::new(ComponentKind::Energy);
        let payload = codec.serialize(&server, &[a]);
        assert_eq!(payload.len(), 4 + 4 + 3 * 4);

        let mut client = Store::new(4);
        let local = client.spawn().unwrap();
        let mut map = EntityMap::new();
        map.insert(a.to_bits(), local);
        codec.deserialize(&mut client, &payload, &map).unwrap();
        assert_eq!(client.get_as::<Energy>(local), Some(energy));
    }

    #[test]
    fn test_unknown_ids_are_skipped_without_shifting() {
        let mut server = Store::new(8);
        let ids: Vec<_> = (0..3).map(|_| server.spawn().unwrap()).collect();
        for (i, e) in ids.iter().enumerate() {
            server.insert(
                *e,
                Projectile {
                    owner: 7,
                    damage: i as f32,
                    lifetime: 1.0,
                    spawned_at: 0.0,
                },
            );
        }
        let codec = SoaCodec::new(ComponentKind::Projectile);
        let payload = codec.serialize(&server, &ids);

        let mut client = Store::new(8);
        let last = client.spawn().unwrap();
        let mut map = EntityMap::new();
        map.insert(ids[2].to_bits(), last);

        assert_eq!(codec.deserialize(&mut client, &payload, &map).unwrap(), vec![last]);
        let projectile = client.get_as::<Projectile>(last).unwrap();
        assert_eq!(projectile.damage, 2.0);
        assert_eq!(projectile.owner, 7);
    }

    #[test]
    fn test_empty_list_is_empty_payload() {
        let mut store = Store::new(4);
        let e = store.spawn().unwrap();
        let codec = SoaCodec::new(ComponentKind::Velocity);
        assert!(codec.serialize(&store, &[]).is_empty());
        assert!(codec.serialize(&store, &[e]).is_empty(), "entity lacks the kind");
        assert!(codec.deserialize(&mut store, &[], &EntityMap::new()).unwrap().is_empty());
    }

    #[test]
    fn test_field_subset() {
        let mut store = Store::new(4);
        let e = store.spawn().unwrap();
        store.insert(e, Position::new(4.0, 9.0));
        let codec = SoaCodec::with_fields(ComponentKind::Position, &["y"]).unwrap();
        assert_eq!(codec.record_size(), 8);

        let payload = codec.serialize(&store, &[e]);
        let mut client = Store::new(4);
        let c = client.spawn().unwrap();
        client.insert(c, Position::new(1.0, 1.0));
        let map = {
            let mut map = EntityMap::new();
            map.insert(e.to_bits(), c);
            map
        };
        codec.deserialize(&mut client, &payload, &map).unwrap();
        assert_eq!(client.get_as::<Position>(c), Some(Position::new(1.0, 9.0)));

        assert!(SoaCodec::with_fields(ComponentKind::Position, &["z"]).is_none());
    }

    #[test]
    fn test_truncated_batch_applies_nothing() {
        let mut store = Store::new(4);
        let e = store.spawn().unwrap();
        store.insert(e, Position::new(4.0, 9.0));
        let codec = SoaCodec::new(ComponentKind::Position);
        let payload = codec.serialize(&store, &[e]);
        let map = identity_map(&store);

        store.set_as(e, Position::new(0.0, 0.0));
        let result = codec.deserialize(&mut store, &payload[..payload.len() - 1], &map);
        assert!(matches!(result, Err(DecodeError::Truncated { .. })));
        assert_eq!(store.get_as::<Position>(e), Some(Position::new(0.0, 0.0)));
    }
}
