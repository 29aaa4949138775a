//! # Entity/Component Store
//!
//! The central container for entities and their component tables.
//!
//! ## Lifecycle
//!
//! ```text
//! spawn ──► live ──despawn──► marked (still readable) ──flush──► slot freed,
//!                                                                  generation + 1
//! ```
//!
//! Deferred despawn keeps every handle observed during a tick valid until
//! the next flush, which runs at a fixed cadence.

use super::component::{Component, ComponentKind, KIND_COUNT};
use super::entity::{Entities, EntityId};
use super::query::Filter;
use super::table::ComponentTable;
use crate::bitmap::Bitmap;
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::events::{Event, EventBus};

/// Full attribute copy of one entity, keyed by kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    components: Vec<(ComponentKind, Vec<f64>)>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the values for `kind`.
    pub fn insert(&mut self, kind: ComponentKind, values: Vec<f64>) {
        match self.components.binary_search_by_key(&kind, |(k, _)| *k) {
            Ok(i) => self.components[i].1 = values,
            Err(i) => self.components.insert(i, (kind, values)),
        }
    }

    /// Values for `kind`, if captured.
    #[must_use]
    pub fn get(&self, kind: ComponentKind) -> Option<&[f64]> {
        self.components
            .binary_search_by_key(&kind, |(k, _)| *k)
            .ok()
            .map(|i| self.components[i].1.as_slice())
    }

    /// Iterates captured kinds in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentKind, &[f64])> {
        self.components.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Number of captured kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// The entity/component store.
///
/// One table per [`ComponentKind`], resolved by array index. Tables grow in
/// lock-step with entity capacity and never shrink.
///
/// # Example
///
/// ```rust,ignore
/// let mut store = Store::new(1024);
/// let entity = store.spawn()?;
/// store.insert(entity, Position::new(1.0, 2.0));
/// let moving = store.query(&Filter::all(&[ComponentKind::Position, ComponentKind::Velocity]));
/// ```
#[derive(Debug)]
pub struct Store {
    entities: Entities,
    alive: Bitmap,
    tables: Vec<ComponentTable>,
    capacity: usize,
    events: EventBus,
}

impl Store {
    /// Creates a store with room for `capacity` entities before growing.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entities: Entities::with_capacity(capacity),
            alive: Bitmap::new(capacity),
            tables: ComponentKind::ALL
                .iter()
                .map(|&kind| ComponentTable::new(kind, capacity))
                .collect(),
            capacity,
            events: EventBus::new(),
        }
    }

    /// Creates a store sized from configuration.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Entity capacity before the next growth.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entities, including ones marked for despawn.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Event bus owned by this store.
    #[inline]
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Mutable event bus.
    #[inline]
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Table for `kind`.
    #[inline]
    #[must_use]
    pub fn table(&self, kind: ComponentKind) -> &ComponentTable {
        &self.tables[kind.index()]
    }

    /// Mutable table for `kind`.
    #[inline]
    pub fn table_mut(&mut self, kind: ComponentKind) -> &mut ComponentTable {
        &mut self.tables[kind.index()]
    }

    /// Grows entity capacity and every table to at least `capacity`.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }
        self.alive.grow(capacity);
        for table in &mut self.tables {
            table.grow(capacity);
        }
        tracing::debug!(from = self.capacity, to = capacity, "store capacity grown");
        self.capacity = capacity;
    }

    /// Spawns a new entity.
    ///
    /// Reuses a freed slot when one exists, otherwise extends capacity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExhausted`](crate::StoreError::CapacityExhausted)
    /// when the 20-bit index space is used up.
    pub fn spawn(&mut self) -> StoreResult<EntityId> {
        let id = self.entities.allocate()?;
        let index = id.index() as usize;
        if index >= self.capacity {
            self.reserve((self.capacity * 2).max(index + 1));
        }
        self.alive.set(index);
        Ok(id)
    }

    /// Returns `true` if `id` refers to a live entity of the current generation.
    #[inline]
    #[must_use]
    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.is_alive(id)
    }

    /// Marks `id` for removal at the next [`flush`](Self::flush).
    ///
    /// Returns `false` for stale handles.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.exists(id) {
            return false;
        }
        let index = id.index() as usize;
        let marker = self.table_mut(ComponentKind::Despawned);
        if !marker.contains(index) {
            marker.insert(index, None);
        }
        true
    }

    /// Returns `true` if `id` is marked for removal.
    #[must_use]
    pub fn is_despawning(&self, id: EntityId) -> bool {
        self.has(id, ComponentKind::Despawned)
    }

    /// Applies pending despawns and clears every dirty bitmap.
    ///
    /// Each removed entity has its generation bumped, all component bits
    /// cleared, its slot freed, and an [`Event::Despawned`] emitted.
    pub fn flush(&mut self) -> Vec<EntityId> {
        let pending = self.table(ComponentKind::Despawned).presence().collect();
        let mut removed = Vec::with_capacity(pending.len());

        for index in pending {
            let Some(id) = self.entities.handle_at(index) else {
                self.table_mut(ComponentKind::Despawned).remove(index);
                continue;
            };
            for table in &mut self.tables {
                table.remove(index);
            }
            self.alive.clear(index);
            self.entities.release(id);
            self.events.emit(&Event::Despawned { entity: id });
            removed.push(id);
        }

        for table in &mut self.tables {
            table.clear_dirty();
        }

        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "flushed despawned entities");
        }
        removed
    }

    /// Adds `kind` to `id`, optionally initialising leading fields.
    ///
    /// Existing values are reset. Returns `false` for stale handles.
    pub fn add(&mut self, id: EntityId, kind: ComponentKind, values: Option<&[f64]>) -> bool {
        if !self.exists(id) {
            return false;
        }
        self.table_mut(kind).insert(id.index() as usize, values);
        true
    }

    /// Removes `kind` from `id`. Returns `false` if absent or stale.
    pub fn remove(&mut self, id: EntityId, kind: ComponentKind) -> bool {
        if !self.has(id, kind) {
            return false;
        }
        self.table_mut(kind).remove(id.index() as usize);
        true
    }

    /// Returns `true` if live `id` has `kind`.
    #[inline]
    #[must_use]
    pub fn has(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.exists(id) && self.table(kind).contains(id.index() as usize)
    }

    /// Reads every field of `kind` for `id`.
    #[must_use]
    pub fn get(&self, id: EntityId, kind: ComponentKind) -> Option<Vec<f64>> {
        self.has(id, kind)
            .then(|| self.table(kind).read(id.index() as usize))
    }

    /// Writes the leading fields of `kind` for `id` and marks it dirty.
    ///
    /// A live entity missing the component gets it added. Returns `false`
    /// for stale handles.
    pub fn set(&mut self, id: EntityId, kind: ComponentKind, values: &[f64]) -> bool {
        if !self.exists(id) {
            return false;
        }
        let index = id.index() as usize;
        let table = self.table_mut(kind);
        if table.contains(index) {
            table.write(index, values);
        } else {
            table.insert(index, Some(values));
        }
        true
    }

    /// Reads one field of `kind` for `id`.
    #[must_use]
    pub fn get_field(&self, id: EntityId, kind: ComponentKind, field: usize) -> Option<f64> {
        if !self.has(id, kind) {
            return None;
        }
        self.table(kind).get_field(id.index() as usize, field)
    }

    /// Writes one field of `kind` for `id`. The component must be present.
    pub fn set_field(&mut self, id: EntityId, kind: ComponentKind, field: usize, value: f64) -> bool {
        if !self.has(id, kind) {
            return false;
        }
        self.table_mut(kind).set_field(id.index() as usize, field, value)
    }

    /// Adds a typed component.
    pub fn insert<C: Component>(&mut self, id: EntityId, component: C) -> bool {
        self.add(id, C::KIND, Some(&component.to_values()))
    }

    /// Reads a typed component.
    #[must_use]
    pub fn get_as<C: Component>(&self, id: EntityId) -> Option<C> {
        self.get(id, C::KIND).map(|values| C::from_values(&values))
    }

    /// Writes a typed component, adding it when missing.
    pub fn set_as<C: Component>(&mut self, id: EntityId, component: C) -> bool {
        self.set(id, C::KIND, &component.to_values())
    }

    /// Returns `true` if `kind` on `id` was written since the last flush.
    #[must_use]
    pub fn is_dirty(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.has(id, kind) && self.table(kind).is_dirty(id.index() as usize)
    }

    /// Clears the dirty bitmap of `kind`.
    pub fn clear_dirty(&mut self, kind: ComponentKind) {
        self.table_mut(kind).clear_dirty();
    }

    /// Resolves `filter` against the presence bitmaps.
    #[must_use]
    pub fn query(&self, filter: &Filter) -> Vec<EntityId> {
        let mut acc = self.alive.clone();
        let mut scratch = Bitmap::new(self.capacity);

        for &kind in &filter.all {
            Bitmap::and_into(&acc, self.table(kind).presence(), &mut scratch);
            std::mem::swap(&mut acc, &mut scratch);
        }

        if !filter.any.is_empty() {
            let mut union = Bitmap::new(self.capacity);
            for &kind in &filter.any {
                Bitmap::or_into(&union, self.table(kind).presence(), &mut scratch);
                std::mem::swap(&mut union, &mut scratch);
            }
            Bitmap::and_into(&acc, &union, &mut scratch);
            std::mem::swap(&mut acc, &mut scratch);
        }

        let implicit = (!filter.mentions_despawned()).then_some(ComponentKind::Despawned);
        for kind in filter.none.iter().copied().chain(implicit) {
            Bitmap::not_into(&acc, self.table(kind).presence(), &mut scratch);
            std::mem::swap(&mut acc, &mut scratch);
        }

        acc.iter()
            .filter_map(|index| self.entities.handle_at(index))
            .collect()
    }

    /// Entities having every kind in `kinds`, excluding despawned ones.
    #[must_use]
    pub fn query_kinds(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        self.query(&Filter::all(kinds))
    }

    /// Every live entity not marked for despawn.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        self.query(&Filter::new())
    }

    /// Kinds currently attached to `id`, in id order.
    #[must_use]
    pub fn kinds_of(&self, id: EntityId) -> Vec<ComponentKind> {
        if !self.exists(id) {
            return Vec::new();
        }
        let index = id.index() as usize;
        ComponentKind::ALL
            .iter()
            .copied()
            .filter(|k| self.table(*k).contains(index))
            .collect()
    }

    /// Copies every field-carrying component of `id`.
    #[must_use]
    pub fn snapshot(&self, id: EntityId) -> Option<Snapshot> {
        if !self.exists(id) {
            return None;
        }
        let index = id.index() as usize;
        let mut snapshot = Snapshot::new();
        for table in &self.tables {
            if !table.kind().fields().is_empty() && table.contains(index) {
                snapshot.insert(table.kind(), table.read(index));
            }
        }
        Some(snapshot)
    }

    /// Writes every component in `snapshot` back onto `id`.
    ///
    /// Returns `false` for stale handles.
    pub fn restore(&mut self, id: EntityId, snapshot: &Snapshot) -> bool {
        if !self.exists(id) {
            return false;
        }
        for (kind, values) in snapshot.iter() {
            self.set(id, kind, values);
        }
        true
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}

const _: () = assert!(KIND_COUNT == ComponentKind::ALL.len());

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Position, Velocity};
    use crate::events::{EventKind, SubscribeOptions};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_spawn_and_flush_lifecycle() {
        let mut store = Store::new(4);
        let e = store.spawn().unwrap();
        assert!(store.exists(e));

        assert!(store.despawn(e));
        assert!(store.exists(e), "despawn is deferred");
        assert!(store.entities().is_empty(), "marked entities leave queries");

        assert_eq!(store.flush(), vec![e]);
        assert!(!store.exists(e));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut store = Store::new(4);
        let old = store.spawn().unwrap();
        store.insert(old, Position::new(1.0, 1.0));
        store.despawn(old);
        store.flush();

        let new = store.spawn().unwrap();
        assert_eq!(new.index(), old.index());
        assert!(!store.exists(old));
        assert!(store.exists(new));

        assert!(!store.has(old, ComponentKind::Position));
        assert!(!store.has(new, ComponentKind::Position));
        assert_eq!(store.get(old, ComponentKind::Position), None);
        assert!(!store.set(old, ComponentKind::Position, &[9.0, 9.0]));
        assert!(!store.has(new, ComponentKind::Position));
    }

    #[test]
    fn test_spawn_grows_tables_in_lock_step() {
        let mut store = Store::new(2);
        let mut last = EntityId::NULL;
        for _ in 0..9 {
            last = store.spawn().unwrap();
        }
        assert!(store.capacity() >= 9);
        for kind in ComponentKind::ALL {
            assert!(store.table(kind).capacity() >= store.capacity());
        }
        assert!(store.insert(last, Velocity::new(1.0, 0.0)));
    }

    #[test]
    fn test_set_adds_missing_component_and_marks_dirty() {
        let mut store = Store::new(4);
        let e = store.spawn().unwrap();
        assert!(store.set(e, ComponentKind::Position, &[3.0, 4.0]));
        assert_eq!(store.get_as::<Position>(e), Some(Position::new(3.0, 4.0)));
        assert!(store.is_dirty(e, ComponentKind::Position));

        store.flush();
        assert!(!store.is_dirty(e, ComponentKind::Position));
        store.set_field(e, ComponentKind::Position, 1, 8.0);
        assert!(store.is_dirty(e, ComponentKind::Position));
        assert_eq!(store.get_field(e, ComponentKind::Position, 1), Some(8.0));
    }

    #[test]
    fn test_query_all_any_none() {
        let mut store = Store::new(8);
        let a = store.spawn().unwrap();
        let b = store.spawn().unwrap();
        let c = store.spawn().unwrap();
        store.add(a, ComponentKind::Position, None);
        store.add(a, ComponentKind::Velocity, None);
        store.add(b, ComponentKind::Position, None);
        store.add(b, ComponentKind::Projectile, None);
        store.add(c, ComponentKind::Rotation, None);

        let moving = store.query_kinds(&[ComponentKind::Position, ComponentKind::Velocity]);
        assert_eq!(moving, vec![a]);

        let either = store.query(&Filter::new().any_of(&[ComponentKind::Velocity, ComponentKind::Rotation]));
        assert_eq!(either, vec![a, c]);

        let still = store.query(&Filter::all(&[ComponentKind::Position]).without(&[ComponentKind::Velocity]));
        assert_eq!(still, vec![b]);
    }

    #[test]
    fn test_query_can_ask_for_despawned() {
        let mut store = Store::new(4);
        let a = store.spawn().unwrap();
        let b = store.spawn().unwrap();
        store.despawn(b);

        assert_eq!(store.entities(), vec![a]);
        assert_eq!(store.query_kinds(&[ComponentKind::Despawned]), vec![b]);
    }

    #[test]
    fn test_flush_emits_despawn_event() {
        let mut store = Store::new(4);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.events_mut().on(
            EventKind::Despawned,
            move |event| {
                if let Event::Despawned { entity } = event {
                    sink.lock().unwrap().push(*entity);
                }
            },
            SubscribeOptions::default(),
        );

        let e = store.spawn().unwrap();
        store.despawn(e);
        store.flush();
        assert_eq!(*seen.lock().unwrap(), vec![e]);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut store = Store::new(4);
        let e = store.spawn().unwrap();
        store.add(e, ComponentKind::Sync, None);
        store.insert(e, Position::new(1.0, 2.0));
        store.insert(e, Velocity::new(3.0, 4.0));

        let snap = store.snapshot(e).unwrap();
        assert_eq!(snap.len(), 2, "tag components carry no fields");

        store.set_as(e, Position::new(50.0, 50.0));
        assert!(store.restore(e, &snap));
        assert_eq!(store.get_as::<Position>(e), Some(Position::new(1.0, 2.0)));
    }
}
