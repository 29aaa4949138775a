//! # Entity Management
//!
//! Entities are 32-bit handles consisting of:
//! - A 20-bit slot index into component tables
//! - A 12-bit generation counter for safe slot reuse

use crate::error::{StoreError, StoreResult};

/// Number of bits used for the slot index.
pub const INDEX_BITS: u32 = 20;

/// Number of bits used for the generation counter.
pub const GENERATION_BITS: u32 = 12;

/// Mask selecting the slot index.
pub const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// Largest generation a slot can carry before it is retired.
pub const MAX_GENERATION: u16 = (1 << GENERATION_BITS) - 1;

/// Largest usable slot index. The all-ones handle is reserved for [`EntityId::NULL`].
pub const MAX_INDEX: u32 = INDEX_MASK - 1;

/// Unique identifier for an entity.
///
/// Layout:
/// - Bits 0..20: slot index
/// - Bits 20..32: generation
///
/// A handle is valid only while the store's generation for its slot
/// matches the handle's generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Null/invalid entity ID.
    pub const NULL: Self = Self(u32::MAX);

    /// Creates a new entity ID from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - Slot index (masked to 20 bits)
    /// * `generation` - Generation counter (masked to 12 bits)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u16) -> Self {
        Self(((generation as u32 & MAX_GENERATION as u32) << INDEX_BITS) | (index & INDEX_MASK))
    }

    /// Reconstructs a handle from its packed wire form.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the packed 32-bit form.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Returns the slot index portion of the handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    /// Returns the generation portion of the handle.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn generation(self) -> u16 {
        (self.0 >> INDEX_BITS) as u16
    }

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index(), self.generation())
    }
}

/// Slot allocator: generations, free list, and live count.
#[derive(Clone, Debug, Default)]
pub struct Entities {
    /// Current generation per slot.
    generations: Vec<u16>,
    /// Whether each slot currently holds a live entity.
    alive: Vec<bool>,
    /// Slots ready for reuse.
    free: Vec<u32>,
    /// Number of live entities.
    len: usize,
    /// Slots retired after exhausting their generation space.
    retired: usize,
}

impl Entities {
    /// Creates an allocator with room for `capacity` slots before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            generations: Vec::with_capacity(capacity),
            alive: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
            retired: 0,
        }
    }

    /// Returns the number of live entities.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no entity is live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots ever handed out.
    #[inline]
    #[must_use]
    pub fn slots(&self) -> usize {
        self.generations.len()
    }

    /// Returns the number of retired slots.
    #[inline]
    #[must_use]
    pub const fn retired(&self) -> usize {
        self.retired
    }

    /// Allocates a handle, reusing a free slot when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExhausted`] once every index up to
    /// [`MAX_INDEX`] is in use or retired.
    pub fn allocate(&mut self) -> StoreResult<EntityId> {
        let index = if let Some(index) = self.free.pop() {
            index
        } else {
            let exhausted = StoreError::CapacityExhausted {
                limit: MAX_INDEX as usize + 1,
            };
            let next = u32::try_from(self.generations.len()).map_err(|_| exhausted.clone())?;
            if next > MAX_INDEX {
                return Err(exhausted);
            }
            self.generations.push(0);
            self.alive.push(false);
            next
        };

        let slot = index as usize;
        self.alive[slot] = true;
        self.len += 1;
        Ok(EntityId::new(index, self.generations[slot]))
    }

    /// Releases a live handle's slot and bumps its generation.
    ///
    /// Returns `false` for stale or already released handles. A slot whose
    /// generation is exhausted is retired instead of returned to the free list.
    pub fn release(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let slot = id.index() as usize;
        self.alive[slot] = false;
        self.len -= 1;

        let generation = self.generations[slot];
        if generation >= MAX_GENERATION {
            self.retired += 1;
            tracing::warn!(index = id.index(), "slot generation exhausted, retiring slot");
            return true;
        }
        self.generations[slot] = generation + 1;
        self.free.push(id.index());
        true
    }

    /// Checks that the handle refers to a live entity of the current generation.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }
        let slot = id.index() as usize;
        self.alive.get(slot).copied().unwrap_or(false)
            && self.generations[slot] == id.generation()
    }

    /// Returns the live handle occupying `index`, if any.
    #[must_use]
    pub fn handle_at(&self, index: usize) -> Option<EntityId> {
        if !self.alive.get(index).copied().unwrap_or(false) {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        Some(EntityId::new(index as u32, self.generations[index]))
    }

    #[cfg(test)]
    pub(crate) fn force_generation(&mut self, index: u32, generation: u16) {
        self.generations[index as usize] = generation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_roundtrip() {
        let id = EntityId::new(12345, 678);
        assert_eq!(id.index(), 12345);
        assert_eq!(id.generation(), 678);
        assert_eq!(EntityId::from_bits(id.to_bits()), id);
    }

    #[test]
    fn test_entity_id_masks_fields() {
        let id = EntityId::new(MAX_INDEX, MAX_GENERATION);
        assert_eq!(id.index(), MAX_INDEX);
        assert_eq!(id.generation(), MAX_GENERATION);
        assert!(!id.is_null());
    }

    #[test]
    fn test_reuse_bumps_generation() {
        let mut entities = Entities::with_capacity(4);
        let a = entities.allocate().unwrap();
        assert!(entities.release(a));

        let b = entities.allocate().unwrap();
        assert_eq!(a.index(), b.index());
        assert_eq!(b.generation(), a.generation() + 1);
        assert!(!entities.is_alive(a));
        assert!(entities.is_alive(b));
    }

    #[test]
    fn test_release_twice_is_noop() {
        let mut entities = Entities::default();
        let a = entities.allocate().unwrap();
        assert!(entities.release(a));
        assert!(!entities.release(a));
        assert_eq!(entities.len(), 0);
    }

    #[test]
    fn test_exhausted_generation_retires_slot() {
        let mut entities = Entities::default();
        let a = entities.allocate().unwrap();
        entities.force_generation(a.index(), MAX_GENERATION);
        let stale = EntityId::new(a.index(), MAX_GENERATION);

        assert!(entities.release(stale));
        assert_eq!(entities.retired(), 1);

        let b = entities.allocate().unwrap();
        assert_ne!(b.index(), a.index());
    }
}
