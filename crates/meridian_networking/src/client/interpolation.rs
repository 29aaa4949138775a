//! # Remote Entity Interpolation
//!
//! Remote entities only move when a sync lands, every few ticks. Rendering
//! reads a visual position per entity that glides toward the latest
//! replicated one instead:
//!
//! ```text
//! distance = |target − current|
//!
//! > rollback_threshold   jump to target
//! < snap_threshold       settle on target
//! otherwise              current += (target − current) × speed
//! ```
//!
//! The store is never written; the local entity is left to prediction.

use std::collections::{HashMap, HashSet};

use meridian_core::{ComponentKind, EntityId, Position, Store};

use crate::config::InterpolationConfig;

/// Visual state of one remote entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Track {
    /// Where the glide toward `target` started.
    pub previous: Position,
    /// Latest replicated position.
    pub target: Position,
    /// Position to render.
    pub current: Position,
}

impl Track {
    const fn at(position: Position) -> Self {
        Self {
            previous: position,
            target: position,
            current: position,
        }
    }
}

/// Per-entity smoothing of replicated positions.
#[derive(Debug)]
pub struct Interpolation {
    config: InterpolationConfig,
    tracks: HashMap<EntityId, Track>,
}

impl Interpolation {
    /// Creates an interpolator with no tracked entities.
    #[must_use]
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
        }
    }

    /// Whether remote entities are smoothed at all.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track of `entity`, if it is a tracked remote entity.
    #[must_use]
    pub fn track(&self, entity: EntityId) -> Option<&Track> {
        self.tracks.get(&entity)
    }

    /// Position to render `entity` at: its track if smoothed, otherwise
    /// the store's value.
    #[must_use]
    pub fn visual(&self, store: &Store, entity: EntityId) -> Option<Position> {
        self.tracks
            .get(&entity)
            .map(|t| t.current)
            .or_else(|| store.get_as::<Position>(entity))
    }

    /// Moves every remote track one tick toward its replicated position.
    ///
    /// New entities start settled at their position; tracks of entities
    /// that are gone are dropped.
    pub fn update(&mut self, store: &Store, local: Option<EntityId>) {
        if !self.config.enabled {
            self.tracks.clear();
            return;
        }

        let mut live = HashSet::new();
        for entity in store.query_kinds(&[ComponentKind::Position]) {
            if Some(entity) == local {
                continue;
            }
            let Some(position) = store.get_as::<Position>(entity) else {
                continue;
            };
            live.insert(entity);
            match self.tracks.get_mut(&entity) {
                Some(track) => Self::advance(&self.config, entity, track, position),
                None => {
                    self.tracks.insert(entity, Track::at(position));
                }
            }
        }
        self.tracks.retain(|entity, _| live.contains(entity));
    }

    #[allow(clippy::cast_possible_truncation)]
    fn advance(config: &InterpolationConfig, entity: EntityId, track: &mut Track, position: Position) {
        if track.target != position {
            track.previous = track.current;
            track.target = position;
        }

        let dx = track.target.x - track.current.x;
        let dy = track.target.y - track.current.y;
        let distance = f64::from(dx).hypot(f64::from(dy));

        if distance > config.rollback_threshold {
            track.current = track.target;
            tracing::warn!(%entity, distance, "remote entity jumped, snapping");
        } else if distance < config.snap_threshold {
            track.current = track.target;
        } else {
            let speed = config.speed as f32;
            track.current = Position::new(track.current.x + dx * speed, track.current.y + dy * speed);
        }
    }
}
