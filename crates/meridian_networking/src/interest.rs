//! # Spatial Interest
//!
//! A uniform grid of square cells. A connection sees every entity in the
//! `(2r + 1)²` cells around its own.
//!
//! ```text
//! ┌───┬───┬───┐
//! │ · │ · │ · │   r = 1: the observer's cell and its eight neighbours
//! ├───┼───┼───┤
//! │ · │ ● │ · │
//! ├───┼───┼───┤
//! │ · │ · │ · │
//! └───┴───┴───┘
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};

use meridian_core::{ComponentKind, EntityId, Position, Store};

use crate::config::InterestConfig;

type Cell = (i32, i32);

/// Entity membership per grid cell.
#[derive(Debug, Default)]
pub struct InterestGrid {
    cell_size: f64,
    radius: i32,
    cells: HashMap<Cell, BTreeSet<EntityId>>,
    located: HashMap<EntityId, Cell>,
}

impl InterestGrid {
    /// Creates an empty grid.
    #[must_use]
    pub fn new(config: &InterestConfig) -> Self {
        Self {
            cell_size: config.cell_size,
            radius: i32::try_from(config.radius).unwrap_or(i32::MAX),
            cells: HashMap::new(),
            located: HashMap::new(),
        }
    }

    /// Cell containing world position `(x, y)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cell_of(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.located.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.located.is_empty()
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Places or moves `entity`. Emptied cells are dropped.
    pub fn update(&mut self, entity: EntityId, x: f64, y: f64) {
        let cell = self.cell_of(x, y);
        match self.located.insert(entity, cell) {
            Some(previous) if previous == cell => return,
            Some(previous) => self.leave(entity, previous),
            None => {}
        }
        self.cells.entry(cell).or_default().insert(entity);
    }

    /// Stops tracking `entity`.
    pub fn remove(&mut self, entity: EntityId) {
        if let Some(cell) = self.located.remove(&entity) {
            self.leave(entity, cell);
        }
    }

    fn leave(&mut self, entity: EntityId, cell: Cell) {
        if let Some(members) = self.cells.get_mut(&cell) {
            members.remove(&entity);
            if members.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Every tracked entity within the radius of `(x, y)`, in handle order.
    #[must_use]
    pub fn nearby(&self, x: f64, y: f64) -> Vec<EntityId> {
        let (cx, cy) = self.cell_of(x, y);
        let r = self.radius;
        let mut found = BTreeSet::new();
        for dx in -r..=r {
            for dy in -r..=r {
                let cell = (cx.saturating_add(dx), cy.saturating_add(dy));
                if let Some(members) = self.cells.get(&cell) {
                    found.extend(members.iter().copied());
                }
            }
        }
        found.into_iter().collect()
    }

    /// Re-places every replicated positioned entity and forgets the rest.
    pub fn refresh(&mut self, store: &Store) {
        let tracked = store.query_kinds(&[ComponentKind::Sync, ComponentKind::Position]);
        let live: HashSet<EntityId> = tracked.iter().copied().collect();
        let stale: Vec<EntityId> = self
            .located
            .keys()
            .filter(|e| !live.contains(*e))
            .copied()
            .collect();
        for entity in stale {
            self.remove(entity);
        }
        for entity in tracked {
            if let Some(position) = store.get_as::<Position>(entity) {
                self.update(entity, f64::from(position.x), f64::from(position.y));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> InterestGrid {
        InterestGrid::new(&InterestConfig {
            cell_size: 100.0,
            radius: 1,
        })
    }

    #[test]
    fn test_cell_of_floors_negative() {
        let grid = grid();
        assert_eq!(grid.cell_of(50.0, 150.0), (0, 1));
        assert_eq!(grid.cell_of(-1.0, -100.0), (-1, -1));
    }

    #[test]
    fn test_nearby_covers_neighbour_cells_only() {
        let mut grid = grid();
        let near = EntityId::new(1, 0);
        let diagonal = EntityId::new(2, 0);
        let far = EntityId::new(3, 0);
        grid.update(near, 10.0, 10.0);
        grid.update(diagonal, 190.0, 190.0);
        grid.update(far, 250.0, 10.0);

        assert_eq!(grid.nearby(50.0, 50.0), vec![near, diagonal]);
        assert_eq!(grid.nearby(250.0, 50.0), vec![diagonal, far]);
    }

    #[test]
    fn test_moves_drop_empty_cells() {
        let mut grid = grid();
        let e = EntityId::new(1, 0);
        grid.update(e, 10.0, 10.0);
        grid.update(e, 510.0, 10.0);
        assert_eq!(grid.occupied_cells(), 1);
        assert!(grid.nearby(0.0, 0.0).is_empty());

        grid.remove(e);
        assert!(grid.is_empty());
        assert_eq!(grid.occupied_cells(), 0);
    }

    #[test]
    fn test_refresh_follows_store() {
        let mut store = Store::new(8);
        let a = store.spawn().unwrap();
        store.add(a, ComponentKind::Sync, None);
        store.insert(a, Position::new(10.0, 10.0));
        let hidden = store.spawn().unwrap();
        store.insert(hidden, Position::new(10.0, 10.0));

        let mut grid = grid();
        grid.refresh(&store);
        assert_eq!(grid.nearby(0.0, 0.0), vec![a]);

        store.despawn(a);
        grid.refresh(&store);
        assert!(grid.is_empty());
    }
}
