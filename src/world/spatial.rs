//! Spatial grid for area-of-interest queries.
//!
//! Divides the world into fixed-size cells and stores the player ids
//! occupying each cell. Visibility queries check the player's own cell plus
//! its eight neighbors, so a player sees everything within one cell-width on
//! either axis.

use hashbrown::{HashMap, HashSet};

use crate::world::constants::world::CELL_SIZE;
use crate::world::registry::PlayerId;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Convert a world position to its cell key.
#[inline]
pub fn cell_for(x: f64, y: f64) -> CellKey {
    ((x / CELL_SIZE).floor() as i32, (y / CELL_SIZE).floor() as i32)
}

/// Cell-keyed index of player ids for proximity queries.
///
/// Invariant: a player id lives in exactly one cell-set at a time, matching
/// the cell derived from its position. The owning room updates the index and
/// the player record together, so callers never observe a half-moved player.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    cells: HashMap<CellKey, HashSet<PlayerId>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }

    /// Add a player to a cell. No-op if already present.
    pub fn insert(&mut self, player: PlayerId, cell: CellKey) {
        self.cells.entry(cell).or_default().insert(player);
    }

    /// Remove a player from a cell, dropping the cell-set once empty so
    /// memory stays bounded by occupied cells.
    pub fn remove(&mut self, player: &str, cell: CellKey) {
        if let Some(ids) = self.cells.get_mut(&cell) {
            ids.remove(player);
            if ids.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Move a player between cells. No-op when the cells are equal.
    pub fn relocate(&mut self, player: &str, old: CellKey, new: CellKey) {
        if old == new {
            return;
        }
        self.remove(player, old);
        self.insert(player.to_owned(), new);
    }

    /// Union of the 3x3 block of cells centered on `center`.
    ///
    /// Cells are unbounded integers; nothing special happens at world edges
    /// because no cells exist beyond populated ones.
    pub fn neighbors(&self, center: CellKey) -> HashSet<PlayerId> {
        let (cx, cy) = center;
        let mut out = HashSet::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = self.cells.get(&(cx + dx, cy + dy)) {
                    out.extend(ids.iter().cloned());
                }
            }
        }
        out
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Every cell currently containing the given player id. The single-cell
    /// invariant means this has at most one element; exposed for tests and
    /// debug assertions.
    pub fn cells_containing(&self, player: &str) -> Vec<CellKey> {
        self.cells
            .iter()
            .filter(|(_, ids)| ids.contains(player))
            .map(|(cell, _)| *cell)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_for_floor_division() {
        assert_eq!(cell_for(0.0, 0.0), (0, 0));
        assert_eq!(cell_for(199.9, 199.9), (0, 0));
        assert_eq!(cell_for(200.0, 0.0), (1, 0));
        assert_eq!(cell_for(-0.1, 450.0), (-1, 2));
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut index = SpatialIndex::new();
        index.insert("a".into(), (0, 0));
        index.insert("a".into(), (0, 0));

        assert_eq!(index.cells_containing("a"), vec![(0, 0)]);
        assert_eq!(index.neighbors((0, 0)).len(), 1);
    }

    #[test]
    fn test_remove_drops_empty_cell() {
        let mut index = SpatialIndex::new();
        index.insert("a".into(), (2, 3));
        assert_eq!(index.occupied_cells(), 1);

        index.remove("a", (2, 3));
        assert_eq!(index.occupied_cells(), 0);
    }

    #[test]
    fn test_relocate_same_cell_is_noop() {
        let mut index = SpatialIndex::new();
        index.insert("a".into(), (1, 1));
        index.relocate("a", (1, 1), (1, 1));

        assert_eq!(index.cells_containing("a"), vec![(1, 1)]);
    }

    #[test]
    fn test_relocate_keeps_single_cell_invariant() {
        let mut index = SpatialIndex::new();
        index.insert("a".into(), (0, 0));

        index.relocate("a", (0, 0), (4, -2));
        index.relocate("a", (4, -2), (4, -1));

        assert_eq!(index.cells_containing("a"), vec![(4, -1)]);
        assert_eq!(index.occupied_cells(), 1);
    }

    #[test]
    fn test_neighbors_covers_3x3_block() {
        let mut index = SpatialIndex::new();
        index.insert("center".into(), (5, 5));
        index.insert("corner".into(), (6, 6));
        index.insert("edge".into(), (4, 5));
        index.insert("far".into(), (8, 5));

        let near = index.neighbors((5, 5));
        assert!(near.contains("center"));
        assert!(near.contains("corner"));
        assert!(near.contains("edge"));
        assert!(!near.contains("far"));
    }

    #[test]
    fn test_neighbors_is_idempotent() {
        let mut index = SpatialIndex::new();
        index.insert("a".into(), (0, 0));
        index.insert("b".into(), (1, 0));

        let first = index.neighbors((0, 0));
        let second = index.neighbors((0, 0));
        assert_eq!(first, second);
    }

    #[test]
    fn test_neighbors_of_unpopulated_cell_is_empty() {
        let index = SpatialIndex::new();
        assert!(index.neighbors((100, 100)).is_empty());
    }
}
