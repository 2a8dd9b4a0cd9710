//! Uniform-cell spatial hash for broad-phase collision culling.
//!
//! An entry is stored in every cell its bounding circle overlaps, so a
//! query only needs to look at the cells overlapped by the query circle.
//! Results are de-duplicated and sorted by entity ID.

use std::collections::HashMap;

use crate::components::EntityId;
use crate::math::Fixed;

/// Integer cell coordinate on the ground plane.
type CellKey = (i32, i32);

/// Uniform grid over the ground plane (X, Z).
///
/// The cell size should be at least twice the largest collider radius so a
/// body spans at most 2×2 cells.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: Fixed,
    cells: HashMap<CellKey, Vec<EntityId>>,
}

impl SpatialGrid {
    /// Create an empty grid. Non-positive cell sizes are clamped to 1.
    #[must_use]
    pub fn new(cell_size: Fixed) -> Self {
        let cell_size = if cell_size > Fixed::ZERO {
            cell_size
        } else {
            Fixed::ONE
        };
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    /// Edge length of one cell.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// Remove every entry, keeping allocated cells.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
    }

    /// Insert `id` into every cell overlapped by the circle at (`x`, `z`).
    pub fn insert(&mut self, id: EntityId, x: Fixed, z: Fixed, radius: Fixed) {
        let (min, max) = self.cell_range(x, z, radius);
        for cx in min.0..=max.0 {
            for cz in min.1..=max.1 {
                self.cells.entry((cx, cz)).or_default().push(id);
            }
        }
    }

    /// Candidate IDs near the circle at (`x`, `z`), sorted and unique.
    #[must_use]
    pub fn query(&self, x: Fixed, z: Fixed, radius: Fixed) -> Vec<EntityId> {
        let (min, max) = self.cell_range(x, z, radius);
        let mut found = Vec::new();
        for cx in min.0..=max.0 {
            for cz in min.1..=max.1 {
                if let Some(bucket) = self.cells.get(&(cx, cz)) {
                    found.extend_from_slice(bucket);
                }
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Number of non-empty cells (diagnostics).
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.cells.values().filter(|bucket| !bucket.is_empty()).count()
    }

    fn cell_of(&self, coord: Fixed) -> i32 {
        (coord / self.cell_size).floor().saturating_to_num::<i32>()
    }

    fn cell_range(&self, x: Fixed, z: Fixed, radius: Fixed) -> (CellKey, CellKey) {
        let radius = radius.max(Fixed::ZERO);
        (
            (self.cell_of(x - radius), self.cell_of(z - radius)),
            (self.cell_of(x + radius), self.cell_of(z + radius)),
        )
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(Fixed::from_num(4))
    }
}
