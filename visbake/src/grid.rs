//! Uniform cell lattice over the world bounds.

use glam::{UVec3, Vec3};
use math::Bounds;
use serde::{Deserialize, Serialize};

use crate::BakeError;

/// A cell axis whose square is below this is refused, as is any axis that
/// isn't positive.
pub const MIN_CELL_AXIS_SQUARED: f32 = 0.01;
/// Slack when truncating `size / cell_size`, so a size that is a whole
/// multiple of the cell doesn't lose a cell to rounding.
const COUNT_TOLERANCE: f32 = 1e-4;

pub fn validate_cell_size(cell_size: Vec3) -> Result<(), BakeError> {
    let bad = cell_size
        .to_array()
        .iter()
        .any(|&c| !c.is_finite() || c <= 0.0 || c * c < MIN_CELL_AXIS_SQUARED);
    if bad {
        return Err(BakeError::CellSizeTooSmall { cell_size });
    }
    Ok(())
}

/// Cells per axis, truncating. `world_bounds` is expected to already be a
/// whole number of cells, see [`expand_to_cells`].
pub fn cell_counts(world_bounds: &Bounds, cell_size: Vec3) -> Result<UVec3, BakeError> {
    validate_cell_size(cell_size)?;
    let counts = (world_bounds.size() / cell_size + COUNT_TOLERANCE).floor();
    Ok(counts.max(Vec3::ZERO).as_uvec3())
}

/// Grows `bounds` about its centre until each axis is a whole number of
/// cells (at least one).
pub fn expand_to_cells(bounds: Bounds, cell_size: Vec3) -> Bounds {
    let counts = (bounds.size() / cell_size).ceil().max(Vec3::ONE);
    Bounds::from_center_size(bounds.center(), counts * cell_size)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialGrid {
    world_bounds: Bounds,
    cell_size: Vec3,
    counts: UVec3,
}

impl SpatialGrid {
    pub fn new(world_bounds: Bounds, cell_size: Vec3) -> Result<Self, BakeError> {
        let counts = cell_counts(&world_bounds, cell_size)?;
        Ok(Self {
            world_bounds,
            cell_size,
            counts,
        })
    }

    #[inline]
    pub fn world_bounds(&self) -> &Bounds {
        &self.world_bounds
    }

    #[inline]
    pub fn cell_size(&self) -> Vec3 {
        self.cell_size
    }

    #[inline]
    pub fn counts(&self) -> UVec3 {
        self.counts
    }

    #[inline]
    pub fn total_cells(&self) -> usize {
        self.counts.x as usize * self.counts.y as usize * self.counts.z as usize
    }

    /// `z * count_x * count_y + y * count_x + x`
    #[inline]
    pub fn linear_index(&self, cell: UVec3) -> usize {
        let (cx, cy) = (self.counts.x as usize, self.counts.y as usize);
        cell.z as usize * cx * cy + cell.y as usize * cx + cell.x as usize
    }

    #[inline]
    pub fn cell_at(&self, index: usize) -> UVec3 {
        let (cx, cy) = (self.counts.x as usize, self.counts.y as usize);
        let z = index / (cx * cy);
        let rem = index % (cx * cy);
        UVec3::new((rem % cx) as u32, (rem / cx) as u32, z as u32)
    }

    /// World space box of a cell.
    #[inline]
    pub fn cell_bounds(&self, cell: UVec3) -> Bounds {
        let center = self.world_bounds.min + (cell.as_vec3() + 0.5) * self.cell_size;
        Bounds::from_center_size(center, self.cell_size)
    }

    /// The cell a world point falls in, `None` outside the grid.
    pub fn cell_containing(&self, point: Vec3) -> Option<UVec3> {
        if self.counts.cmpeq(UVec3::ZERO).any() || !self.world_bounds.contains(point) {
            return None;
        }
        let local = ((point - self.world_bounds.min) / self.cell_size).floor();
        Some(local.as_uvec3().min(self.counts - UVec3::ONE))
    }
}
