//! Boolean occupancy grid for the remaining stock.
//!
//! The stock block is centered on the XY origin with its top face at Z=0,
//! extending down to -depth. Cell `(i, j, k)` covers
//! `[-dx/2 + i*s, -dx/2 + (i+1)*s)` in X (likewise Y) and
//! `[-dz + k*s, -dz + (k+1)*s)` in Z, so `k` counts layers up from the bottom.

use anyhow::{Result, bail};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Stock block size in mm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockDimensions {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl StockDimensions {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone)]
pub struct VoxelGrid {
    dimensions: StockDimensions,
    voxel_size: f64,
    nx: usize,
    ny: usize,
    nz: usize,
    cells: Vec<bool>, // true = material present
    occupied: usize,
}

impl VoxelGrid {
    /// Full block of material, `ceil(dim / voxel_size)` cells per axis
    pub fn new(dimensions: StockDimensions, voxel_size: f64) -> Result<Self> {
        if !(voxel_size > 0.0) {
            bail!("voxel size must be positive, got {}", voxel_size);
        }
        if !(dimensions.x > 0.0 && dimensions.y > 0.0 && dimensions.z > 0.0) {
            bail!(
                "invalid stock bounds: {} x {} x {}",
                dimensions.x,
                dimensions.y,
                dimensions.z
            );
        }

        let nx = (dimensions.x / voxel_size).ceil() as usize;
        let ny = (dimensions.y / voxel_size).ceil() as usize;
        let nz = (dimensions.z / voxel_size).ceil() as usize;
        let total = nx
            .checked_mul(ny)
            .and_then(|n| n.checked_mul(nz))
            .filter(|n| *n <= isize::MAX as usize);
        let Some(total) = total else {
            bail!("voxel size {} is too small for the stock", voxel_size);
        };

        Ok(Self {
            dimensions,
            voxel_size,
            nx,
            ny,
            nz,
            cells: vec![true; total],
            occupied: total,
        })
    }

    pub fn dimensions(&self) -> StockDimensions {
        self.dimensions
    }

    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// Cell counts along X, Y, Z
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Cells still holding material
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    /// Cells holding material right after construction or `reset`
    pub fn initial_occupied(&self) -> usize {
        self.cells.len()
    }

    fn index(&self, i: usize, j: usize, k: usize) -> usize {
        k * self.nx * self.ny + j * self.nx + i
    }

    /// Material at a cell; anything off-grid is empty
    pub fn get(&self, i: i64, j: i64, k: i64) -> bool {
        if i < 0 || j < 0 || k < 0 {
            return false;
        }
        let (i, j, k) = (i as usize, j as usize, k as usize);
        if i >= self.nx || j >= self.ny || k >= self.nz {
            return false;
        }
        self.cells[self.index(i, j, k)]
    }

    /// Clear a cell. Returns true when material was actually removed.
    pub fn clear(&mut self, i: usize, j: usize, k: usize) -> bool {
        if i >= self.nx || j >= self.ny || k >= self.nz {
            return false;
        }
        let index = self.index(i, j, k);
        if self.cells[index] {
            self.cells[index] = false;
            self.occupied -= 1;
            true
        } else {
            false
        }
    }

    /// Restore the full block
    pub fn reset(&mut self) {
        self.cells.fill(true);
        self.occupied = self.cells.len();
    }

    /// Minimum and maximum world corners of the block
    pub fn bounds(&self) -> (DVec3, DVec3) {
        let d = self.dimensions;
        (
            DVec3::new(-d.x / 2.0, -d.y / 2.0, -d.z),
            DVec3::new(d.x / 2.0, d.y / 2.0, 0.0),
        )
    }

    /// Cell indices containing a world point (may be off-grid)
    pub fn world_to_voxel(&self, point: DVec3) -> [i64; 3] {
        let (origin, _) = self.bounds();
        let cell = ((point - origin) / self.voxel_size).floor();
        [cell.x as i64, cell.y as i64, cell.z as i64]
    }

    /// World coordinates of a cell's minimum corner
    pub fn voxel_min(&self, i: usize, j: usize, k: usize) -> DVec3 {
        let (origin, _) = self.bounds();
        origin + DVec3::new(i as f64, j as f64, k as f64) * self.voxel_size
    }

    pub fn voxel_center(&self, i: usize, j: usize, k: usize) -> DVec3 {
        self.voxel_min(i, j, k) + DVec3::splat(self.voxel_size / 2.0)
    }

    /// Material at a world point
    pub fn contains(&self, point: DVec3) -> bool {
        let [i, j, k] = self.world_to_voxel(point);
        self.get(i, j, k)
    }

    /// Whether a world XY lies over the stock footprint
    pub fn within_footprint(&self, x: f64, y: f64) -> bool {
        let hx = self.dimensions.x / 2.0;
        let hy = self.dimensions.y / 2.0;
        x >= -hx && x < hx && y >= -hy && y < hy
    }

    /// Inclusive cell range along X and Y covering a disc, clamped to the grid
    pub(crate) fn footprint_range(
        &self,
        x: f64,
        y: f64,
        radius: f64,
    ) -> Option<((usize, usize), (usize, usize))> {
        let s = self.voxel_size;
        let clamp = |lo: f64, hi: f64, n: usize| -> Option<(usize, usize)> {
            let lo = lo.floor().max(0.0);
            let hi = hi.floor().min(n as f64 - 1.0);
            if lo > hi {
                None
            } else {
                Some((lo as usize, hi as usize))
            }
        };

        let ox = self.dimensions.x / 2.0;
        let oy = self.dimensions.y / 2.0;
        let xs = clamp((x - radius + ox) / s, (x + radius + ox) / s, self.nx)?;
        let ys = clamp((y - radius + oy) / s, (y + radius + oy) / s, self.ny)?;
        Some((xs, ys))
    }

    /// Inclusive layer range whose cell centers lie within `[z_lo, z_hi]`
    pub(crate) fn layer_range(&self, z_lo: f64, z_hi: f64) -> Option<(usize, usize)> {
        let s = self.voxel_size;
        let lo = ((z_lo + self.dimensions.z) / s - 0.5).ceil().max(0.0);
        let hi = ((z_hi + self.dimensions.z) / s - 0.5)
            .floor()
            .min(self.nz as f64 - 1.0);
        if lo > hi {
            None
        } else {
            Some((lo as usize, hi as usize))
        }
    }
}
