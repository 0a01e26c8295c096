//! Voxel Stock Model
//!
//! Remaining material as a boolean grid, removal along the tool path, the
//! derived surface mesh, and rapid-move collision checks.

pub mod collision;
pub mod surface;
pub mod voxel;

use anyhow::Result;
use glam::DVec3;
use serde::{Deserialize, Serialize};

pub use collision::{CollisionEvent, CollisionKind, check_collision};
pub use surface::{SurfaceMesh, extract_surface};
pub use voxel::{StockDimensions, VoxelGrid};

/// Feeds above this are treated as not cutting, mm/min
pub const DEFAULT_MAX_CUTTING_FEED: f64 = 5000.0;

/// Outcome of one removal call
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RemovalResult {
    /// mm³, voxel count times voxel volume
    pub volume_removed: f64,
    pub voxels_removed: usize,
    /// Material was removed at a feed outside the cutting range
    pub collision_suspected: bool,
}

impl RemovalResult {
    fn merge(&mut self, other: RemovalResult) {
        self.volume_removed += other.volume_removed;
        self.voxels_removed += other.voxels_removed;
        self.collision_suspected |= other.collision_suspected;
    }
}

#[derive(Debug, Clone)]
pub struct StockModel {
    grid: VoxelGrid,
    max_cutting_feed: f64,
}

impl StockModel {
    pub fn new(dimensions: StockDimensions, voxel_size: f64) -> Result<Self> {
        let grid = VoxelGrid::new(dimensions, voxel_size)?;
        let (nx, ny, nz) = grid.shape();
        log::debug!(
            "Stock {} x {} x {} mm at {} mm voxels ({} x {} x {})",
            dimensions.x,
            dimensions.y,
            dimensions.z,
            voxel_size,
            nx,
            ny,
            nz
        );
        Ok(Self {
            grid,
            max_cutting_feed: DEFAULT_MAX_CUTTING_FEED,
        })
    }

    pub fn with_max_cutting_feed(mut self, feed: f64) -> Self {
        self.max_cutting_feed = feed;
        self
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn occupied(&self) -> usize {
        self.grid.occupied()
    }

    pub fn initial_occupied(&self) -> usize {
        self.grid.initial_occupied()
    }

    pub fn contains(&self, point: DVec3) -> bool {
        self.grid.contains(point)
    }

    /// Clear a vertical cylinder of diameter `diameter` spanning from
    /// `center.z` down `length`. A voxel goes when its center is inside.
    pub fn remove_material(
        &mut self,
        center: DVec3,
        diameter: f64,
        length: f64,
        feed: f64,
    ) -> RemovalResult {
        let radius = diameter.max(0.0) / 2.0;
        let Some(((i0, i1), (j0, j1))) = self.grid.footprint_range(center.x, center.y, radius)
        else {
            return RemovalResult::default();
        };
        let Some((k0, k1)) = self.grid.layer_range(center.z - length.max(0.0), center.z) else {
            return RemovalResult::default();
        };

        let r2 = radius * radius;
        let mut removed = 0;
        for j in j0..=j1 {
            for i in i0..=i1 {
                let offset = self.grid.voxel_center(i, j, 0).truncate() - center.truncate();
                if offset.length_squared() > r2 {
                    continue;
                }
                for k in k0..=k1 {
                    if self.grid.clear(i, j, k) {
                        removed += 1;
                    }
                }
            }
        }

        let s = self.grid.voxel_size();
        let suspected = removed > 0 && (feed <= 0.0 || feed > self.max_cutting_feed);
        if suspected {
            log::warn!(
                "Removed {} voxels at feed {} outside the cutting range",
                removed,
                feed
            );
        }

        RemovalResult {
            volume_removed: removed as f64 * s * s * s,
            voxels_removed: removed,
            collision_suspected: suspected,
        }
    }

    /// Sweep the cylinder from `from` to `to`, sampling at most half a voxel apart
    ///
    /// Only the part of the segment that can reach the stock is sampled.
    pub fn remove_along(
        &mut self,
        from: DVec3,
        to: DVec3,
        diameter: f64,
        length: f64,
        feed: f64,
    ) -> RemovalResult {
        let radius = diameter.max(0.0) / 2.0;
        let (lo, hi) = self.grid.bounds();
        // the cylinder reaches the block only while its top is within `length` above it
        let reach = DVec3::new(radius, radius, 0.0);
        let top = DVec3::Z * length.max(0.0);
        let Some((t0, t1)) = clip_segment(from, to, lo - reach, hi + reach + top) else {
            return RemovalResult::default();
        };

        let start = from.lerp(to, t0);
        let end = from.lerp(to, t1);
        let spacing = self.grid.voxel_size() / 2.0;
        let steps = ((start.distance(end) / spacing).ceil() as usize).max(1);

        let mut total = RemovalResult::default();
        for step in 0..=steps {
            let point = start.lerp(end, step as f64 / steps as f64);
            total.merge(self.remove_material(point, diameter, length, feed));
        }
        total
    }

    pub fn rebuild_surface(&self) -> SurfaceMesh {
        extract_surface(&self.grid)
    }

    pub fn check_collision(
        &self,
        center: DVec3,
        diameter: f64,
        is_rapid: bool,
    ) -> CollisionEvent {
        check_collision(&self.grid, center, diameter, is_rapid)
    }

    pub fn reset(&mut self) {
        self.grid.reset();
    }
}

/// Parameter range `[t0, t1]` of the segment inside the box `[lo, hi]`
fn clip_segment(from: DVec3, to: DVec3, lo: DVec3, hi: DVec3) -> Option<(f64, f64)> {
    let delta = to - from;
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for axis in 0..3 {
        let (p, d) = (from[axis], delta[axis]);
        if d == 0.0 {
            if p < lo[axis] || p > hi[axis] {
                return None;
            }
            continue;
        }
        let (a, b) = ((lo[axis] - p) / d, (hi[axis] - p) / d);
        t0 = t0.max(a.min(b));
        t1 = t1.min(a.max(b));
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}
