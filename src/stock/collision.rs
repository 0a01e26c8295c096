//! Rapid-move collision check against the voxel stock.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::stock::voxel::VoxelGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionKind {
    /// Rapid (G0) positioned the tool inside material
    RapidThroughStock,
}

/// Result of a collision check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub collision: bool,
    /// Tool center at the time of the collision
    pub position: Option<DVec3>,
    pub kind: Option<CollisionKind>,
}

impl CollisionEvent {
    pub fn clear() -> Self {
        Self {
            collision: false,
            position: None,
            kind: None,
        }
    }

    pub fn detected(position: DVec3, kind: CollisionKind) -> Self {
        Self {
            collision: true,
            position: Some(position),
            kind: Some(kind),
        }
    }
}

/// Test the tool's current Z slab for material under its footprint.
///
/// Only rapids are checked, and only the slab at the sampled position: a
/// rapid that passes through material between two samples is not seen.
/// Callers wanting swept coverage must sample the move themselves.
pub fn check_collision(
    grid: &VoxelGrid,
    center: DVec3,
    diameter: f64,
    is_rapid: bool,
) -> CollisionEvent {
    if !is_rapid {
        return CollisionEvent::clear();
    }
    if center.z >= 0.0 || !grid.within_footprint(center.x, center.y) {
        return CollisionEvent::clear();
    }

    let [ci, cj, k] = grid.world_to_voxel(center);
    if grid.get(ci, cj, k) {
        return hit(center);
    }

    let radius = diameter.max(0.0) / 2.0;
    let Some(((i0, i1), (j0, j1))) = grid.footprint_range(center.x, center.y, radius) else {
        return CollisionEvent::clear();
    };
    let r2 = radius * radius;

    for j in j0..=j1 {
        for i in i0..=i1 {
            if !grid.get(i as i64, j as i64, k) {
                continue;
            }
            let offset = grid.voxel_center(i, j, 0).truncate() - center.truncate();
            if offset.length_squared() <= r2 {
                return hit(center);
            }
        }
    }

    CollisionEvent::clear()
}

fn hit(center: DVec3) -> CollisionEvent {
    log::warn!(
        "Rapid move into stock at ({:.3}, {:.3}, {:.3})",
        center.x,
        center.y,
        center.z
    );
    CollisionEvent::detected(center, CollisionKind::RapidThroughStock)
}
