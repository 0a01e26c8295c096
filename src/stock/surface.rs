//! Blocky surface extraction by face culling.
//!
//! Every present voxel emits a quad (two triangles) for each face whose
//! neighbor is empty or off-grid. Cost is O(total voxels), so callers batch
//! rebuilds instead of running one per sub-step.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::stock::voxel::VoxelGrid;

/// Color of faces at the original stock top
const TOP_COLOR: Vec3 = Vec3::new(0.72, 0.75, 0.78);
/// Color of faces at the stock bottom
const DEEP_COLOR: Vec3 = Vec3::new(0.22, 0.34, 0.52);

/// Neighbor offset, outward normal, and the face's four unit-cube corners
type FaceDef = ([i64; 3], Vec3, [Vec3; 4]);

const fn corners(c: [[f32; 3]; 4]) -> [Vec3; 4] {
    [
        Vec3::from_array(c[0]),
        Vec3::from_array(c[1]),
        Vec3::from_array(c[2]),
        Vec3::from_array(c[3]),
    ]
}

const FACES: [FaceDef; 6] = [
    (
        [-1, 0, 0],
        Vec3::NEG_X,
        corners([[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]]),
    ),
    (
        [1, 0, 0],
        Vec3::X,
        corners([[1.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]]),
    ),
    (
        [0, -1, 0],
        Vec3::NEG_Y,
        corners([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]]),
    ),
    (
        [0, 1, 0],
        Vec3::Y,
        corners([[0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]),
    ),
    (
        [0, 0, -1],
        Vec3::NEG_Z,
        corners([[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]]),
    ),
    (
        [0, 0, 1],
        Vec3::Z,
        corners([[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]]),
    ),
];

/// Triangle soup: three entries per triangle in each array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMesh {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
}

impl SurfaceMesh {
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3, color: Vec3) {
        for index in [0, 1, 2, 0, 2, 3] {
            self.vertices.push(corners[index].to_array());
            self.normals.push(normal.to_array());
            self.colors.push(color.to_array());
        }
    }
}

/// Build the exposed-face mesh of a grid
pub fn extract_surface(grid: &VoxelGrid) -> SurfaceMesh {
    let mut mesh = SurfaceMesh::default();
    let (nx, ny, nz) = grid.shape();
    let s = grid.voxel_size();
    let depth = grid.dimensions().z;

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let (ii, jj, kk) = (i as i64, j as i64, k as i64);
                if !grid.get(ii, jj, kk) {
                    continue;
                }

                let origin = grid.voxel_min(i, j, k);

                for (offset, normal, corners) in &FACES {
                    if grid.get(ii + offset[0], jj + offset[1], kk + offset[2]) {
                        continue;
                    }

                    let world = corners.map(|c| (origin + c.as_dvec3() * s).as_vec3());
                    let face_z = (origin.z + s / 2.0 * (1.0 + f64::from(normal.z))).min(0.0);
                    mesh.push_quad(world, *normal, depth_color(-face_z / depth));
                }
            }
        }
    }

    log::trace!("Surface rebuilt with {} triangles", mesh.triangle_count());
    mesh
}

/// Blend from the top color to the deep color, `t` in 0..=1
///
/// Weighted on both ends so `t = 0` and `t = 1` give the end colors exactly.
fn depth_color(t: f64) -> Vec3 {
    let t = t.clamp(0.0, 1.0) as f32;
    TOP_COLOR * (1.0 - t) + DEEP_COLOR * t
}
