//! World-space triangle mesh (`spec.md` §4.3).
//!
//! Grounded on `src/asset.rs`'s `walk_node_graph` (teacher): vertices are
//! transformed by the node's TRS matrix, normals by the rotation/inverse-scale
//! and renormalized. The teacher walks a whole scene-graph of nested node
//! transforms accumulated depth-first; here there is exactly one transform per
//! entity (`vecmath::build_world_transform`), so the walk collapses to a single
//! pass over the parsed mesh's faces.

use crate::error::GeometryError;
use crate::triangle::Triangle;
use crate::vecmath::{inverse_transpose, transform_normal, Mat4, Vec3};
use shared_structs::MeshData;

/// A mesh transformed into world space: a flat list of triangles plus the
/// bounding box used to seed octree construction.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
}

impl Mesh {
    /// Applies `world` to every vertex position and `inverse_transpose(world)`
    /// to every vertex normal, building one `Triangle` per face. A
    /// non-triangular face or an out-of-bounds index is a fatal `GeometryError`
    /// at load, per §6 ("Non-triangular faces are a fatal parse error.") and
    /// §4.2's degenerate-triangle handling.
    pub fn from_data(data: &MeshData, world: Mat4) -> Result<Self, GeometryError> {
        let normal_matrix = inverse_transpose(world)?;

        let positions: Vec<Vec3> = data
            .positions
            .iter()
            .map(|&[x, y, z]| world.transform_point3(Vec3::new(x, y, z)))
            .collect();

        let mut normals: Vec<Vec3> = Vec::with_capacity(data.normals.len());
        for &[x, y, z] in &data.normals {
            normals.push(transform_normal(normal_matrix, Vec3::new(x, y, z))?);
        }

        let mut triangles = Vec::with_capacity(data.faces.len());
        let mut aabb_min = Vec3::splat(f64::INFINITY);
        let mut aabb_max = Vec3::splat(f64::NEG_INFINITY);

        for face in &data.faces {
            let mut verts = [Vec3::ZERO; 3];
            let mut norms = [Vec3::ZERO; 3];
            for (i, &(pos_idx, norm_idx)) in face.iter().enumerate() {
                verts[i] = *positions
                    .get(pos_idx as usize)
                    .ok_or(GeometryError::IndexOutOfBounds(pos_idx, positions.len()))?;
                norms[i] = *normals
                    .get(norm_idx as usize)
                    .ok_or(GeometryError::IndexOutOfBounds(norm_idx, normals.len()))?;
            }
            let tri = Triangle::new(
                verts[0], verts[1], verts[2], norms[0], norms[1], norms[2],
            );
            if tri.is_degenerate() {
                return Err(GeometryError::DegenerateTriangle);
            }
            aabb_min = aabb_min.min(tri.aabb_min());
            aabb_max = aabb_max.max(tri.aabb_max());
            triangles.push(tri);
        }

        Ok(Self {
            triangles,
            aabb_min,
            aabb_max,
        })
    }

    pub fn total_area(&self) -> f64 {
        self.triangles.iter().map(|t| t.area).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vecmath::build_world_transform;

    fn unit_quad() -> MeshData {
        MeshData {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]],
            faces: vec![
                [(0, 0), (1, 0), (2, 0)],
                [(0, 0), (2, 0), (3, 0)],
            ],
        }
    }

    #[test]
    fn identity_transform_preserves_positions() {
        let data = unit_quad();
        let mesh = Mesh::from_data(&data, Mat4::IDENTITY).unwrap();
        assert_eq!(mesh.triangles.len(), 2);
        assert!((mesh.triangles[0].v1 - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn translation_moves_aabb() {
        let data = unit_quad();
        let world =
            build_world_transform(Vec3::new(10.0, 0.0, 0.0), Vec3::Z, 0.0, Vec3::ONE).unwrap();
        let mesh = Mesh::from_data(&data, world).unwrap();
        assert!(mesh.aabb_min.x >= 9.999);
    }

    #[test]
    fn non_triangular_face_rejected_at_construction() {
        // faces are always stored as [(u32,u32);3] at the type level, so
        // non-triangular faces are rejected earlier, by the mesh-file parser;
        // here we only need out-of-bounds indices to produce an error.
        let mut data = unit_quad();
        data.faces.push([(0, 0), (1, 0), (99, 0)]);
        let err = Mesh::from_data(&data, Mat4::IDENTITY).unwrap_err();
        assert!(matches!(err, GeometryError::IndexOutOfBounds(99, _)));
    }

    #[test]
    fn degenerate_triangle_rejected() {
        let data = MeshData {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]],
            faces: vec![[(0, 0), (1, 0), (2, 0)]],
        };
        let err = Mesh::from_data(&data, Mat4::IDENTITY).unwrap_err();
        assert!(matches!(err, GeometryError::DegenerateTriangle));
    }
}
