//! Triangle primitive (`spec.md` §4.2): three vertices with per-vertex normals,
//! Möller–Trumbore intersection with fixed tie-breaks, and uniform surface
//! sampling.
//!
//! Grounded on `kernels/src/intersection.rs`'s `muller_trumbore` (teacher),
//! carried over from f32/glam::Vec3 to f64/`vecmath::Vec3` and extended with
//! barycentric normal interpolation, since the teacher discards the hit normal
//! entirely (it re-derives shading normals from a separate vertex buffer).

use crate::random::Rng01;
use crate::vecmath::{Vec3, Vec3Ext};

/// Geometric tolerance for triangle/ray rejection (`spec.md` §6: "machine
/// epsilon for tri/ray rejection").
pub const EPS: f64 = f64::EPSILON;

#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub n0: Vec3,
    pub n1: Vec3,
    pub n2: Vec3,
    /// Cross of two edges, normalized. Used for tri/box overlap and as a
    /// fallback normal when barycentric interpolation is degenerate.
    pub plane_normal: Vec3,
    pub area: f64,
}

pub struct Hit {
    pub distance: f64,
    pub normal: Vec3,
    pub barycentric: Vec3,
}

impl Triangle {
    /// Builds a triangle from three positions and their per-vertex normals.
    /// The geometric normal and area are precomputed from the edges; this does
    /// not fail on a degenerate (zero-area) triangle so that mesh loading can
    /// decide whether to treat it as fatal (see `Mesh::from_data`).
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, n0: Vec3, n1: Vec3, n2: Vec3) -> Self {
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        let cross = edge1.cross(edge2);
        let area = cross.length() * 0.5;
        let plane_normal = cross.try_normalize_checked().unwrap_or(Vec3::Z);
        Self {
            v0,
            v1,
            v2,
            n0,
            n1,
            n2,
            plane_normal,
            area,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.area <= EPS
    }

    /// Möller–Trumbore intersection. Miss conditions are the fixed tie-breaks of
    /// `spec.md` §4.2 and must be reproduced exactly:
    /// - `|edge1 · (dir × edge2)| ≤ ε`
    /// - any barycentric coordinate < 0
    /// - intersection distance ≤ 0
    pub fn intersect(&self, origin: Vec3, dir: Vec3) -> Option<Hit> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let pvec = dir.cross(edge2);
        let det = edge1.dot(pvec);
        if det.abs() <= EPS {
            return None;
        }
        let inv_det = 1.0 / det;

        let tvec = origin - self.v0;
        let u = tvec.dot(pvec) * inv_det;
        if u < 0.0 {
            return None;
        }

        let qvec = tvec.cross(edge1);
        let v = dir.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(qvec) * inv_det;
        if t <= 0.0 {
            return None;
        }

        let w = 1.0 - u - v;
        let normal = (w * self.n0 + u * self.n1 + v * self.n2)
            .try_normalize_checked()
            .unwrap_or(self.plane_normal);

        Some(Hit {
            distance: t,
            normal,
            barycentric: Vec3::new(w, u, v),
        })
    }

    /// Uniform surface sample: `(u, v)` uniform in the unit square, folded about
    /// the diagonal when `u + v > 1`, per `spec.md` §4.2.
    pub fn sample_surface(&self, rng: &mut impl Rng01) -> (Vec3, Vec3) {
        let mut u = rng.next_f64();
        let mut v = rng.next_f64();
        if u + v > 1.0 {
            u = 1.0 - u;
            v = 1.0 - v;
        }
        let w = 1.0 - u - v;
        let point = w * self.v0 + u * self.v1 + v * self.v2;
        let normal = (w * self.n0 + u * self.n1 + v * self.n2)
            .try_normalize_checked()
            .unwrap_or(self.plane_normal);
        (point, normal)
    }

    pub fn aabb_min(&self) -> Vec3 {
        self.v0.min(self.v1).min(self.v2)
    }

    pub fn aabb_max(&self) -> Vec3 {
        self.v0.max(self.v1).max(self.v2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::StdRng01;

    fn unit_xy_triangle() -> Triangle {
        Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::Z,
            Vec3::Z,
            Vec3::Z,
        )
    }

    #[test]
    fn hits_from_above_along_negative_z() {
        let tri = unit_xy_triangle();
        let hit = tri
            .intersect(Vec3::new(0.2, 0.2, 1.0), Vec3::new(0.0, 0.0, -1.0))
            .expect("should hit");
        assert!((hit.distance - 1.0).abs() < 1e-9);
        assert!((hit.normal - Vec3::Z).length() < 1e-9);
    }

    #[test]
    fn misses_outside_triangle() {
        let tri = unit_xy_triangle();
        assert!(tri
            .intersect(Vec3::new(5.0, 5.0, 1.0), Vec3::new(0.0, 0.0, -1.0))
            .is_none());
    }

    #[test]
    fn never_reports_nonpositive_distance() {
        let tri = unit_xy_triangle();
        // Ray starting on the far side, pointing away: intersection math would
        // give negative t.
        let hit = tri.intersect(Vec3::new(0.2, 0.2, -1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(hit.is_none());
    }

    #[test]
    fn grazing_ray_misses_offset_ray_may_hit() {
        let tri = unit_xy_triangle();
        // Direction almost exactly parallel to the triangle's plane.
        let grazing_dir = Vec3::new(1.0, 0.0, 1e-20).try_normalize_checked().unwrap();
        let miss = tri.intersect(Vec3::new(-1.0, 0.2, 0.0), grazing_dir);
        assert!(miss.is_none() || miss.unwrap().distance > 0.0);
    }

    #[test]
    fn surface_sample_mean_converges_to_centroid() {
        let tri = Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::Z,
            Vec3::Z,
            Vec3::Z,
        );
        let centroid = (tri.v0 + tri.v1 + tri.v2) / 3.0;
        let mut rng = StdRng01::seed(42);
        let n = 20_000;
        let mut sum = Vec3::ZERO;
        for _ in 0..n {
            let (p, _) = tri.sample_surface(&mut rng);
            sum += p;
        }
        let mean = sum / n as f64;
        assert!((mean - centroid).length() < 0.05);
    }
}
