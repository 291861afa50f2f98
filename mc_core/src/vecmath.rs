//! Vector/matrix kernel (`spec.md` §4.1).
//!
//! Built on `glam`'s double-precision `DVec3`/`DMat4` (keeping the teacher's
//! `glam` dependency rather than hand-rolling arithmetic), extended with the
//! specific fallible/bespoke operations the spec calls out: a `normalize` that
//! returns a recoverable error on near-zero length instead of `glam`'s infallible
//! one, a checked matrix inverse, and `build_world_transform`, which `glam` has
//! no equivalent for.

use crate::error::GeometryError;
use glam::{DMat4, DQuat, DVec3};

pub type Vec3 = DVec3;
pub type Mat4 = DMat4;

/// Extension trait adding the spec's fallible vector operations to `glam::DVec3`.
pub trait Vec3Ext {
    /// Normalizes `self`, failing recoverably instead of returning NaN/garbage
    /// on a (near-)zero-length vector.
    fn try_normalize_checked(self) -> Result<Vec3, GeometryError>;

    /// True if `self` is unit-length within `tol`.
    fn is_unit(self, tol: f64) -> bool;
}

impl Vec3Ext for Vec3 {
    fn try_normalize_checked(self) -> Result<Vec3, GeometryError> {
        let len = self.length();
        if !len.is_finite() || len <= 1e-12 {
            return Err(GeometryError::ZeroLength(len));
        }
        Ok(self / len)
    }

    fn is_unit(self, tol: f64) -> bool {
        (self.length() - 1.0).abs() <= tol
    }
}

/// Checked matrix inverse; `spec.md` requires geometry errors to be recoverable
/// rather than silently producing a NaN-filled matrix.
pub fn try_inverse(m: Mat4) -> Result<Mat4, GeometryError> {
    if !m.determinant().is_finite() || m.determinant().abs() < 1e-12 {
        return Err(GeometryError::SingularMatrix);
    }
    Ok(m.inverse())
}

/// Inverse-transpose, used to transform normals under non-uniform scale while
/// preserving orthogonality to the (transformed) surface.
pub fn inverse_transpose(m: Mat4) -> Result<Mat4, GeometryError> {
    Ok(try_inverse(m)?.transpose())
}

/// Transforms a normal vector by a precomputed inverse-transpose matrix and
/// renormalizes, per `spec.md` §4.1/§4.3.
pub fn transform_normal(inv_transpose: Mat4, n: Vec3) -> Result<Vec3, GeometryError> {
    inv_transpose.transform_vector3(n).try_normalize_checked()
}

/// Builds a world transform from translation, facing direction, in-plane spin
/// (radians), and per-axis scale, per `spec.md` §4.1:
///
/// > the direction is normalized first, then a rotation that takes the local +z
/// > to that direction is composed with the spin about the local axis and the
/// > non-uniform scale.
pub fn build_world_transform(
    translation: Vec3,
    facing: Vec3,
    spin_radians: f64,
    scale: Vec3,
) -> Result<Mat4, GeometryError> {
    let dir = facing.try_normalize_checked()?;
    let spin = DQuat::from_axis_angle(DVec3::Z, spin_radians);
    let to_dir = DQuat::from_rotation_arc(DVec3::Z, dir);
    let rotation = to_dir * spin;
    Ok(DMat4::from_scale_rotation_translation(scale, rotation, translation))
}

/// Builds an orthonormal basis `(up, right, forward)` around `up`, grounded on
/// `kernels/src/util.rs`'s `create_cartesian` (teacher): cross with a fixed
/// arbitrary vector to get a perpendicular, then cross again to complete the
/// basis. `up` must already be unit-length.
pub fn create_cartesian(up: Vec3) -> (Vec3, Vec3, Vec3) {
    let arbitrary = Vec3::new(0.1, 0.5, 0.9);
    let temp = up.cross(arbitrary).normalize();
    let right = temp.cross(up).normalize();
    let forward = up.cross(right).normalize();
    (up, right, forward)
}

/// Transforms a vector given in the local frame of `basis` (as produced by
/// `create_cartesian`, with `basis.0` playing the role of local +y) into world
/// space.
pub fn local_to_world(local: Vec3, basis: (Vec3, Vec3, Vec3)) -> Vec3 {
    let (up, right, forward) = basis;
    Vec3::new(
        local.x * forward.x + local.y * up.x + local.z * right.x,
        local.x * forward.y + local.y * up.y + local.z * right.y,
        local.x * forward.z + local.y * up.z + local.z * right.z,
    )
}

/// Mirrors `i` about `normal`, grounded on `kernels/src/util.rs`'s `reflect`.
pub fn reflect(i: Vec3, normal: Vec3) -> Vec3 {
    i - normal * 2.0 * i.dot(normal)
}
