//! Fixed numerical constants (`spec.md` §6: "Numerical constants").

/// Smoothing length used to nudge a packet past voxel and interface boundaries,
/// in world units.
pub const SIGMA: f64 = 1e-12;

/// Geometric tolerance for triangle/ray rejection; see `triangle::EPS`, which is
/// the same value re-exported at the point of use.
pub const EPS: f64 = f64::EPSILON;

/// Probability of a Raman shift on any given scatter event.
pub const RAMAN_PROBABILITY: f64 = 0.01;

/// Fixed wavelength (nm) a packet is reassigned to on its one permitted Raman
/// shift.
pub const RAMAN_WAVELENGTH_NM: f64 = 700.0;
