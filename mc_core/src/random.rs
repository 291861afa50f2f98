//! Random primitives (`spec.md` §4.6 / §4.5): uniform `[0,1)` draws, worker seed
//! mixing, gaussian, Henyey–Greenstein angle sampling, and the discrete-index
//! selector.
//!
//! `seed_mix` is grounded directly on `kernels/src/rng.rs`'s `pcg_hash` (teacher),
//! carried over unchanged as an integer hash and repurposed from a GPU per-pixel
//! seed into a per-worker `rand::rngs::StdRng` seed.

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::PI;

use crate::constants::EPS;
use crate::vecmath::{create_cartesian, local_to_world, Vec3};

/// A source of uniform `[0,1)` draws. Implemented for the worker-local RNG; kept
/// as a trait so tests can substitute a fixed sequence.
pub trait Rng01 {
    fn next_f64(&mut self) -> f64;
}

/// Per-worker RNG stream, one per simulation thread.
pub struct StdRng01 {
    inner: rand::rngs::StdRng,
}

impl StdRng01 {
    pub fn seed(seed: u64) -> Self {
        Self {
            inner: rand::rngs::StdRng::seed_from_u64(seed),
        }
    }

    /// Derives a worker's seed from a global run seed and its worker id by
    /// mixing the two through the PCG hash, then seeds a stream from it.
    pub fn for_worker(global_seed: u64, worker_id: u32) -> Self {
        Self::seed(seed_mix(global_seed, worker_id))
    }

    pub fn gaussian(&mut self) -> f64 {
        StandardNormal.sample(&mut self.inner)
    }
}

impl Rng01 for StdRng01 {
    fn next_f64(&mut self) -> f64 {
        self.inner.gen_range(0.0..1.0)
    }
}

/// Mixes a global run seed with a worker id into a single `u64` seed, so each
/// worker draws from an independent, deterministic stream. The hash itself is
/// the PCG variant used in `kernels/src/rng.rs::pcg_hash`, applied twice to the
/// low and high halves of the combined input.
pub fn seed_mix(global_seed: u64, worker_id: u32) -> u64 {
    let lo = pcg_hash(global_seed as u32 ^ worker_id);
    let hi = pcg_hash((global_seed >> 32) as u32 ^ worker_id.wrapping_mul(0x9e37_79b9));
    ((hi as u64) << 32) | lo as u64
}

fn pcg_hash(input: u32) -> u32 {
    let state = input
        .overflowing_mul(747796405u32)
        .0
        .overflowing_add(2891336453u32)
        .0;
    let word = ((state >> ((state >> 28u32) + 4u32)) ^ state)
        .overflowing_mul(277803737u32)
        .0;
    (word >> 22u32) ^ word
}

/// Henyey–Greenstein deflection angle, `spec.md` §4.5: `cos θ = (1 + g² −
/// ((1 − g²)/(1 − g + 2g·ξ))²) / (2g)`; falls back to isotropic (uniform
/// `cos θ` in `[-1, 1]`) when `|g|` is within `ε` of zero.
pub fn sample_henyey_greenstein(g: f64, rng: &mut impl Rng01) -> f64 {
    let xi = rng.next_f64();
    if g.abs() < EPS {
        return 2.0 * xi - 1.0;
    }
    let term = (1.0 - g * g) / (1.0 - g + 2.0 * g * xi);
    ((1.0 + g * g - term * term) / (2.0 * g)).clamp(-1.0, 1.0)
}

/// Cosine-weighted direction in the hemisphere around `normal` (`spec.md` §3's
/// "Light" emission and the Open Question resolving the emission
/// distribution). Grounded on `kernels/src/bsdf.rs`'s `Lambertian::sample`
/// (teacher): `θ = acos(sqrt(ξ1))`, `φ = 2π·ξ2`, mapped into world space via
/// `create_cartesian`/`local_to_world`.
pub fn sample_cosine_hemisphere(normal: Vec3, rng: &mut impl Rng01) -> Vec3 {
    let r1 = rng.next_f64();
    let r2 = rng.next_f64();
    let theta = r1.sqrt().acos();
    let phi = 2.0 * PI * r2;
    let local = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
    local_to_world(local, create_cartesian(normal))
}

/// Deflects `direction` by polar angle `cos_theta` (from Henyey–Greenstein) and
/// a uniform azimuth, composed as "a standard azimuth-preserving rotation
/// about the current direction" (`spec.md` §4.8.2 "Scatter"). Shares the
/// `create_cartesian`/`local_to_world` basis construction with emission
/// sampling above.
pub fn deflect_direction(direction: Vec3, cos_theta: f64, rng: &mut impl Rng01) -> Vec3 {
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * rng.next_f64();
    let local = Vec3::new(sin_theta * phi.cos(), cos_theta, sin_theta * phi.sin());
    local_to_world(local, create_cartesian(direction))
}

/// Discrete-index selector over a non-negative weight vector (`spec.md` §4.5):
/// builds a normalized CDF once at construction, each draw returns the lowest
/// index whose CDF entry is `>= ξ`.
///
/// The normalize-once-then-walk-the-CDF shape is grounded on `src/light_pick.rs`'s
/// `build_light_pick_table`, simplified from its two-outcome alias table (an
/// O(1)-draw optimization not required here) to a direct CDF walk, since the
/// spec fixes the tie-break rule explicitly rather than leaving the selection
/// strategy open.
pub struct DiscreteSelector {
    cdf: Vec<f64>,
}

impl DiscreteSelector {
    /// `weights` must be non-negative with a positive sum; returns `None`
    /// otherwise (callers translate this into the appropriate config error, e.g.
    /// `ConfigError::NoLights`).
    pub fn new(weights: &[f64]) -> Option<Self> {
        let total: f64 = weights.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        let mut cdf = Vec::with_capacity(weights.len());
        let mut running = 0.0;
        for &w in weights {
            running += w.max(0.0) / total;
            cdf.push(running);
        }
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }
        Some(Self { cdf })
    }

    pub fn draw(&self, rng: &mut impl Rng01) -> usize {
        let xi = rng.next_f64();
        match self
            .cdf
            .binary_search_by(|entry| entry.partial_cmp(&xi).unwrap())
        {
            Ok(i) => i,
            Err(i) => i.min(self.cdf.len() - 1),
        }
    }

    pub fn len(&self) -> usize {
        self.cdf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cdf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_mix_differs_across_workers() {
        let a = seed_mix(42, 0);
        let b = seed_mix(42, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn seed_mix_is_deterministic() {
        assert_eq!(seed_mix(7, 3), seed_mix(7, 3));
    }

    #[test]
    fn henyey_greenstein_isotropic_fallback_spans_full_range() {
        let mut rng = StdRng01::seed(1);
        let mut min = 1.0_f64;
        let mut max = -1.0_f64;
        for _ in 0..10_000 {
            let c = sample_henyey_greenstein(0.0, &mut rng);
            min = min.min(c);
            max = max.max(c);
        }
        assert!(min < -0.9 && max > 0.9);
    }

    #[test]
    fn henyey_greenstein_forward_bias_mean() {
        let mut rng = StdRng01::seed(2);
        let n = 100_000;
        let sum: f64 = (0..n).map(|_| sample_henyey_greenstein(0.9, &mut rng)).sum();
        let mean = sum / n as f64;
        assert!((mean - 0.9).abs() < 0.01, "mean cos theta = {mean}");
    }

    #[test]
    fn cosine_hemisphere_mean_direction_matches_normal() {
        let normal = Vec3::new(0.0, 1.0, 0.0);
        let mut rng = StdRng01::seed(3);
        let n = 20_000;
        let mut sum = Vec3::ZERO;
        for _ in 0..n {
            sum += sample_cosine_hemisphere(normal, &mut rng);
        }
        let mean = (sum / n as f64).normalize();
        assert!(mean.dot(normal) > 0.9);
    }

    #[test]
    fn deflect_direction_preserves_unit_length_and_angle() {
        let dir = Vec3::new(1.0, 0.0, 0.0);
        let mut rng = StdRng01::seed(4);
        let cos_theta = 0.5;
        let deflected = deflect_direction(dir, cos_theta, &mut rng);
        assert!((deflected.length() - 1.0).abs() < 1e-9);
        assert!((deflected.dot(dir) - cos_theta).abs() < 1e-9);
    }

    #[test]
    fn discrete_selector_picks_lowest_index_with_cdf_at_least_xi() {
        struct Fixed(f64);
        impl Rng01 for Fixed {
            fn next_f64(&mut self) -> f64 {
                self.0
            }
        }
        let sel = DiscreteSelector::new(&[1.0, 1.0, 2.0]).unwrap();
        // cdf = [0.25, 0.5, 1.0]
        let mut rng = Fixed(0.3);
        assert_eq!(sel.draw(&mut rng), 1);
        let mut rng = Fixed(0.1);
        assert_eq!(sel.draw(&mut rng), 0);
        let mut rng = Fixed(0.9);
        assert_eq!(sel.draw(&mut rng), 2);
    }

    #[test]
    fn discrete_selector_rejects_all_zero_weights() {
        assert!(DiscreteSelector::new(&[0.0, 0.0]).is_none());
    }

    #[test]
    fn discrete_selector_frequencies_match_weights() {
        let sel = DiscreteSelector::new(&[1.0, 3.0]).unwrap();
        let mut rng = StdRng01::seed(9);
        let mut counts = [0u32; 2];
        let n = 50_000;
        for _ in 0..n {
            counts[sel.draw(&mut rng)] += 1;
        }
        let frac0 = counts[0] as f64 / n as f64;
        assert!((frac0 - 0.25).abs() < 0.02);
    }
}
