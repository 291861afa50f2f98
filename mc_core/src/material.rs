//! Material optical properties (`spec.md` §4.4): four wavelength-indexed
//! piecewise-linear interpolators derived from a parsed material table.
//!
//! The interpolation shape (binary search the ascending axis, lerp between
//! neighbors) follows the same piecewise-linear approach as `spectrum.rs`'s CDF
//! walk; both are instances of the single "strictly ascending axis, linear
//! interpolation in range" idiom the spec names in §3.

use crate::error::{ConfigError, GeometryError};
use shared_structs::MaterialTable;

/// Optical properties of a medium at a single wavelength, cached on a packet
/// while it resides inside that medium (`spec.md` §3 "Packet").
#[derive(Debug, Clone, Copy)]
pub struct OpticalProperties {
    pub refractive_index: f64,
    pub albedo: f64,
    pub interaction: f64,
    pub anisotropy: f64,
}

/// Four sampled tables over a common strictly-ascending wavelength axis.
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    wavelength: Vec<f64>,
    refractive_index: Vec<f64>,
    interaction: Vec<f64>,
    albedo: Vec<f64>,
    anisotropy: Vec<f64>,
}

impl Material {
    /// Validates the axis is strictly ascending and derives `interaction =
    /// 1/a + 1/s`, `albedo = (1/s)/interaction` at load time exactly as §6
    /// specifies, rather than recomputing per-query.
    pub fn from_table(name: &str, table: &MaterialTable) -> Result<Self, ConfigError> {
        if table.wavelength.is_empty() {
            return Err(ConfigError::EmptyColumn("w"));
        }
        for w in table.wavelength.windows(2) {
            if w[1] <= w[0] {
                return Err(ConfigError::NonAscendingAxis(
                    table.wavelength.iter().position(|x| *x == w[1]).unwrap_or(0),
                ));
            }
        }

        let n = table.wavelength.len();
        let mut interaction = Vec::with_capacity(n);
        let mut albedo = Vec::with_capacity(n);
        for i in 0..n {
            let a = table.absorption_mfp[i];
            let s = table.scattering_mfp[i];
            let mu_t = 1.0 / a + 1.0 / s;
            interaction.push(mu_t);
            albedo.push((1.0 / s) / mu_t);
        }

        Ok(Self {
            name: name.to_string(),
            wavelength: table.wavelength.clone(),
            refractive_index: table.refractive_index.clone(),
            interaction,
            albedo,
            anisotropy: table.anisotropy.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wavelength_range(&self) -> (f64, f64) {
        (
            *self.wavelength.first().unwrap(),
            *self.wavelength.last().unwrap(),
        )
    }

    /// Evaluates all four interpolators at `wavelength`, failing recoverably
    /// when the wavelength falls outside the sampled range.
    pub fn evaluate(&self, wavelength: f64) -> Result<OpticalProperties, GeometryError> {
        let (lo, hi) = self.wavelength_range();
        if wavelength < lo || wavelength > hi {
            return Err(GeometryError::WavelengthOutOfRange(wavelength, lo, hi));
        }
        let idx = match self
            .wavelength
            .binary_search_by(|w| w.partial_cmp(&wavelength).unwrap())
        {
            Ok(i) => i,
            Err(i) => i,
        };

        if idx == 0 {
            return Ok(OpticalProperties {
                refractive_index: self.refractive_index[0],
                albedo: self.albedo[0],
                interaction: self.interaction[0],
                anisotropy: self.anisotropy[0],
            });
        }
        if idx >= self.wavelength.len() {
            let last = self.wavelength.len() - 1;
            return Ok(OpticalProperties {
                refractive_index: self.refractive_index[last],
                albedo: self.albedo[last],
                interaction: self.interaction[last],
                anisotropy: self.anisotropy[last],
            });
        }

        let w0 = self.wavelength[idx - 1];
        let w1 = self.wavelength[idx];
        let t = (wavelength - w0) / (w1 - w0);
        let lerp = |col: &[f64]| col[idx - 1] + t * (col[idx] - col[idx - 1]);

        Ok(OpticalProperties {
            refractive_index: lerp(&self.refractive_index),
            albedo: lerp(&self.albedo),
            interaction: lerp(&self.interaction),
            anisotropy: lerp(&self.anisotropy),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> MaterialTable {
        MaterialTable {
            wavelength: vec![500.0, 600.0, 700.0],
            refractive_index: vec![1.3, 1.33, 1.36],
            absorption_mfp: vec![100.0, 100.0, 100.0],
            scattering_mfp: vec![1.0, 1.0, 1.0],
            anisotropy: vec![0.8, 0.85, 0.9],
        }
    }

    #[test]
    fn derives_interaction_and_albedo_at_load() {
        let mat = Material::from_table("tissue", &sample_table()).unwrap();
        let props = mat.evaluate(500.0).unwrap();
        let expected_mu_t = 1.0 / 100.0 + 1.0 / 1.0;
        assert!((props.interaction - expected_mu_t).abs() < 1e-9);
        let expected_albedo = (1.0 / 1.0) / expected_mu_t;
        assert!((props.albedo - expected_albedo).abs() < 1e-9);
    }

    #[test]
    fn interpolates_between_samples() {
        let mat = Material::from_table("tissue", &sample_table()).unwrap();
        let props = mat.evaluate(550.0).unwrap();
        assert!((props.refractive_index - 1.315).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_wavelength_is_recoverable_error() {
        let mat = Material::from_table("tissue", &sample_table()).unwrap();
        assert!(matches!(
            mat.evaluate(10.0),
            Err(GeometryError::WavelengthOutOfRange(..))
        ));
    }

    #[test]
    fn non_ascending_axis_rejected_at_construction() {
        let mut table = sample_table();
        table.wavelength = vec![500.0, 400.0, 700.0];
        assert!(matches!(
            Material::from_table("tissue", &table),
            Err(ConfigError::NonAscendingAxis(_))
        ));
    }
}
