//! Emission spectrum (`spec.md` §3/§4.5): an immutable piecewise-linear PDF with
//! strictly ascending wavelength axis and strictly positive weights, sampled by
//! CDF inversion.

use crate::error::ConfigError;
use crate::random::Rng01;
use shared_structs::SpectrumTable;

#[derive(Debug, Clone)]
pub struct Spectrum {
    wavelength: Vec<f64>,
    cdf: Vec<f64>,
}

impl Spectrum {
    pub fn from_table(table: &SpectrumTable) -> Result<Self, ConfigError> {
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
        if table.intensity.iter().any(|&p| p <= 0.0) {
            return Err(ConfigError::MalformedRow {
                path: "<spectrum>".to_string(),
                detail: "intensity column must be strictly positive".to_string(),
            });
        }

        // Trapezoid-rule running integral over the piecewise-linear density,
        // normalized so the final entry is exactly 1.0.
        let n = table.wavelength.len();
        let mut cdf = Vec::with_capacity(n);
        cdf.push(0.0);
        for i in 1..n {
            let dw = table.wavelength[i] - table.wavelength[i - 1];
            let avg = 0.5 * (table.intensity[i] + table.intensity[i - 1]);
            cdf.push(cdf[i - 1] + dw * avg);
        }
        let total = *cdf.last().unwrap();
        for c in &mut cdf {
            *c /= total;
        }

        Ok(Self {
            wavelength: table.wavelength.clone(),
            cdf,
        })
    }

    pub fn range(&self) -> (f64, f64) {
        (
            *self.wavelength.first().unwrap(),
            *self.wavelength.last().unwrap(),
        )
    }

    /// Draws a wavelength by inverting the piecewise-linear CDF: locate the
    /// bracketing segment and linearly interpolate within it.
    pub fn sample(&self, rng: &mut impl Rng01) -> f64 {
        let xi = rng.next_f64();
        let idx = match self.cdf.binary_search_by(|c| c.partial_cmp(&xi).unwrap()) {
            Ok(i) => i,
            Err(i) => i,
        };
        if idx == 0 {
            return self.wavelength[0];
        }
        if idx >= self.wavelength.len() {
            return *self.wavelength.last().unwrap();
        }
        let c0 = self.cdf[idx - 1];
        let c1 = self.cdf[idx];
        let t = if c1 > c0 { (xi - c0) / (c1 - c0) } else { 0.0 };
        self.wavelength[idx - 1] + t * (self.wavelength[idx] - self.wavelength[idx - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::StdRng01;

    fn flat_table() -> SpectrumTable {
        SpectrumTable {
            wavelength: vec![500.0, 600.0, 700.0],
            intensity: vec![1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn samples_stay_within_range() {
        let spec = Spectrum::from_table(&flat_table()).unwrap();
        let mut rng = StdRng01::seed(5);
        for _ in 0..1000 {
            let w = spec.sample(&mut rng);
            assert!((500.0..=700.0).contains(&w));
        }
    }

    #[test]
    fn flat_spectrum_mean_is_midpoint() {
        let spec = Spectrum::from_table(&flat_table()).unwrap();
        let mut rng = StdRng01::seed(6);
        let n = 20_000;
        let sum: f64 = (0..n).map(|_| spec.sample(&mut rng)).sum();
        let mean = sum / n as f64;
        assert!((mean - 600.0).abs() < 2.0);
    }

    #[test]
    fn rejects_nonpositive_intensity() {
        let mut table = flat_table();
        table.intensity[1] = 0.0;
        assert!(Spectrum::from_table(&table).is_err());
    }
}
