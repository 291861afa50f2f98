//! Error taxonomy following `spec.md` §7: configuration/geometry errors abort a
//! run before any packet moves, runtime-invariant and numerical-degeneracy errors
//! are recovered within a single packet and only recorded for the end-of-run
//! report.

use thiserror::Error;

/// Malformed scene description, missing files, spectra outside material range.
/// Fatal before any packet runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("entity '{0}' references unknown material '{1}'")]
    UnknownMaterial(String, String),
    #[error("entity '{0}' references unknown mesh '{1}'")]
    UnknownMesh(String, String),
    #[error("light '{name}' spectrum range [{lo}, {hi}] exceeds material '{mat}' range [{mat_lo}, {mat_hi}]")]
    SpectrumOutOfMaterialRange {
        name: String,
        lo: f64,
        hi: f64,
        mat: String,
        mat_lo: f64,
        mat_hi: f64,
    },
    #[error("wavelength axis must be strictly ascending, found non-ascending entry at index {0}")]
    NonAscendingAxis(usize),
    #[error("table column '{0}' is empty")]
    EmptyColumn(&'static str),
    #[error("no lights defined in scene")]
    NoLights,
    #[error("invalid roulette chambers value {0}, must be > 1")]
    InvalidChambers(f64),
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed table row in '{path}': {detail}")]
    MalformedRow { path: String, detail: String },
}

/// Zero-area triangle, zero-length direction vector, non-triangular face. Fatal
/// at load.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("cannot normalize a vector of length {0}")]
    ZeroLength(f64),
    #[error("degenerate (zero-area) triangle")]
    DegenerateTriangle,
    #[error("face with {0} vertices is not a triangle")]
    NonTriangularFace(usize),
    #[error("vertex index {0} out of bounds (mesh has {1} vertices)")]
    IndexOutOfBounds(u32, usize),
    #[error("wavelength {0} outside material's sampled range [{1}, {2}]")]
    WavelengthOutOfRange(f64, f64, f64),
    #[error("singular matrix: cannot invert")]
    SingularMatrix,
}

/// Direction non-unit after transform, stack empty on exit from a material,
/// packet outside the grid at emission, medium unevaluable at the packet's
/// current wavelength. Logged; the offending packet is terminated but the run
/// continues.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("packet direction not unit-length after transform")]
    NonUnitDirection,
    #[error("medium stack empty on exit from material")]
    EmptyMediumStack,
    #[error("packet outside voxel grid at emission")]
    OutsideGridAtEmission,
    /// Defensive: `Scene::build` validates every light's spectrum range
    /// against every reachable material's range, but the Raman shift
    /// reassigns a packet's wavelength to a fixed constant outside that
    /// validated coverage, so a material miss is still reachable after a
    /// shift.
    #[error("medium's material cannot be evaluated at the packet's current wavelength")]
    MaterialWavelengthOutOfRange,
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
