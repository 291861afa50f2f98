//! Plain data shared between the `photon-mc` binary and the `mc_core` engine.
//!
//! Everything here is a "description object" in the sense of `spec.md` §1: scene
//! parsing, mesh parsing, and tabular data I/O are explicitly out of the engine's
//! core scope, so the binary crate is responsible for turning files on disk into
//! these types, and `mc_core` only ever consumes them.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Top level TOML scene description, matching `spec.md` §6 section names.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneDescription {
    pub optimisation: OptimisationConfig,
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimisationConfig {
    pub loop_limit: u64,
    pub roulette: RouletteConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouletteConfig {
    pub weight: f64,
    pub chambers: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub aether: AetherConfig,
    #[serde(default)]
    pub entities: BTreeMap<String, EntityConfig>,
    #[serde(default)]
    pub lights: BTreeMap<String, LightConfig>,
    #[serde(default)]
    pub ccds: BTreeMap<String, CcdConfig>,
    #[serde(default)]
    pub spectrometers: BTreeMap<String, SpectrometerConfig>,
    pub grid: GridConfig,
    pub tree: TreeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AetherConfig {
    pub mat: String,
}

/// Shared placement fields for every mesh-bound scene object.
#[derive(Debug, Clone, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub trans: [f64; 3],
    pub dir: [f64; 3],
    #[serde(default)]
    pub rot: f64,
    #[serde(default = "Placement::default_scale")]
    pub scale: [f64; 3],
}

impl Placement {
    fn default_scale() -> [f64; 3] {
        [1.0, 1.0, 1.0]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    pub mesh: String,
    pub mat: String,
    #[serde(flatten)]
    pub placement: Placement,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LightConfig {
    pub mesh: String,
    pub spec: String,
    pub power: f64,
    #[serde(flatten)]
    pub placement: Placement,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CcdConfig {
    pub pixel: [u32; 2],
    #[serde(default)]
    pub col: bool,
    #[serde(flatten)]
    pub placement: Placement,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpectrometerConfig {
    pub mesh: String,
    pub range: [f64; 2],
    pub bins: usize,
    #[serde(flatten)]
    pub placement: Placement,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    pub min: [f64; 3],
    pub max: [f64; 3],
    pub cells: [usize; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeConfig {
    pub min_depth: u32,
    pub max_depth: u32,
    pub max_tri: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "SystemConfig::default_log_period")]
    pub log_update_period: f64,
}

impl SystemConfig {
    fn default_log_period() -> f64 {
        5.0
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_update_period: Self::default_log_period(),
        }
    }
}

/// A parsed mesh file: per-vertex positions/normals and triangular faces.
///
/// `faces` holds `(position_index, normal_index)` pairs per vertex of each
/// triangle, already validated to be triangular at parse time.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<[f64; 3]>,
    pub normals: Vec<[f64; 3]>,
    pub faces: Vec<[(u32, u32); 3]>,
}

/// A parsed material table: five parallel columns keyed by wavelength.
#[derive(Debug, Clone, Default)]
pub struct MaterialTable {
    pub wavelength: Vec<f64>,
    pub refractive_index: Vec<f64>,
    pub absorption_mfp: Vec<f64>,
    pub scattering_mfp: Vec<f64>,
    pub anisotropy: Vec<f64>,
}

/// A parsed spectrum table: wavelength/intensity columns.
#[derive(Debug, Clone, Default)]
pub struct SpectrumTable {
    pub wavelength: Vec<f64>,
    pub intensity: Vec<f64>,
}
