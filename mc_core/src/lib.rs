//! Monte Carlo radiative-transfer engine core.
//!
//! Scene parsing, mesh/table file I/O, and output formatting are explicitly
//! out of scope here (owned by the `photon-mc` binary crate); this crate is
//! the transport loop together with the supporting acceleration structure,
//! event-distance arbitration, detector accumulation, and scene-wide
//! mutation discipline under concurrent workers.

pub mod constants;
pub mod error;
pub mod material;
pub mod mesh;
pub mod octree;
pub mod packet;
pub mod random;
pub mod scene;
pub mod spectrum;
pub mod stats;
pub mod transport;
pub mod triangle;
pub mod vecmath;
pub mod voxel_grid;

pub use error::{ConfigError, GeometryError, RuntimeError, SceneError};
pub use scene::Scene;
pub use stats::{Stats, StatsSnapshot};
