//! Scene assembly (`spec.md` §3 "Scene"): aether material, entities, lights,
//! detectors, voxel grid, octree, and the light-power selector, built once at
//! load time and then read-only for the whole run except through the
//! detectors' and grid's own locks.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ConfigError, GeometryError, SceneError};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::octree::{Bounds, FamilyInput, Octree, TreeLimits, TriRef};
use crate::random::{DiscreteSelector, Rng01};
use crate::spectrum::Spectrum;
use crate::vecmath::Vec3;
use crate::voxel_grid::VoxelGrid;

/// Immutable pair of a world-space mesh and the material it is filled with
/// (`spec.md` §3 "Entity").
pub struct Entity {
    pub mesh: Mesh,
    pub material: Arc<Material>,
}

/// `spec.md` §3 "Light": mesh + spectrum + power, with an `emit` operation.
pub struct Light {
    pub mesh: Mesh,
    pub spectrum: Spectrum,
    pub power: f64,
}

pub struct EmittedPacket {
    pub position: Vec3,
    pub direction: Vec3,
    pub wavelength: f64,
}

impl Light {
    /// Picks a uniform surface point (area-weighted across the light's
    /// triangles) and outward normal, a wavelength from the spectrum, and a
    /// cosine-weighted direction in the outward hemisphere.
    pub fn emit(&self, area_selector: &DiscreteSelector, rng: &mut impl Rng01) -> EmittedPacket {
        let tri_idx = area_selector.draw(rng);
        let tri = &self.mesh.triangles[tri_idx];
        let (point, normal) = tri.sample_surface(rng);
        let wavelength = self.spectrum.sample(rng);
        let direction = crate::random::sample_cosine_hemisphere(normal, rng);
        EmittedPacket {
            position: point,
            direction,
            wavelength,
        }
    }
}

/// One recorded CCD hit: surface position, Raman-generation depth, and loop
/// count, per §4.8.2's auxiliary record.
#[derive(Debug, Clone, Copy)]
pub struct CcdHitRecord {
    pub position: Vec3,
    pub raman_depth: u64,
    pub loop_count: u64,
}

/// Planar basis used to map a world-space hit point on the CCD's quad back to
/// a pixel coordinate: `origin` plus two (non-normalized) edge vectors.
struct QuadBasis {
    origin: Vec3,
    edge_u: Vec3,
    edge_v: Vec3,
}

impl QuadBasis {
    fn uv(&self, point: Vec3) -> (f64, f64) {
        let rel = point - self.origin;
        let u = rel.dot(self.edge_u) / self.edge_u.length_squared();
        let v = rel.dot(self.edge_v) / self.edge_v.length_squared();
        (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
    }
}

/// `spec.md` §3 "CCD": a single-quad mesh, a pixel array of additive
/// tristimulus accumulators, and an optional per-hit record log.
pub struct Ccd {
    pub mesh: Mesh,
    pub pixels: [u32; 2],
    pub color: bool,
    basis: QuadBasis,
    pixel_data: Mutex<Vec<[f64; 3]>>,
    hit_log: Mutex<Vec<CcdHitRecord>>,
}

impl Ccd {
    pub fn new(mesh: Mesh, quad_corners: [Vec3; 4], pixels: [u32; 2], color: bool) -> Self {
        let basis = QuadBasis {
            origin: quad_corners[0],
            edge_u: quad_corners[1] - quad_corners[0],
            edge_v: quad_corners[3] - quad_corners[0],
        };
        let n = pixels[0] as usize * pixels[1] as usize;
        Self {
            mesh,
            pixels,
            color,
            basis,
            pixel_data: Mutex::new(vec![[0.0; 3]; n]),
            hit_log: Mutex::new(Vec::new()),
        }
    }

    /// Registers a hit at `position` with `weight` at `wavelength`, under the
    /// CCD's lock. Wavelength is folded to a tristimulus bucket only when
    /// `color` is set; otherwise all weight goes to channel 0 (luminance).
    pub fn add_hit(
        &self,
        position: Vec3,
        weight: f64,
        wavelength: f64,
        raman_depth: u64,
        loop_count: u64,
    ) {
        let (u, v) = self.basis.uv(position);
        let px = ((u * self.pixels[0] as f64) as usize).min(self.pixels[0] as usize - 1);
        let py = ((v * self.pixels[1] as f64) as usize).min(self.pixels[1] as usize - 1);
        let idx = py * self.pixels[0] as usize + px;

        let mut pixels = self.pixel_data.lock();
        if self.color {
            let channel = wavelength_to_channel(wavelength);
            pixels[idx][channel] += weight;
        } else {
            pixels[idx][0] += weight;
        }
        drop(pixels);

        self.hit_log.lock().push(CcdHitRecord {
            position,
            raman_depth,
            loop_count,
        });
    }

    pub fn snapshot(&self) -> Vec<[f64; 3]> {
        self.pixel_data.lock().clone()
    }

    pub fn hit_log_snapshot(&self) -> Vec<CcdHitRecord> {
        self.hit_log.lock().clone()
    }
}

/// Buckets a wavelength (nm) into a coarse RGB tristimulus channel. This is a
/// visualization convenience, not a colorimetric model: the spec only
/// requires additive tristimulus accumulation, not a specific wavelength/color
/// mapping.
fn wavelength_to_channel(wavelength_nm: f64) -> usize {
    if wavelength_nm < 490.0 {
        2 // blue
    } else if wavelength_nm < 580.0 {
        1 // green
    } else {
        0 // red
    }
}

/// `spec.md` §3 "Spectrometer": mesh + wavelength histogram.
pub struct Spectrometer {
    pub mesh: Mesh,
    pub range: (f64, f64),
    pub bins: usize,
    histogram: Mutex<Vec<f64>>,
}

impl Spectrometer {
    pub fn new(mesh: Mesh, range: (f64, f64), bins: usize) -> Self {
        Self {
            mesh,
            range,
            bins,
            histogram: Mutex::new(vec![0.0; bins]),
        }
    }

    pub fn add_hit(&self, weight: f64, wavelength: f64) {
        let (lo, hi) = self.range;
        if wavelength < lo || wavelength > hi {
            return;
        }
        let t = (wavelength - lo) / (hi - lo).max(f64::EPSILON);
        let bin = ((t * self.bins as f64) as usize).min(self.bins - 1);
        self.histogram.lock()[bin] += weight;
    }

    pub fn snapshot(&self) -> Vec<f64> {
        self.histogram.lock().clone()
    }
}

pub struct Scene {
    pub aether: Material,
    pub entities: Vec<Entity>,
    pub lights: Vec<Light>,
    pub ccds: Vec<Ccd>,
    pub spectrometers: Vec<Spectrometer>,
    pub grid: VoxelGrid,
    pub octree: Octree,
    pub light_selector: DiscreteSelector,
    pub light_area_selectors: Vec<DiscreteSelector>,
    pub loop_limit: u64,
    pub roulette_weight: f64,
    pub roulette_chambers: f64,
}

impl Scene {
    /// Assembles the immutable scene graph and builds the octree over every
    /// family's triangles. `entities`/`lights`/`ccds`/`spectrometers` must
    /// already be in world space (built via `Mesh::from_data`).
    pub fn build(
        aether: Material,
        entities: Vec<Entity>,
        lights: Vec<Light>,
        ccds: Vec<Ccd>,
        spectrometers: Vec<Spectrometer>,
        grid: VoxelGrid,
        tree_limits: TreeLimits,
        loop_limit: u64,
        roulette_weight: f64,
        roulette_chambers: f64,
    ) -> Result<Self, SceneError> {
        if lights.is_empty() {
            return Err(ConfigError::NoLights.into());
        }
        if roulette_chambers <= 1.0 {
            return Err(ConfigError::InvalidChambers(roulette_chambers).into());
        }

        let (aether_lo, aether_hi) = aether.wavelength_range();
        for (i, light) in lights.iter().enumerate() {
            let (lo, hi) = light.spectrum.range();
            if lo < aether_lo || hi > aether_hi {
                return Err(ConfigError::SpectrumOutOfMaterialRange {
                    name: format!("light[{i}]"),
                    lo,
                    hi,
                    mat: aether.name().to_string(),
                    mat_lo: aether_lo,
                    mat_hi: aether_hi,
                }
                .into());
            }
            for entity in &entities {
                let (mat_lo, mat_hi) = entity.material.wavelength_range();
                if lo < mat_lo || hi > mat_hi {
                    return Err(ConfigError::SpectrumOutOfMaterialRange {
                        name: format!("light[{i}]"),
                        lo,
                        hi,
                        mat: entity.material.name().to_string(),
                        mat_lo,
                        mat_hi,
                    }
                    .into());
                }
            }
        }

        let light_powers: Vec<f64> = lights.iter().map(|l| l.power).collect();
        let light_selector =
            DiscreteSelector::new(&light_powers).ok_or(ConfigError::NoLights)?;

        let light_area_selectors: Result<Vec<_>, SceneError> = lights
            .iter()
            .map(|l| {
                let areas: Vec<f64> = l.mesh.triangles.iter().map(|t| t.area).collect();
                DiscreteSelector::new(&areas)
                    .ok_or_else(|| GeometryError::DegenerateTriangle.into())
            })
            .collect();
        let light_area_selectors = light_area_selectors?;

        let mut bounds_min = grid.bounds().0;
        let mut bounds_max = grid.bounds().1;
        for e in &entities {
            bounds_min = bounds_min.min(e.mesh.aabb_min);
            bounds_max = bounds_max.max(e.mesh.aabb_max);
        }

        let entity_refs: Vec<TriRef> = entities
            .iter()
            .enumerate()
            .flat_map(|(oi, e)| (0..e.mesh.triangles.len()).map(move |ti| (oi, ti)))
            .collect();
        let light_refs: Vec<TriRef> = lights
            .iter()
            .enumerate()
            .flat_map(|(oi, l)| (0..l.mesh.triangles.len()).map(move |ti| (oi, ti)))
            .collect();
        let ccd_refs: Vec<TriRef> = ccds
            .iter()
            .enumerate()
            .flat_map(|(oi, c)| (0..c.mesh.triangles.len()).map(move |ti| (oi, ti)))
            .collect();
        let spec_refs: Vec<TriRef> = spectrometers
            .iter()
            .enumerate()
            .flat_map(|(oi, s)| (0..s.mesh.triangles.len()).map(move |ti| (oi, ti)))
            .collect();

        let entity_tris = |oi: usize, ti: usize| -> (Vec3, Vec3, Vec3) {
            let t = &entities[oi].mesh.triangles[ti];
            (t.v0, t.v1, t.v2)
        };
        let light_tris = |oi: usize, ti: usize| -> (Vec3, Vec3, Vec3) {
            let t = &lights[oi].mesh.triangles[ti];
            (t.v0, t.v1, t.v2)
        };
        let ccd_tris = |oi: usize, ti: usize| -> (Vec3, Vec3, Vec3) {
            let t = &ccds[oi].mesh.triangles[ti];
            (t.v0, t.v1, t.v2)
        };
        let spec_tris = |oi: usize, ti: usize| -> (Vec3, Vec3, Vec3) {
            let t = &spectrometers[oi].mesh.triangles[ti];
            (t.v0, t.v1, t.v2)
        };

        let entities_input = FamilyInput {
            refs: entity_refs,
            triangles: Box::new(entity_tris),
        };
        let lights_input = FamilyInput {
            refs: light_refs,
            triangles: Box::new(light_tris),
        };
        let ccds_input = FamilyInput {
            refs: ccd_refs,
            triangles: Box::new(ccd_tris),
        };
        let specs_input = FamilyInput {
            refs: spec_refs,
            triangles: Box::new(spec_tris),
        };

        let octree = Octree::build(
            Bounds::new(bounds_min, bounds_max),
            &entities_input,
            &lights_input,
            &ccds_input,
            &specs_input,
            tree_limits,
        );

        Ok(Self {
            aether,
            entities,
            lights,
            ccds,
            spectrometers,
            grid,
            octree,
            light_selector,
            light_area_selectors,
            loop_limit,
            roulette_weight,
            roulette_chambers,
        })
    }
}
