//! Scene assembly (`spec.md` §6 "Scene description"): reads the TOML
//! description into `shared_structs::SceneDescription`, resolves every
//! referenced mesh/material/spectrum file relative to the scene file's
//! directory, and builds a `mc_core::Scene`.
//!
//! CCDs carry no mesh reference in the description (§6 only gives them
//! `pixel`/`col`/placement); a CCD's sensor is a synthesized unit quad in its
//! local frame before `Placement` is applied, matching how every other
//! placed object in this file gets its geometry from a mesh plus a world
//! transform.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use shared_structs::{Placement, SceneDescription};

use mc_core::material::Material;
use mc_core::mesh::Mesh;
use mc_core::octree::TreeLimits;
use mc_core::scene::{Ccd, Entity, Light, Scene, Spectrometer};
use mc_core::spectrum::Spectrum;
use mc_core::vecmath::{build_world_transform, Mat4, Vec3};
use mc_core::voxel_grid::VoxelGrid;

use crate::{meshfile, tablefile};

pub fn load_description(path: &Path) -> Result<SceneDescription> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading scene description '{}'", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing scene description '{}'", path.display()))
}

fn world_transform(placement: &Placement) -> Result<Mat4> {
    Ok(build_world_transform(
        Vec3::from_array(placement.trans),
        Vec3::from_array(placement.dir),
        placement.rot.to_radians(),
        Vec3::from_array(placement.scale),
    )?)
}

/// Local-space corners of a CCD's unit sensor quad, centered at the origin in
/// the XY plane with +z as its facing normal, matching `create_cartesian`'s
/// convention of "local +z is the placed-object's facing direction" used
/// throughout mesh placement.
const CCD_LOCAL_CORNERS: [Vec3; 4] = [
    Vec3::new(-0.5, -0.5, 0.0),
    Vec3::new(0.5, -0.5, 0.0),
    Vec3::new(0.5, 0.5, 0.0),
    Vec3::new(-0.5, 0.5, 0.0),
];

struct MaterialCache {
    base_dir: PathBuf,
    loaded: HashMap<String, Arc<Material>>,
}

impl MaterialCache {
    fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            loaded: HashMap::new(),
        }
    }

    fn get(&mut self, rel_path: &str) -> Result<Arc<Material>> {
        if let Some(m) = self.loaded.get(rel_path) {
            return Ok(m.clone());
        }
        let full = self.base_dir.join(rel_path);
        let table = tablefile::load_material_table(&full)
            .with_context(|| format!("loading material table '{}'", full.display()))?;
        let material = Arc::new(Material::from_table(rel_path, &table)?);
        self.loaded.insert(rel_path.to_string(), material.clone());
        Ok(material)
    }
}

fn load_mesh(base_dir: &Path, rel_path: &str, world: Mat4) -> Result<Mesh> {
    let full = base_dir.join(rel_path);
    let data = meshfile::load_mesh(&full)
        .with_context(|| format!("loading mesh '{}'", full.display()))?;
    Ok(Mesh::from_data(&data, world)?)
}

/// Builds the full `mc_core::Scene` from a parsed description, with every
/// relative path resolved against `base_dir` (the scene file's own
/// directory).
pub fn build_scene(desc: &SceneDescription, base_dir: &Path) -> Result<Scene> {
    let sim = &desc.simulation;
    let mut materials = MaterialCache::new(base_dir.to_path_buf());

    let aether_table = tablefile::load_material_table(&base_dir.join(&sim.aether.mat))
        .with_context(|| format!("loading aether material '{}'", sim.aether.mat))?;
    let aether = Material::from_table("aether", &aether_table)?;

    let mut entities = Vec::with_capacity(sim.entities.len());
    for (name, cfg) in &sim.entities {
        let world = world_transform(&cfg.placement)
            .with_context(|| format!("entity '{name}' placement"))?;
        let mesh = load_mesh(base_dir, &cfg.mesh, world)
            .with_context(|| format!("entity '{name}' mesh"))?;
        let material = materials
            .get(&cfg.mat)
            .with_context(|| format!("entity '{name}' material"))?;
        entities.push(Entity { mesh, material });
    }

    let mut lights = Vec::with_capacity(sim.lights.len());
    for (name, cfg) in &sim.lights {
        let world = world_transform(&cfg.placement)
            .with_context(|| format!("light '{name}' placement"))?;
        let mesh = load_mesh(base_dir, &cfg.mesh, world)
            .with_context(|| format!("light '{name}' mesh"))?;
        let spec_table = tablefile::load_spectrum_table(&base_dir.join(&cfg.spec))
            .with_context(|| format!("light '{name}' spectrum"))?;
        let spectrum = Spectrum::from_table(&spec_table)?;
        lights.push(Light {
            mesh,
            spectrum,
            power: cfg.power,
        });
    }

    let mut ccds = Vec::with_capacity(sim.ccds.len());
    for (name, cfg) in &sim.ccds {
        let world = world_transform(&cfg.placement)
            .with_context(|| format!("ccd '{name}' placement"))?;
        let quad_data = shared_structs::MeshData {
            positions: CCD_LOCAL_CORNERS.map(|c| c.to_array()).to_vec(),
            normals: vec![[0.0, 0.0, 1.0]],
            faces: vec![[(0, 0), (1, 0), (2, 0)], [(0, 0), (2, 0), (3, 0)]],
        };
        let mesh = Mesh::from_data(&quad_data, world)
            .with_context(|| format!("ccd '{name}' sensor quad"))?;
        let quad_corners = CCD_LOCAL_CORNERS.map(|c| world.transform_point3(c));
        ccds.push(Ccd::new(mesh, quad_corners, cfg.pixel, cfg.col));
    }

    let mut spectrometers = Vec::with_capacity(sim.spectrometers.len());
    for (name, cfg) in &sim.spectrometers {
        let world = world_transform(&cfg.placement)
            .with_context(|| format!("spectrometer '{name}' placement"))?;
        let mesh = load_mesh(base_dir, &cfg.mesh, world)
            .with_context(|| format!("spectrometer '{name}' mesh"))?;
        spectrometers.push(Spectrometer::new(mesh, (cfg.range[0], cfg.range[1]), cfg.bins));
    }

    let grid = VoxelGrid::new(
        Vec3::from_array(sim.grid.min),
        Vec3::from_array(sim.grid.max),
        sim.grid.cells,
    );
    let tree_limits = TreeLimits {
        min_depth: sim.tree.min_depth,
        max_depth: sim.tree.max_depth,
        max_tri: sim.tree.max_tri,
    };

    let scene = Scene::build(
        aether,
        entities,
        lights,
        ccds,
        spectrometers,
        grid,
        tree_limits,
        desc.optimisation.loop_limit,
        desc.optimisation.roulette.weight,
        desc.optimisation.roulette.chambers,
    )?;
    Ok(scene)
}
