//! End-to-end scenario tests (`spec.md` §8), built directly on `mc_core`'s
//! public API rather than through the binary crate's file parsers, mirroring
//! the teacher's own `tests/correctness_tests.rs`: "set up a scene, run N
//! samples, assert within tolerance."

use std::sync::Arc;

use mc_core::material::Material;
use mc_core::mesh::Mesh;
use mc_core::octree::{
    triangle_box_overlap, Bounds, FamilyInput, Octree, OctreeNode, TreeLimits, TriRef,
};
use mc_core::scene::{Entity, Light, Scene};
use mc_core::spectrum::Spectrum;
use mc_core::vecmath::{Mat4, Vec3};
use mc_core::voxel_grid::VoxelGrid;
use mc_core::{transport, Stats};
use shared_structs::{MaterialTable, MeshData, SpectrumTable};

fn flat_quad(z: f64, half_extent: f64) -> MeshData {
    MeshData {
        positions: vec![
            [-half_extent, -half_extent, z],
            [half_extent, -half_extent, z],
            [half_extent, half_extent, z],
            [-half_extent, half_extent, z],
        ],
        normals: vec![[0.0, 0.0, 1.0]],
        faces: vec![[(0, 0), (1, 0), (2, 0)], [(0, 0), (2, 0), (3, 0)]],
    }
}

fn flat_material(wavelength_range: (f64, f64), n: f64, mu_a: f64, mu_s: f64, g: f64) -> Material {
    let table = MaterialTable {
        wavelength: vec![wavelength_range.0, wavelength_range.1],
        refractive_index: vec![n, n],
        absorption_mfp: vec![1.0 / mu_a, 1.0 / mu_a],
        scattering_mfp: vec![1.0 / mu_s, 1.0 / mu_s],
        anisotropy: vec![g, g],
    };
    Material::from_table("test", &table).unwrap()
}

fn flat_spectrum(wavelength_range: (f64, f64)) -> Spectrum {
    let table = SpectrumTable {
        wavelength: vec![wavelength_range.0, wavelength_range.1],
        intensity: vec![1.0, 1.0],
    };
    Spectrum::from_table(&table).unwrap()
}

/// Slab occupying `z in [0, depth]`, front and back faces as two independent
/// quads on the same entity so the medium stack pushes on entry and pops on
/// exit without needing a fully closed box mesh.
fn slab_mesh(depth: f64, half_extent: f64) -> MeshData {
    let front = flat_quad(0.0, half_extent);
    let back = flat_quad(depth, half_extent);
    let mut positions = front.positions;
    positions.extend(back.positions);
    let mut faces = front.faces;
    for face in back.faces {
        faces.push([
            (face[0].0 + 4, face[0].1),
            (face[1].0 + 4, face[1].1),
            (face[2].0 + 4, face[2].1),
        ]);
    }
    MeshData {
        positions,
        normals: front.normals,
        faces,
    }
}

/// A tiny emitting quad near the origin, facing +z.
fn light_mesh(half_extent: f64, z: f64) -> MeshData {
    flat_quad(z, half_extent)
}

#[test]
fn pencil_beam_absorbs_more_near_the_entry_surface() {
    // spec.md §8 scenario 1: collimated beam into an absorbing slab, Beer-Lambert
    // decay with depth. The light here is cosine-weighted rather than perfectly
    // collimated (spec.md §9's "open question: light emission hemisphere"), so
    // only the qualitative monotonic trend is asserted, not the exact exponential.
    let aether = flat_material((400.0, 900.0), 1.0, 1e-9, 1e-9, 0.0);
    let slab_material = Arc::new(flat_material((400.0, 900.0), 1.0, 1.0, 1e-6, 0.0));

    let depth = 1.0;
    let half_extent = 50.0;
    let slab = Entity {
        mesh: Mesh::from_data(&slab_mesh(depth, half_extent), Mat4::IDENTITY).unwrap(),
        material: slab_material,
    };

    let light = Light {
        mesh: Mesh::from_data(&light_mesh(0.01, -0.01), Mat4::IDENTITY).unwrap(),
        spectrum: flat_spectrum((400.0, 900.0)),
        power: 1.0,
    };

    let cells_z = 50;
    let grid = VoxelGrid::new(
        Vec3::new(-half_extent, -half_extent, 0.0),
        Vec3::new(half_extent, half_extent, depth),
        [1, 1, cells_z],
    );

    let scene = Scene::build(
        aether,
        vec![slab],
        vec![light],
        vec![],
        vec![],
        grid,
        TreeLimits {
            min_depth: 1,
            max_depth: 4,
            max_tri: 4,
        },
        10_000,
        1e-4,
        10.0,
    )
    .unwrap();

    let stats = Stats::default();
    transport::run(&scene, 20_000, 42, &stats);

    let energy = scene.grid.snapshot();
    let near_surface: f64 = energy[0..10].iter().sum();
    let far_side: f64 = energy[(cells_z - 10)..cells_z].iter().sum();
    assert!(
        near_surface > far_side,
        "expected more absorbed energy near the entry surface ({near_surface}) than far from it ({far_side})"
    );
}

#[test]
fn packet_terminal_states_are_mutually_exclusive_and_cover_every_packet() {
    // A basic conservation invariant: every packet run ends in exactly one
    // terminal state, and the terminal counters partition the whole batch
    // (modulo ZeroWeight/BadStart, which are not separately tallied in `Stats`
    // since they are the rare numerical-degeneracy branch of spec.md §7).
    let aether = flat_material((400.0, 900.0), 1.0, 1e-9, 1e-9, 0.0);
    let sphere_material = Arc::new(flat_material((400.0, 900.0), 1.0, 1e-9, 10.0, 0.0));

    // Coarse icosahedron-free stand-in: an octahedron is enough geometry to
    // exercise entry/exit and octree construction without a full sphere mesh.
    let positions = vec![
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ];
    let normals = positions.clone();
    let faces = vec![
        [(0, 0), (2, 2), (4, 4)],
        [(2, 2), (1, 1), (4, 4)],
        [(1, 1), (3, 3), (4, 4)],
        [(3, 3), (0, 0), (4, 4)],
        [(2, 2), (0, 0), (5, 5)],
        [(1, 1), (2, 2), (5, 5)],
        [(3, 3), (1, 1), (5, 5)],
        [(0, 0), (3, 3), (5, 5)],
    ];
    let sphere_data = MeshData {
        positions,
        normals,
        faces,
    };
    let sphere = Entity {
        mesh: Mesh::from_data(&sphere_data, Mat4::IDENTITY).unwrap(),
        material: sphere_material,
    };

    let light = Light {
        mesh: Mesh::from_data(&light_mesh(0.01, 0.0), Mat4::IDENTITY).unwrap(),
        spectrum: flat_spectrum((400.0, 900.0)),
        power: 1.0,
    };

    let grid = VoxelGrid::new(
        Vec3::new(-2.0, -2.0, -2.0),
        Vec3::new(2.0, 2.0, 2.0),
        [4, 4, 4],
    );

    let scene = Scene::build(
        aether,
        vec![sphere],
        vec![light],
        vec![],
        vec![],
        grid,
        TreeLimits {
            min_depth: 1,
            max_depth: 4,
            max_tri: 4,
        },
        1_000,
        1e-4,
        10.0,
    )
    .unwrap();

    let stats = Stats::default();
    let n = 5_000;
    transport::run(&scene, n, 7, &stats);
    let snap = stats.snapshot();

    assert_eq!(snap.packets_completed, n);
    assert!(snap.escaped + snap.loop_limit_kills + snap.rouletted <= n);
}

fn collect_leaves<'a>(node: &'a OctreeNode, out: &mut Vec<&'a mc_core::octree::LeafData>) {
    match node {
        OctreeNode::Leaf(leaf) => out.push(leaf),
        OctreeNode::Internal(children) => {
            for child in children.iter() {
                collect_leaves(child, out);
            }
        }
    }
}

#[test]
fn octree_containment_holds_for_three_overlapping_meshes() {
    // spec.md §8 scenario 6.
    let tri_a = (
        Vec3::new(-0.5, -0.5, -0.5),
        Vec3::new(0.5, -0.5, -0.5),
        Vec3::new(-0.5, 0.5, -0.5),
    );
    let tri_b = (
        Vec3::new(-0.3, -0.3, 0.0),
        Vec3::new(0.7, -0.3, 0.0),
        Vec3::new(-0.3, 0.7, 0.0),
    );
    let tri_c = (
        Vec3::new(0.0, 0.0, 0.5),
        Vec3::new(0.9, 0.0, 0.5),
        Vec3::new(0.0, 0.9, 0.9),
    );
    let meshes = [tri_a, tri_b, tri_c];

    let refs: Vec<TriRef> = (0..meshes.len()).map(|i| (i, 0)).collect();
    let entities = FamilyInput {
        refs: refs.clone(),
        triangles: Box::new(move |oi: usize, _ti: usize| meshes[oi]),
    };
    let empty = |refs: Vec<TriRef>| FamilyInput {
        refs,
        triangles: Box::new(|_, _| (Vec3::ZERO, Vec3::ZERO, Vec3::ZERO)),
    };

    let bounds = Bounds::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
    let tree = Octree::build(
        bounds,
        &entities,
        &empty(vec![]),
        &empty(vec![]),
        &empty(vec![]),
        TreeLimits {
            min_depth: 2,
            max_depth: 5,
            max_tri: 8,
        },
    );

    let mut leaves = Vec::new();
    collect_leaves(&tree.root, &mut leaves);
    assert!(!leaves.is_empty());

    // (a) every triangle referenced by a leaf overlaps that leaf's box.
    for leaf in &leaves {
        let leaf_bounds = Bounds::new(leaf.bounds_min, leaf.bounds_max);
        for &(oi, ti) in &leaf.entities {
            let (v0, v1, v2) = meshes[oi];
            let _ = ti;
            assert!(triangle_box_overlap(leaf_bounds, v0, v1, v2));
        }
    }

    // (b) every triangle of every mesh appears in at least one leaf whose
    // box overlaps it.
    for (oi, &(v0, v1, v2)) in meshes.iter().enumerate() {
        let covered = leaves.iter().any(|leaf| {
            leaf.entities.contains(&(oi, 0))
                && triangle_box_overlap(Bounds::new(leaf.bounds_min, leaf.bounds_max), v0, v1, v2)
        });
        assert!(covered, "triangle {oi} not covered by any overlapping leaf");
    }
}
