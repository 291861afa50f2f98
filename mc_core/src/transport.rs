//! Transport engine (`spec.md` §4.8): the per-packet event loop and the
//! worker pool that runs it across the whole simulation.
//!
//! Worker spawning is grounded in shape (an `Arc`-shared atomic packet
//! counter, thread-per-batch dispatch) on `src/trace.rs`'s `trace` and
//! `src/benchmark.rs`'s `setup_trace` (teacher): both poll an
//! `Arc<AtomicU32>` sample counter from a supervising thread. Here `rayon`
//! (a dependency the teacher declares but never calls, since its actual
//! dispatch goes through `gpgpu`) finally does that job: `run` partitions
//! `n_packets` across `rayon::scope`d workers, each independently advancing
//! its own packets to a terminal state and incrementing a shared
//! `Stats`/progress counter.
//!
//! Event dispatch and the roulette step are grounded on
//! `kernels/src/lib.rs`'s `trace_pixel` bounce loop, whose roulette block
//! (`if bounce > min_bounces { prob = throughput.max(); if rng > prob break;
//! throughput *= 1/prob }`) is the direct ancestor of §4.8.1.b.

use log::warn;

use crate::constants::{RAMAN_PROBABILITY, RAMAN_WAVELENGTH_NM, SIGMA};
use crate::packet::{MediumId, Packet, PacketState};
use crate::random::{deflect_direction, sample_henyey_greenstein, Rng01, StdRng01};
use crate::scene::Scene;
use crate::stats::Stats;
use crate::vecmath::{reflect, Vec3Ext};

enum Event {
    Scatter,
    VoxelCrossing,
    EntityHit { object_index: usize, triangle_index: usize },
    CcdHit { object_index: usize, triangle_index: usize },
    SpectrometerHit { object_index: usize, triangle_index: usize },
}

/// Runs the whole simulation: `n_packets` divided as evenly as possible
/// across `rayon::scope`d workers, one worker per available core.
pub fn run(scene: &Scene, n_packets: u64, global_seed: u64, stats: &Stats) {
    let workers = num_cpus::get().max(1) as u64;
    let base = n_packets / workers;
    let extra = n_packets % workers;

    rayon::scope(|s| {
        for worker_id in 0..workers {
            let count = base + if worker_id < extra { 1 } else { 0 };
            if count == 0 {
                continue;
            }
            s.spawn(move |_| {
                run_worker(scene, count, worker_id as u32, global_seed, stats);
            });
        }
    });
}

/// Runs `n` packets to completion on the calling thread, using a RNG stream
/// seeded deterministically from `global_seed` and `worker_id`.
pub fn run_worker(scene: &Scene, n: u64, worker_id: u32, global_seed: u64, stats: &Stats) {
    let mut rng = StdRng01::for_worker(global_seed, worker_id);
    for _ in 0..n {
        let mut packet = emit_packet(scene, &mut rng);
        run_packet(scene, &mut packet, &mut rng, stats);
        record_terminal_stats(&packet, stats);
        stats.record_packet_done();
    }
}

fn emit_packet(scene: &Scene, rng: &mut impl Rng01) -> Packet {
    let light_index = scene.light_selector.draw(rng);
    let light = &scene.lights[light_index];
    let emitted = light.emit(&scene.light_area_selectors[light_index], rng);
    // `Scene::build` validates every light's spectrum range against the
    // aether's wavelength range, so this can never fail for a scene that
    // passed construction.
    let aether_optical = scene.aether.evaluate(emitted.wavelength).unwrap_or_else(|_| {
        unreachable!("Scene::build guarantees the aether covers every light's spectrum range")
    });
    Packet::new(emitted.position, emitted.direction, emitted.wavelength, aether_optical, false)
}

fn run_packet(scene: &Scene, packet: &mut Packet, rng: &mut impl Rng01, stats: &Stats) {
    if !scene.grid.contains(packet.position) {
        warn!("packet emitted outside voxel grid");
        stats.record_runtime_error(crate::error::RuntimeError::OutsideGridAtEmission);
        packet.kill(PacketState::BadStart);
        return;
    }
    let mut voxel = scene.grid.voxel_of(packet.position);

    loop {
        packet.loop_count += 1;
        if packet.loop_count > scene.loop_limit {
            packet.kill(PacketState::LoopLimit);
            return;
        }

        if packet.weight <= scene.roulette_weight {
            if rng.next_f64() < 1.0 / scene.roulette_chambers {
                packet.weight *= scene.roulette_chambers;
            } else {
                packet.kill(PacketState::Rouletted);
                return;
            }
        }

        let d_scatter = -(rng.next_f64().max(f64::MIN_POSITIVE)).ln() / packet.optical.interaction;
        let d_voxel = scene
            .grid
            .distance_to_wall(voxel, packet.position, packet.direction);
        let leaf = scene.octree.leaf_containing(packet.position);

        let entity_lookup = |oi: usize, ti: usize| &scene.entities[oi].mesh.triangles[ti];
        let ccd_lookup = |oi: usize, ti: usize| &scene.ccds[oi].mesh.triangles[ti];
        let spec_lookup = |oi: usize, ti: usize| &scene.spectrometers[oi].mesh.triangles[ti];

        let entity_hit = leaf.nearest_entity_hit(entity_lookup, packet.position, packet.direction);
        let ccd_hit = leaf.nearest_ccd_hit(ccd_lookup, packet.position, packet.direction);
        let spec_hit =
            leaf.nearest_spectrometer_hit(spec_lookup, packet.position, packet.direction);

        let mut candidates: Vec<(f64, Event)> = Vec::with_capacity(5);
        candidates.push((d_scatter, Event::Scatter));
        if let Some(d) = d_voxel {
            candidates.push((d, Event::VoxelCrossing));
        }
        if let Some((oi, ti, d)) = entity_hit {
            candidates.push((d, Event::EntityHit { object_index: oi, triangle_index: ti }));
        }
        if let Some((oi, ti, d)) = ccd_hit {
            candidates.push((d, Event::CcdHit { object_index: oi, triangle_index: ti }));
        }
        if let Some((oi, ti, d)) = spec_hit {
            candidates.push((d, Event::SpectrometerHit { object_index: oi, triangle_index: ti }));
        }

        let (d_star, event) = candidates
            .into_iter()
            .filter(|(d, _)| *d > 0.0 && d.is_finite())
            .min_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap())
            .expect("d_scatter is always a candidate");

        match event {
            Event::Scatter => {
                dispatch_scatter(scene, packet, d_star, rng, stats);
                if !packet.is_alive() {
                    return;
                }
            }
            Event::VoxelCrossing => {
                dispatch_voxel_crossing(scene, packet, d_star, &mut voxel);
                if !packet.is_alive() {
                    return;
                }
            }
            Event::EntityHit { object_index, triangle_index } => {
                dispatch_entity_hit(scene, packet, d_star, object_index, triangle_index, rng, stats);
                if !packet.is_alive() {
                    return;
                }
            }
            Event::CcdHit { object_index, triangle_index } => {
                dispatch_ccd_hit(scene, packet, d_star, object_index, triangle_index);
                return;
            }
            Event::SpectrometerHit { object_index, triangle_index } => {
                dispatch_spectrometer_hit(scene, packet, d_star, object_index, triangle_index);
                return;
            }
        }
    }
}

fn dispatch_scatter(scene: &Scene, packet: &mut Packet, d_star: f64, rng: &mut impl Rng01, stats: &Stats) {
    packet.position += packet.direction * d_star;
    packet.time_of_flight += d_star * packet.optical.refractive_index;

    let cos_theta = sample_henyey_greenstein(packet.optical.anisotropy, rng);
    packet.direction = deflect_direction(packet.direction, cos_theta, rng);
    stats.record_scatter();

    if !packet.raman_shifted && rng.next_f64() < RAMAN_PROBABILITY {
        packet.raman_shifted = true;
        packet.raman_depth = Some(packet.loop_count);
        packet.wavelength = RAMAN_WAVELENGTH_NM;
        stats.record_raman_scatter();

        match medium_optical(scene, packet.current_medium(), packet.wavelength) {
            Ok(optical) => packet.optical = optical,
            Err(_) => {
                stats.record_runtime_error(crate::error::RuntimeError::MaterialWavelengthOutOfRange);
                packet.kill(PacketState::ZeroWeight);
                return;
            }
        }
    }

    packet.weight *= packet.optical.albedo;
    if packet.weight <= 0.0 {
        packet.kill(PacketState::ZeroWeight);
    }
    packet.record_path_point();
}

fn dispatch_voxel_crossing(
    scene: &Scene,
    packet: &mut Packet,
    d_star: f64,
    voxel: &mut (usize, usize, usize),
) {
    let deposited = d_star * packet.weight;
    scene.grid.add_absorbed_energy(packet.position, deposited);

    packet.position += packet.direction * (d_star + SIGMA);
    packet.time_of_flight += d_star * packet.optical.refractive_index;

    if !scene.grid.contains(packet.position) {
        packet.kill(PacketState::Escaped);
        return;
    }
    *voxel = scene.grid.voxel_of(packet.position);
}

fn dispatch_entity_hit(
    scene: &Scene,
    packet: &mut Packet,
    d_star: f64,
    object_index: usize,
    triangle_index: usize,
    rng: &mut impl Rng01,
    stats: &Stats,
) {
    let tri = &scene.entities[object_index].mesh.triangles[triangle_index];
    let hit = match tri.intersect(packet.position, packet.direction) {
        Some(h) => h,
        None => return,
    };
    let mut n = hit.normal;
    if packet.direction.dot(n) > 0.0 {
        n = -n;
    }

    let current = packet.current_medium();
    let entering = current != Some(object_index);
    let (from_material, to_index): (MediumId, MediumId) = if entering {
        (current, Some(object_index))
    } else {
        let mut stack = packet.medium_stack.clone();
        if stack.pop().is_none() {
            stats.record_runtime_error(crate::error::RuntimeError::EmptyMediumStack);
        }
        (current, *stack.last().unwrap_or(&None))
    };

    let from_optical = medium_optical(scene, from_material, packet.wavelength);
    let to_optical = medium_optical(scene, to_index, packet.wavelength);
    let (from_optical, to_optical) = match (from_optical, to_optical) {
        (Ok(f), Ok(t)) => (f, t),
        _ => {
            // `Scene::build` validates every light's spectrum range against
            // every reachable material's, so this is reachable only via a
            // Raman-shifted wavelength landing outside an entity material's
            // sampled range.
            stats.record_runtime_error(crate::error::RuntimeError::MaterialWavelengthOutOfRange);
            packet.kill(PacketState::ZeroWeight);
            return;
        }
    };

    let cos_i = (-packet.direction.dot(n)).clamp(0.0, 1.0);
    let eta = from_optical.refractive_index / to_optical.refractive_index;
    let reflectance = fresnel_reflectance(cos_i, eta);

    if rng.next_f64() < reflectance {
        packet.position += packet.direction * (d_star - SIGMA);
        packet.direction = reflect(packet.direction, n);
    } else {
        packet.position += packet.direction * (d_star + SIGMA);
        let n_dot_i = n.dot(packet.direction);
        let k = 1.0 - eta * eta * (1.0 - n_dot_i * n_dot_i);
        let refracted = if k < 0.0 {
            reflect(packet.direction, n)
        } else {
            eta * packet.direction - (eta * n_dot_i + k.sqrt()) * n
        };
        packet.direction = match refracted.try_normalize_checked() {
            Ok(d) => d,
            Err(_) => {
                stats.record_runtime_error(crate::error::RuntimeError::NonUnitDirection);
                packet.kill(PacketState::ZeroWeight);
                return;
            }
        };

        if entering {
            packet.push_medium(object_index);
        } else {
            packet.pop_medium();
        }
        packet.optical = to_optical;
    }
    packet.time_of_flight += d_star * from_optical.refractive_index;
    packet.record_path_point();
}

/// Unpolarized Fresnel reflectance (average of `R_s`/`R_p`) at incidence
/// cosine `cos_i` for a ray crossing from a medium of index `n_from` into one
/// of index `n_to`, `eta = n_from / n_to`. Returns `1.0` under total internal
/// reflection (`sin_theta_i >= n_to / n_from`, equivalently `sin_t2 >= 1`).
fn fresnel_reflectance(cos_i: f64, eta: f64) -> f64 {
    let sin_i2 = (1.0 - cos_i * cos_i).max(0.0);
    let sin_t2 = eta * eta * sin_i2;
    if sin_t2 >= 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin_t2).max(0.0).sqrt();
    let r_s = ((eta * cos_i - cos_t) / (eta * cos_i + cos_t)).powi(2);
    let r_p = ((eta * cos_t - cos_i) / (eta * cos_t + cos_i)).powi(2);
    0.5 * (r_s + r_p)
}

fn medium_optical(
    scene: &Scene,
    id: MediumId,
    wavelength: f64,
) -> Result<crate::material::OpticalProperties, crate::error::GeometryError> {
    match id {
        None => scene.aether.evaluate(wavelength),
        Some(idx) => scene.entities[idx].material.evaluate(wavelength),
    }
}

fn dispatch_ccd_hit(
    scene: &Scene,
    packet: &mut Packet,
    d_star: f64,
    object_index: usize,
    triangle_index: usize,
) {
    let tri = &scene.ccds[object_index].mesh.triangles[triangle_index];
    let hit = match tri.intersect(packet.position, packet.direction) {
        Some(h) => h,
        None => return,
    };
    packet.position += packet.direction * d_star;

    let front_face = packet.direction.dot(hit.normal) < 0.0;
    if front_face && packet.raman_shifted {
        scene.ccds[object_index].add_hit(
            packet.position,
            packet.weight,
            packet.wavelength,
            packet.raman_depth.unwrap_or(0),
            packet.loop_count,
        );
    }
    packet.kill(PacketState::AbsorbedCcd);
}

fn dispatch_spectrometer_hit(
    scene: &Scene,
    packet: &mut Packet,
    d_star: f64,
    object_index: usize,
    triangle_index: usize,
) {
    let tri = &scene.spectrometers[object_index].mesh.triangles[triangle_index];
    let hit = match tri.intersect(packet.position, packet.direction) {
        Some(h) => h,
        None => return,
    };
    packet.position += packet.direction * d_star;

    let front_face = packet.direction.dot(hit.normal) < 0.0;
    if front_face {
        scene.spectrometers[object_index].add_hit(packet.weight, packet.wavelength);
    }
    packet.kill(PacketState::AbsorbedSpectrometer);
}

fn record_terminal_stats(packet: &Packet, stats: &Stats) {
    match packet.state {
        PacketState::Escaped => stats.record_escaped(),
        PacketState::LoopLimit => stats.record_loop_limit(),
        PacketState::Rouletted => stats.record_rouletted(),
        PacketState::AbsorbedCcd => stats.record_ccd_hit(packet.raman_shifted),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresnel_matches_closed_form_at_normal_incidence() {
        // spec.md §8 scenario 4: n=1.5 slab in aether n=1.0 at normal incidence.
        let eta = 1.0 / 1.5;
        let r = fresnel_reflectance(1.0, eta);
        let expected = ((1.5 - 1.0) / (1.5 + 1.0)).powi(2);
        assert!((r - expected).abs() < 1e-12);
    }

    #[test]
    fn fresnel_reciprocal_symmetry() {
        // R(theta_i, n_from, n_to) == R(theta_t, n_to, n_from), spec.md §8.
        let cos_i = 0.6_f64;
        let eta = 1.0 / 1.5;
        let r_forward = fresnel_reflectance(cos_i, eta);

        let sin_i2 = 1.0 - cos_i * cos_i;
        let sin_t2 = eta * eta * sin_i2;
        let cos_t = (1.0 - sin_t2).sqrt();
        let r_backward = fresnel_reflectance(cos_t, 1.0 / eta);

        assert!((r_forward - r_backward).abs() < 1e-9);
    }

    #[test]
    fn total_internal_reflection_past_critical_angle() {
        // going from the denser (n=1.5) into the rarer (n=1.0) medium, eta=1.5.
        let eta = 1.5;
        let critical_cos = (1.0 - 1.0 / (eta * eta)).sqrt();
        let r = fresnel_reflectance(critical_cos * 0.5, eta);
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn fresnel_reflectance_is_a_probability() {
        for i in 0..=10 {
            let cos_i = i as f64 / 10.0;
            let r = fresnel_reflectance(cos_i.max(1e-6), 1.0 / 1.33);
            assert!((0.0..=1.0).contains(&r));
        }
    }
}
