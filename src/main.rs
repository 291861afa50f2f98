//! `photon-mc`: CLI entry point for the Monte Carlo radiative-transfer engine.
//!
//! Scene parsing, mesh/table file I/O, and output formatting live here, kept
//! out of `mc_core` per that crate's own scope note; this binary wires them
//! together around `mc_core::transport::run`.

mod config;
mod meshfile;
mod output;
mod tablefile;

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use mc_core::{transport, Stats};

/// Monte Carlo photon transport through a scene of entities, lights, and
/// detectors.
#[derive(Debug, Parser)]
#[command(name = "photon-mc", version, about)]
struct Cli {
    /// Path to the TOML scene description.
    scene: PathBuf,

    /// Number of packets to simulate.
    #[arg(long, default_value_t = 1_000_000)]
    packets: u64,

    /// Global RNG seed; per-worker streams are derived from it.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Directory outputs are written to; created if missing.
    #[arg(long, default_value = "output")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let base_dir = cli
        .scene
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let description = config::load_description(&cli.scene)?;
    let scene = config::build_scene(&description, &base_dir)
        .with_context(|| format!("building scene from '{}'", cli.scene.display()))?;

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating output directory '{}'", cli.out_dir.display()))?;

    info!(
        "running {} packets across {} worker(s), seed {}",
        cli.packets,
        num_cpus::get(),
        cli.seed
    );

    let stats = Stats::default();
    std::thread::scope(|s| {
        let packets = cli.packets;
        let seed = cli.seed;
        let scene_ref = &scene;
        let stats_ref = &stats;
        let worker = s.spawn(move || transport::run(scene_ref, packets, seed, stats_ref));

        let bar = ProgressBar::new(packets);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} packets ({eta})")
                .unwrap(),
        );
        let period = Duration::from_secs_f64(description.system.log_update_period.max(0.05));
        while !worker.is_finished() {
            bar.set_position(stats.packets_completed.load(Ordering::Relaxed));
            std::thread::sleep(period);
        }
        bar.set_position(stats.packets_completed.load(Ordering::Relaxed));
        bar.finish();
    });

    let snapshot = stats.snapshot();
    info!(
        "completed: {} scatters, {} escaped, {} absorbed by CCD ({} Raman), {} loop-limit kills, {} rouletted out",
        snapshot.scatters,
        snapshot.escaped,
        snapshot.escaped_into_ccd_raman + snapshot.escaped_into_ccd_non_raman,
        snapshot.escaped_into_ccd_raman,
        snapshot.loop_limit_kills,
        snapshot.rouletted,
    );
    if snapshot.non_unit_direction
        + snapshot.empty_medium_stack
        + snapshot.outside_grid_at_emission
        + snapshot.material_wavelength_out_of_range
        > 0
    {
        log::warn!(
            "runtime-invariant violations recorded: {} non-unit direction, {} empty medium stack, {} outside grid at emission, {} material wavelength out of range",
            snapshot.non_unit_direction,
            snapshot.empty_medium_stack,
            snapshot.outside_grid_at_emission,
            snapshot.material_wavelength_out_of_range,
        );
    }

    output::write_voxel_grid(&scene, &cli.out_dir)?;
    output::write_ccds(&scene, &cli.out_dir)?;
    output::write_spectrometers(&scene, &cli.out_dir)?;

    info!("outputs written to '{}'", cli.out_dir.display());
    Ok(())
}
