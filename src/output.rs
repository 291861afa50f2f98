//! Output writers (`spec.md` §6 "Outputs"): voxel grid slice images, per-CCD
//! images with a shared global maximum, per-CCD hit-record dumps, and
//! per-spectrometer histograms.
//!
//! No image-codec dependency is pulled in (consistent with output formatting
//! being explicitly out of the core's scope): images are hand-rolled ASCII
//! PPM (P3), the simplest format that needs nothing but `std::fs`.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use mc_core::scene::Scene;

/// Maps `t` in `[0, 1]` through a five-stop rainbow ramp (blue -> cyan ->
/// green -> yellow -> red).
fn rainbow(t: f64) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    const STOPS: [[f64; 3]; 5] = [
        [0.0, 0.0, 1.0],
        [0.0, 1.0, 1.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [1.0, 0.0, 0.0],
    ];
    let scaled = t * (STOPS.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(STOPS.len() - 2);
    let frac = scaled - i as f64;
    let lerp = |c: usize| STOPS[i][c] + frac * (STOPS[i + 1][c] - STOPS[i][c]);
    [
        (lerp(0) * 255.0).round() as u8,
        (lerp(1) * 255.0).round() as u8,
        (lerp(2) * 255.0).round() as u8,
    ]
}

fn write_ppm(path: &Path, width: usize, height: usize, pixels: &[[u8; 3]]) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "P3")?;
    writeln!(w, "{width} {height}")?;
    writeln!(w, "255")?;
    for px in pixels {
        writeln!(w, "{} {} {}", px[0], px[1], px[2])?;
    }
    Ok(())
}

/// Tone-maps one axis of the voxel grid into a stacked image (slices laid
/// out top-to-bottom) plus one file per slice in a matching subdirectory, per
/// §6's "one stacked image per axis plus per-slice subdirectory".
fn write_axis(
    out_dir: &Path,
    axis_name: &str,
    energy: &[f64],
    max_energy: f64,
    slice_at: impl Fn(usize, usize, usize) -> usize,
    slice_dims: (usize, usize),
    slice_count: usize,
) -> Result<()> {
    let (sw, sh) = slice_dims;
    let slice_dir = out_dir.join(format!("voxel_{axis_name}_slices"));
    fs::create_dir_all(&slice_dir)
        .with_context(|| format!("creating '{}'", slice_dir.display()))?;

    let mut stacked = Vec::with_capacity(sw * sh * slice_count);
    for slice in 0..slice_count {
        let mut pixels = Vec::with_capacity(sw * sh);
        for row in 0..sh {
            for col in 0..sw {
                let idx = slice_at(slice, row, col);
                let value = energy[idx];
                let t = if max_energy > 0.0 {
                    (value / max_energy).clamp(0.0, 1.0).powf(0.25)
                } else {
                    0.0
                };
                pixels.push(rainbow(t));
            }
        }
        write_ppm(
            &slice_dir.join(format!("slice_{slice:04}.ppm")),
            sw,
            sh,
            &pixels,
        )?;
        stacked.extend_from_slice(&pixels);
    }
    write_ppm(
        &out_dir.join(format!("voxel_{axis_name}.ppm")),
        sw,
        sh * slice_count,
        &stacked,
    )?;
    Ok(())
}

/// Writes all three axis-stacked voxel images plus their per-slice
/// subdirectories.
pub fn write_voxel_grid(scene: &Scene, out_dir: &Path) -> Result<()> {
    let energy = scene.grid.snapshot();
    let [nx, ny, nz] = scene.grid.dims();
    let max_energy = energy.iter().cloned().fold(0.0_f64, f64::max);

    let flat = |ix: usize, iy: usize, iz: usize| (iz * ny + iy) * nx + ix;

    write_axis(
        out_dir,
        "x",
        &energy,
        max_energy,
        |slice, row, col| flat(slice, row, col),
        (ny, nz),
        nx,
    )?;
    write_axis(
        out_dir,
        "y",
        &energy,
        max_energy,
        |slice, row, col| flat(col, slice, row),
        (nx, nz),
        ny,
    )?;
    write_axis(
        out_dir,
        "z",
        &energy,
        max_energy,
        |slice, row, col| flat(col, row, slice),
        (nx, ny),
        nz,
    )?;
    Ok(())
}

/// Writes one image per CCD, all tone-mapped against a single global maximum
/// so intensities stay comparable across detectors, plus one auxiliary
/// `(x, y, z, raman_depth, loop_count)` hit-record file per CCD.
pub fn write_ccds(scene: &Scene, out_dir: &Path) -> Result<()> {
    let snapshots: Vec<Vec<[f64; 3]>> = scene.ccds.iter().map(|c| c.snapshot()).collect();
    let global_max = snapshots
        .iter()
        .flat_map(|s| s.iter())
        .flat_map(|px| px.iter().cloned())
        .fold(0.0_f64, f64::max);

    for (i, ccd) in scene.ccds.iter().enumerate() {
        let [w, h] = ccd.pixels;
        let pixels: Vec<[u8; 3]> = snapshots[i]
            .iter()
            .map(|px| {
                if global_max > 0.0 {
                    [
                        ((px[0] / global_max).clamp(0.0, 1.0) * 255.0).round() as u8,
                        ((px[1] / global_max).clamp(0.0, 1.0) * 255.0).round() as u8,
                        ((px[2] / global_max).clamp(0.0, 1.0) * 255.0).round() as u8,
                    ]
                } else {
                    [0, 0, 0]
                }
            })
            .collect();
        write_ppm(&out_dir.join(format!("ccd_{i:02}.ppm")), w as usize, h as usize, &pixels)?;

        let hits = ccd.hit_log_snapshot();
        let log_path = out_dir.join(format!("ccd_{i:02}_hits.txt"));
        let file = fs::File::create(&log_path)
            .with_context(|| format!("creating '{}'", log_path.display()))?;
        let mut w = BufWriter::new(file);
        writeln!(w, "# x y z raman_depth loop_count")?;
        for hit in &hits {
            writeln!(
                w,
                "{} {} {} {} {}",
                hit.position.x,
                hit.position.y,
                hit.position.z,
                hit.raman_depth,
                hit.loop_count
            )?;
        }
    }
    Ok(())
}

/// Writes one plain-text histogram dump per spectrometer.
pub fn write_spectrometers(scene: &Scene, out_dir: &Path) -> Result<()> {
    for (i, spec) in scene.spectrometers.iter().enumerate() {
        let histogram = spec.snapshot();
        let path = out_dir.join(format!("spectrometer_{i:02}.txt"));
        let file = fs::File::create(&path).with_context(|| format!("creating '{}'", path.display()))?;
        let mut w = BufWriter::new(file);
        let (lo, hi) = spec.range;
        let bin_width = (hi - lo) / spec.bins as f64;
        writeln!(w, "# wavelength_lo wavelength_hi weight")?;
        for (bin, weight) in histogram.iter().enumerate() {
            let bin_lo = lo + bin as f64 * bin_width;
            let bin_hi = bin_lo + bin_width;
            writeln!(w, "{bin_lo} {bin_hi} {weight}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rainbow_endpoints_are_blue_and_red() {
        assert_eq!(rainbow(0.0), [0, 0, 255]);
        assert_eq!(rainbow(1.0), [255, 0, 0]);
    }

    #[test]
    fn rainbow_is_monotonic_in_red_channel() {
        let mut prev = 0u8;
        for i in 0..=10 {
            let [r, _, _] = rainbow(i as f64 / 10.0);
            assert!(r >= prev);
            prev = r;
        }
    }
}
