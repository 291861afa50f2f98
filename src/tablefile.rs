//! Whitespace-delimited column table reader (`spec.md` §6 "Material table" /
//! "Spectrum table"): one header line of column names, then one row per line.
//!
//! The teacher has no precedent for this — its tables are binary glTF/OBJ
//! buffers loaded through `russimp` (`src/asset.rs`) — so this is plain
//! stdlib text parsing, matching §9's framing of mesh/table I/O as outside
//! the core engine's scope and therefore simple by design.

use std::fs;
use std::path::Path;

use mc_core::ConfigError;
use shared_structs::{MaterialTable, SpectrumTable};

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn malformed(path: &Path, detail: impl Into<String>) -> ConfigError {
    ConfigError::MalformedRow {
        path: path.display().to_string(),
        detail: detail.into(),
    }
}

/// Parses the header and value rows into named columns, in header order.
fn read_columns(path: &Path) -> Result<(Vec<String>, Vec<Vec<f64>>), ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| malformed(path, "file has no header row"))?;
    let names: Vec<String> = header.split_whitespace().map(str::to_string).collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for (row_no, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != names.len() {
            return Err(malformed(
                path,
                format!(
                    "row {} has {} fields, expected {}",
                    row_no + 2,
                    fields.len(),
                    names.len()
                ),
            ));
        }
        for (col, field) in fields.iter().enumerate() {
            let value: f64 = field
                .parse()
                .map_err(|_| malformed(path, format!("row {} field '{}' is not a number", row_no + 2, field)))?;
            columns[col].push(value);
        }
    }

    Ok((names, columns))
}

fn column<'a>(
    path: &Path,
    names: &[String],
    columns: &'a [Vec<f64>],
    name: &str,
) -> Result<&'a [f64], ConfigError> {
    names
        .iter()
        .position(|n| n == name)
        .map(|i| columns[i].as_slice())
        .ok_or_else(|| malformed(path, format!("missing column '{name}'")))
}

pub fn load_material_table(path: &Path) -> Result<MaterialTable, ConfigError> {
    let (names, columns) = read_columns(path)?;
    Ok(MaterialTable {
        wavelength: column(path, &names, &columns, "w")?.to_vec(),
        refractive_index: column(path, &names, &columns, "n")?.to_vec(),
        absorption_mfp: column(path, &names, &columns, "a")?.to_vec(),
        scattering_mfp: column(path, &names, &columns, "s")?.to_vec(),
        anisotropy: column(path, &names, &columns, "g")?.to_vec(),
    })
}

pub fn load_spectrum_table(path: &Path) -> Result<SpectrumTable, ConfigError> {
    let (names, columns) = read_columns(path)?;
    Ok(SpectrumTable {
        wavelength: column(path, &names, &columns, "w")?.to_vec(),
        intensity: column(path, &names, &columns, "p")?.to_vec(),
    })
}
