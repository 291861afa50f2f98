//! Mesh text format (`spec.md` §6 "Mesh format"): `v`/`vn`/`f` records, faces
//! 1-based and slash-separated with the middle (UV) token ignored.
//!
//! No corpus precedent uses this grammar (the teacher loads `.glb`/`.obj`
//! through `russimp` in `src/asset.rs`), so this is a small hand-rolled
//! parser over the exact grammar §6 fixes, matching §9's framing that mesh
//! I/O is outside the core engine's scope.

use std::fs;
use std::path::Path;

use mc_core::ConfigError;
use shared_structs::MeshData;

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn malformed(path: &Path, line_no: usize, detail: impl Into<String>) -> ConfigError {
    ConfigError::MalformedRow {
        path: path.display().to_string(),
        detail: format!("line {}: {}", line_no + 1, detail.into()),
    }
}

fn parse_xyz(path: &Path, line_no: usize, tokens: &[&str]) -> Result<[f64; 3], ConfigError> {
    if tokens.len() != 3 {
        return Err(malformed(path, line_no, "expected 3 components"));
    }
    let mut out = [0.0; 3];
    for (i, t) in tokens.iter().enumerate() {
        out[i] = t
            .parse()
            .map_err(|_| malformed(path, line_no, format!("'{t}' is not a number")))?;
    }
    Ok(out)
}

/// Parses `a/*/na` (1-based, slash-separated, middle token ignored) into a
/// zero-based `(position_index, normal_index)` pair.
fn parse_face_vertex(path: &Path, line_no: usize, token: &str) -> Result<(u32, u32), ConfigError> {
    let mut parts = token.split('/');
    let pos: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed(path, line_no, format!("bad face vertex '{token}'")))?;
    let _uv = parts.next();
    let norm: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed(path, line_no, format!("bad face vertex '{token}'")))?;
    if pos == 0 || norm == 0 {
        return Err(malformed(path, line_no, "indices are 1-based, 0 is invalid"));
    }
    Ok((pos - 1, norm - 1))
}

pub fn load_mesh(path: &Path) -> Result<MeshData, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut faces = Vec::new();

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let rest: Vec<&str> = tokens.collect();
                positions.push(parse_xyz(path, line_no, &rest)?);
            }
            Some("vn") => {
                let rest: Vec<&str> = tokens.collect();
                normals.push(parse_xyz(path, line_no, &rest)?);
            }
            Some("f") => {
                let rest: Vec<&str> = tokens.collect();
                if rest.len() != 3 {
                    return Err(malformed(
                        path,
                        line_no,
                        format!("face has {} vertices, not 3", rest.len()),
                    ));
                }
                let mut face = [(0u32, 0u32); 3];
                for (i, token) in rest.iter().enumerate() {
                    face[i] = parse_face_vertex(path, line_no, token)?;
                }
                faces.push(face);
            }
            _ => {}
        }
    }

    Ok(MeshData {
        positions,
        normals,
        faces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn write_temp(contents: &str) -> std::path::PathBuf {
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = std::env::temp_dir();
        path.push(format!("photon_mc_mesh_test_{}_{id}.obj", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parses_triangle_with_uv_token_ignored() {
        let path = write_temp(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1/5/1 2/6/1 3/7/1\n",
        );
        let data = load_mesh(&path).unwrap();
        assert_eq!(data.positions.len(), 3);
        assert_eq!(data.faces, vec![[(0, 0), (1, 0), (2, 0)]]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn non_triangular_face_is_fatal() {
        let path = write_temp("v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nvn 0 0 1\nf 1/1/1 2/1/1 3/1/1 4/1/1\n");
        let err = load_mesh(&path);
        assert!(err.is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let path = write_temp("# a comment\n\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1/1/1 2/1/1 3/1/1\n");
        let data = load_mesh(&path).unwrap();
        assert_eq!(data.positions.len(), 3);
        let _ = fs::remove_file(&path);
    }
}
