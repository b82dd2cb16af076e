//! Input descriptions and loading of one or more PLY files into a single mesh

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::ply::read_ply;
use crate::core::error::Error;
use crate::core::types::{DVec3, Result, Vec3};
use crate::geo::{local_to_geographic, Crs, CrsTransformer, GeoPoint};
use crate::math::Bounds;
use crate::mesh::{Mesh, MeshStats};

/// How list files and inputs are interpreted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Geographic if any list entry carries coordinates, geometric for bare paths
    #[default]
    Auto,
    #[serde(alias = "geographic")]
    Geo,
    Geometric,
}

impl std::str::FromStr for InputMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(InputMode::Auto),
            "geo" | "geographic" => Ok(InputMode::Geo),
            "geometric" => Ok(InputMode::Geometric),
            other => Err(Error::Config(format!("unknown mode '{other}'"))),
        }
    }
}

/// A PLY file in local metres placed at a geographic origin
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoFileEntry {
    pub path: PathBuf,
    pub origin: GeoPoint,
    #[serde(default)]
    pub crs: Crs,
}

/// A PLY file with an optional translation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OffsetFileEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub offset: Option<[f32; 3]>,
}

/// What to load
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputConfig {
    Single(PathBuf),
    Files(Vec<PathBuf>),
    GeoFiles(Vec<GeoFileEntry>),
    OffsetFiles(Vec<OffsetFileEntry>),
}

impl Default for InputConfig {
    fn default() -> Self {
        InputConfig::Files(Vec::new())
    }
}

impl InputConfig {
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            InputConfig::Single(p) => vec![p.as_path()],
            InputConfig::Files(ps) => ps.iter().map(PathBuf::as_path).collect(),
            InputConfig::GeoFiles(es) => es.iter().map(|e| e.path.as_path()).collect(),
            InputConfig::OffsetFiles(es) => es.iter().map(|e| e.path.as_path()).collect(),
        }
    }

    pub fn file_count(&self) -> usize {
        self.paths().len()
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, InputConfig::GeoFiles(_))
    }

    /// Interpret `input`: a `.ply` file is loaded directly, anything else is a list file
    pub fn detect(input: &Path, mode: InputMode) -> Result<InputConfig> {
        if !input.is_file() {
            return Err(Error::Input(format!("input {} does not exist", input.display())));
        }
        let is_ply = input
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ply"));
        if is_ply {
            return Ok(InputConfig::Single(input.to_path_buf()));
        }
        let text = fs::read_to_string(input)?;
        let base = input.parent().unwrap_or(Path::new("."));
        parse_list(&text, base, mode)
    }
}

/// Parse an input list
///
/// Geographic lines are `path lon lat [alt] [crs]`, geometric lines
/// `path [x y z]`. In auto mode any line with coordinates makes the whole
/// list geographic; a list of bare paths is geometric. Blank lines and `#`
/// comments are ignored; relative paths resolve against `base`.
pub fn parse_list(text: &str, base: &Path, mode: InputMode) -> Result<InputConfig> {
    let lines: Vec<(usize, Vec<&str>)> = text
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.split('#').next().unwrap_or("").split_whitespace().collect::<Vec<_>>()))
        .filter(|(_, words)| !words.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(Error::Input("input list has no entries".into()));
    }

    let geographic = match mode {
        InputMode::Geo => true,
        InputMode::Geometric => false,
        InputMode::Auto => lines.iter().any(|(_, words)| words.len() > 1),
    };
    let resolve = |p: &str| {
        let path = Path::new(p);
        if path.is_absolute() { path.to_path_buf() } else { base.join(path) }
    };
    let number = |n: usize, word: &str| -> Result<f64> {
        word.parse()
            .map_err(|_| Error::Input(format!("line {n}: '{word}' is not a number")))
    };

    if geographic {
        let entries = lines
            .iter()
            .map(|(n, words)| {
                if !(3..=5).contains(&words.len()) {
                    return Err(Error::Input(format!("line {n}: expected 'path lon lat [alt] [crs]'")));
                }
                let alt = words.get(3).map_or(Ok(0.0), |w| number(*n, w))?;
                let crs = match words.get(4) {
                    Some(code) => code.parse()?,
                    None => Crs::WGS84,
                };
                Ok(GeoFileEntry {
                    path: resolve(words[0]),
                    origin: GeoPoint::new(number(*n, words[1])?, number(*n, words[2])?, alt),
                    crs,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(InputConfig::GeoFiles(entries))
    } else {
        let entries = lines
            .iter()
            .map(|(n, words)| {
                let offset = match words.len() {
                    1 => None,
                    4 => Some([
                        number(*n, words[1])? as f32,
                        number(*n, words[2])? as f32,
                        number(*n, words[3])? as f32,
                    ]),
                    _ => return Err(Error::Input(format!("line {n}: expected 'path [x y z]'"))),
                };
                Ok(OffsetFileEntry { path: resolve(words[0]), offset })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(InputConfig::OffsetFiles(entries))
    }
}

/// Per-file load summary
#[derive(Clone, Debug, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub stats: MeshStats,
}

/// Merged input ready for LOD construction
#[derive(Clone, Debug)]
pub struct LoadedInput {
    pub mesh: Mesh,
    pub bounds: Bounds,
    pub files: Vec<FileSummary>,
}

impl LoadedInput {
    pub fn is_geographic(&self) -> bool {
        self.bounds.is_geographic()
    }
}

/// Read, place and merge every file of `config`
///
/// Geographic entries are re-origined into (lon, lat, alt) in `target`
/// unless `force_geometric` is set, in which case they load untouched.
pub fn load_input(config: &InputConfig, target: Crs, force_geometric: bool) -> Result<LoadedInput> {
    let jobs: Vec<(&Path, Placement)> = match config {
        InputConfig::Single(p) => vec![(p.as_path(), Placement::None)],
        InputConfig::Files(ps) => ps.iter().map(|p| (p.as_path(), Placement::None)).collect(),
        InputConfig::OffsetFiles(es) => es
            .iter()
            .map(|e| (e.path.as_path(), e.offset.map_or(Placement::None, Placement::Offset)))
            .collect(),
        InputConfig::GeoFiles(es) if force_geometric => {
            es.iter().map(|e| (e.path.as_path(), Placement::None)).collect()
        }
        InputConfig::GeoFiles(es) => es
            .iter()
            .map(|e| {
                let origin = CrsTransformer::new(e.crs, target)
                    .transform_point(&e.origin)
                    .ok_or_else(|| {
                        Error::Config(format!("no transformation from {} to {target}", e.crs))
                    })?;
                Ok((e.path.as_path(), Placement::Geographic(origin)))
            })
            .collect::<Result<Vec<_>>>()?,
    };
    if jobs.is_empty() {
        return Err(Error::Input("no input files".into()));
    }
    let geographic = jobs.iter().any(|(_, p)| matches!(p, Placement::Geographic(_)));

    let loaded: Vec<(Mesh, FileSummary)> = jobs
        .par_iter()
        .map(|(path, placement)| {
            let mesh = read_ply(path).map_err(|e| Error::Input(format!("{}: {e}", path.display())))?;
            let mesh = placement.apply(mesh);
            let stats = MeshStats::compute(&mesh);
            log::info!(
                "Loaded {}: {} vertices, {} triangles, area {:.2}",
                path.display(),
                stats.vertex_count,
                stats.triangle_count,
                stats.surface_area
            );
            Ok((mesh, FileSummary { path: path.to_path_buf(), stats }))
        })
        .collect::<Result<Vec<_>>>()?;

    let (meshes, files): (Vec<Mesh>, Vec<FileSummary>) = loaded.into_iter().unzip();
    let mesh = if meshes.len() == 1 {
        meshes.into_iter().next().unwrap_or_default()
    } else {
        Mesh::concat(&meshes)
    };
    let bounds = Bounds::from_positions(mesh.positions(), geographic)
        .ok_or_else(|| Error::Input("merged input has no vertices".into()))?;

    log::info!(
        "Merged {} file(s): {} vertices, {} triangles",
        files.len(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(LoadedInput { mesh, bounds, files })
}

#[derive(Clone, Copy, Debug)]
enum Placement {
    None,
    Offset([f32; 3]),
    Geographic(GeoPoint),
}

impl Placement {
    fn apply(self, mesh: Mesh) -> Mesh {
        match self {
            Placement::None => mesh,
            Placement::Offset(o) => mesh.translated(Vec3::from_array(o)),
            // f32 degrees resolve to roughly a metre at full longitude range
            Placement::Geographic(origin) => mesh.with_positions(|p| {
                let g = local_to_geographic(&origin, DVec3::new(p.x as f64, p.y as f64, p.z as f64));
                Vec3::new(g.lon as f32, g.lat as f32, g.alt as f32)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::io::ply::{write_ply, Encoding};

    fn triangle(offset: f32) -> Mesh {
        Mesh::from_positions(
            vec![
                Vec3::new(offset, 0.0, 0.0),
                Vec3::new(offset + 1.0, 0.0, 0.0),
                Vec3::new(offset, 1.0, 0.0),
            ],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    #[test]
    fn test_parse_geometric_list() {
        let text = "# tiles\n\na.ply\nsub/b.ply 1 2 3 # shifted\n";
        let cfg = parse_list(text, Path::new("/data"), InputMode::Geometric).unwrap();
        assert_eq!(
            cfg,
            InputConfig::OffsetFiles(vec![
                OffsetFileEntry { path: PathBuf::from("/data/a.ply"), offset: None },
                OffsetFileEntry { path: PathBuf::from("/data/sub/b.ply"), offset: Some([1.0, 2.0, 3.0]) },
            ])
        );
    }

    #[test]
    fn test_parse_geographic_list() {
        let text = "a.ply 116.3 39.9 50 EPSG:4326\n/abs/b.ply 116.4 39.8\n";
        let cfg = parse_list(text, Path::new("/data"), InputMode::Auto).unwrap();
        let InputConfig::GeoFiles(entries) = cfg else { panic!("expected geographic list") };
        assert_eq!(entries[0].path, PathBuf::from("/data/a.ply"));
        assert_eq!(entries[0].origin, GeoPoint::new(116.3, 39.9, 50.0));
        assert_eq!(entries[1].path, PathBuf::from("/abs/b.ply"));
        assert_eq!(entries[1].origin.alt, 0.0);
        assert_eq!(entries[1].crs, Crs::WGS84);
    }

    #[test]
    fn test_auto_reads_coordinates_without_crs_as_geographic() {
        let text = "a.ply 116.39 39.91 50.0\nb.ply 116.40 39.92 45.0\n";
        let cfg = parse_list(text, Path::new("/data"), InputMode::Auto).unwrap();
        let InputConfig::GeoFiles(entries) = cfg else { panic!("expected geographic list") };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].origin, GeoPoint::new(116.39, 39.91, 50.0));
        assert_eq!(entries[0].crs, Crs::WGS84);
        assert_eq!(entries[1].origin, GeoPoint::new(116.40, 39.92, 45.0));

        let bare = parse_list("a.ply\nb.ply\n", Path::new("/data"), InputMode::Auto).unwrap();
        assert!(!bare.is_geographic());
    }

    #[test]
    fn test_mode_forces_interpretation() {
        let text = "a.ply 116.3 39.9 10\n";
        assert!(parse_list(text, Path::new("."), InputMode::Geo).unwrap().is_geographic());
        assert!(parse_list(text, Path::new("."), InputMode::Auto).unwrap().is_geographic());
        assert!(!parse_list(text, Path::new("."), InputMode::Geometric).unwrap().is_geographic());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_list("# nothing\n", Path::new("."), InputMode::Auto).is_err());
        assert!(parse_list("a.ply 1 2\n", Path::new("."), InputMode::Geometric).is_err());
        assert!(parse_list("a.ply x 2 3\n", Path::new("."), InputMode::Geometric).is_err());
        let err = parse_list("a.ply 1 2 3 WGS84\n", Path::new("."), InputMode::Auto).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_detect_and_load_offsets() {
        let dir = tempfile::tempdir().unwrap();
        write_ply(&dir.path().join("a.ply"), &triangle(0.0), Encoding::Ascii).unwrap();
        write_ply(&dir.path().join("b.ply"), &triangle(0.0), Encoding::BinaryLittleEndian).unwrap();
        let list = dir.path().join("inputs.txt");
        fs::write(&list, "a.ply\nb.ply 10 0 0\n").unwrap();

        let single = InputConfig::detect(&dir.path().join("a.ply"), InputMode::Auto).unwrap();
        assert_eq!(single, InputConfig::Single(dir.path().join("a.ply")));

        let cfg = InputConfig::detect(&list, InputMode::Geometric).unwrap();
        assert_eq!(cfg.file_count(), 2);
        let loaded = load_input(&cfg, Crs::WGS84, false).unwrap();
        assert_eq!(loaded.mesh.triangle_count(), 2);
        assert_eq!(loaded.mesh.indices(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(loaded.files.len(), 2);
        let Bounds::Aabb(b) = loaded.bounds else { panic!("expected box bounds") };
        assert_eq!(b.max.x, 11.0);

        let missing = InputConfig::detect(&dir.path().join("none.ply"), InputMode::Auto).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_load_geographic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.ply");
        write_ply(&path, &triangle(0.0), Encoding::Ascii).unwrap();
        let cfg = InputConfig::GeoFiles(vec![GeoFileEntry {
            path: path.clone(),
            origin: GeoPoint::new(116.0, 40.0, 5.0),
            crs: Crs::WGS84,
        }]);

        let loaded = load_input(&cfg, Crs::WGS84, false).unwrap();
        assert!(loaded.is_geographic());
        let p = loaded.mesh.positions()[1];
        assert!((p.x - 116.0).abs() < 1e-4 && p.x > 116.0);
        assert!((p.y - 40.0).abs() < 1e-6);
        assert_eq!(p.z, 5.0);

        let other = "EPSG:3857".parse().unwrap();
        let err = load_input(&cfg, other, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let flat = load_input(&cfg, other, true).unwrap();
        assert!(!flat.is_geographic());
    }
}
