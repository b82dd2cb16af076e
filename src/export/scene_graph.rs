//! Scene-graph archive export
//!
//! The LOD tree becomes a flat table of range selectors, each holding an
//! optional geode of geometry batches. The table is serialized with rkyv and
//! optionally lz4-compressed behind a small header:
//!
//! ```text
//! "PLSG" | flags: u32 (bit 0 = lz4) | payload
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::lod::LodNode;
use crate::math::Bounds;
use crate::mesh::Mesh;

pub const ARCHIVE_MAGIC: &[u8; 4] = b"PLSG";
pub const ARCHIVE_VERSION: u32 = 1;
const FLAG_LZ4: u32 = 1;
const HEADER_LEN: usize = 8;

/// Vertices addressable by one unmerged batch
pub const MAX_BATCH_VERTICES: usize = u16::MAX as usize + 1;

/// Scene-graph export settings
#[derive(Clone, Debug, PartialEq, SerdeSerialize, SerdeDeserialize)]
#[serde(default)]
pub struct SceneGraphExportConfig {
    /// lz4-compress the serialized archive
    pub enable_compression: bool,
    /// Weld duplicate vertices, drop degenerate triangles and share render states
    pub optimize_geometry: bool,
    /// Keep each geode as a single geometry instead of 16-bit addressable batches
    pub merge_geometry: bool,
    /// 0 disables compression even when it is enabled
    pub compression_level: u32,
    /// Also write one archive per node under `level_{n}/node_{i}.osgb`
    pub hierarchical: bool,
}

impl Default for SceneGraphExportConfig {
    fn default() -> Self {
        Self {
            enable_compression: true,
            optimize_geometry: true,
            merge_geometry: true,
            compression_level: 6,
            hierarchical: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Archive, Deserialize, Serialize)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub colors: Vec<[u8; 4]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    fn from_mesh(mesh: &Mesh) -> Self {
        let vb = mesh.vertices();
        Self {
            positions: vb.positions.iter().map(|p| p.to_array()).collect(),
            normals: vb.normals.iter().map(|n| n.to_array()).collect(),
            tex_coords: vb.tex_coords.iter().map(|t| t.to_array()).collect(),
            colors: vb.colors.clone(),
            indices: mesh.indices().to_vec(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Fixed-function state a geode is drawn with
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Archive, Deserialize, Serialize)]
pub struct RenderState {
    pub lighting: bool,
    pub vertex_colors: bool,
    pub textured: bool,
    pub two_sided: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Archive, Deserialize, Serialize)]
pub struct Geode {
    /// Index into [`SceneArchive::states`]
    pub state: u32,
    pub geometries: Vec<Geometry>,
}

/// Range selector: drawn while the viewer metric lies in `[min_range, max_range)`
#[derive(Clone, Debug, PartialEq, Archive, Deserialize, Serialize)]
pub struct SelectorNode {
    pub id: u32,
    pub level: u32,
    pub min_range: f64,
    pub max_range: f64,
    /// `[min_x, min_y, min_z, max_x, max_y, max_z]`; rectangles use lon, lat and mesh altitude
    pub bounds: [f64; 6],
    pub geode: Option<Geode>,
    /// Ids of the child selectors
    pub children: Vec<u32>,
}

/// Selector table in preorder; `root` indexes `nodes`
#[derive(Clone, Debug, PartialEq, Archive, Deserialize, Serialize)]
pub struct SceneArchive {
    pub version: u32,
    pub root: u32,
    pub states: Vec<RenderState>,
    pub nodes: Vec<SelectorNode>,
}

impl SceneArchive {
    pub fn node(&self, id: u32) -> Option<&SelectorNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn triangle_count(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| n.geode.as_ref())
            .flat_map(|g| &g.geometries)
            .map(Geometry::triangle_count)
            .sum()
    }
}

pub struct SceneGraphExporter {
    config: SceneGraphExportConfig,
}

impl SceneGraphExporter {
    pub fn new(config: SceneGraphExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SceneGraphExportConfig {
        &self.config
    }

    /// Convert the LOD tree into a selector table
    pub fn build_archive(&self, root: &LodNode) -> SceneArchive {
        let mut states: Vec<RenderState> = Vec::new();
        let mut nodes = Vec::new();
        root.traverse(&mut |node| {
            let geode = (!node.mesh.is_empty()).then(|| {
                let mesh = if self.config.optimize_geometry {
                    weld(&node.mesh)
                } else {
                    node.mesh.clone()
                };
                let state = render_state(&mesh);
                let index = match states.iter().position(|s| *s == state) {
                    Some(i) if self.config.optimize_geometry => i,
                    _ => {
                        states.push(state);
                        states.len() - 1
                    }
                };
                Geode {
                    state: index as u32,
                    geometries: batches(&mesh, self.config.merge_geometry),
                }
            });
            nodes.push(self.selector(node, geode));
        });
        SceneArchive {
            version: ARCHIVE_VERSION,
            root: root.id,
            states,
            nodes,
        }
    }

    fn selector(&self, node: &LodNode, geode: Option<Geode>) -> SelectorNode {
        SelectorNode {
            id: node.id,
            level: node.level,
            min_range: node.geometric_error,
            max_range: node.geometric_error * 2.0,
            bounds: selector_bounds(node),
            geode,
            children: node.children.iter().map(|c| c.id).collect(),
        }
    }

    fn compress(&self) -> bool {
        self.config.enable_compression && self.config.compression_level > 0
    }

    /// Serialize an archive with the file header
    pub fn encode(&self, archive: &SceneArchive) -> Result<Vec<u8>> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(archive)
            .map_err(|e| Error::Output(format!("scene graph serialization failed: {e}")))?;

        let (flags, payload) = if self.compress() {
            (FLAG_LZ4, lz4_flex::compress_prepend_size(&bytes))
        } else {
            (0, bytes.to_vec())
        };

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(ARCHIVE_MAGIC);
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Write the whole tree as one archive
    pub fn export(&self, root: &LodNode, path: &Path) -> Result<u64> {
        let archive = self.build_archive(root);
        let data = self.encode(&archive)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &data)?;
        log::info!(
            "Exported scene graph with {} selectors ({} bytes) to {}",
            archive.nodes.len(),
            data.len(),
            path.display()
        );
        Ok(data.len() as u64)
    }

    /// Write one archive per node under `dir/level_{n}/node_{i}.osgb`
    ///
    /// Each file holds a single selector whose children refer to sibling files by id.
    pub fn export_hierarchical(&self, root: &LodNode, dir: &Path) -> Result<Vec<PathBuf>> {
        let archive = self.build_archive(root);
        let mut jobs = Vec::with_capacity(archive.nodes.len());
        for node in &archive.nodes {
            let path = node_path(dir, node.level, node.id);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            jobs.push((path, node));
        }

        jobs.par_iter().try_for_each(|(path, node)| {
            let single = SceneArchive {
                version: ARCHIVE_VERSION,
                root: node.id,
                states: archive.states.clone(),
                nodes: vec![(*node).clone()],
            };
            fs::write(path, self.encode(&single)?)?;
            Ok::<(), Error>(())
        })?;

        log::info!("Exported {} node archives under {}", jobs.len(), dir.display());
        Ok(jobs.into_iter().map(|(p, _)| p).collect())
    }
}

/// Path of a node archive in the hierarchical layout
pub fn node_path(dir: &Path, level: u32, id: u32) -> PathBuf {
    dir.join(format!("level_{level}")).join(format!("node_{id}.osgb"))
}

/// Parse an encoded archive
pub fn decode_archive(data: &[u8]) -> Result<SceneArchive> {
    if data.len() < HEADER_LEN || &data[0..4] != ARCHIVE_MAGIC {
        return Err(Error::Input("not a scene graph archive".into()));
    }
    let flags = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let payload = &data[HEADER_LEN..];

    let mut aligned = rkyv::util::AlignedVec::<16>::new();
    if flags & FLAG_LZ4 != 0 {
        let raw = lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| Error::Input(format!("archive decompression failed: {e}")))?;
        aligned.extend_from_slice(&raw);
    } else {
        aligned.extend_from_slice(payload);
    }

    let archived = rkyv::access::<ArchivedSceneArchive, rkyv::rancor::Error>(&aligned)
        .map_err(|e| Error::Input(format!("corrupt scene graph archive: {e}")))?;
    rkyv::deserialize::<SceneArchive, rkyv::rancor::Error>(archived)
        .map_err(|e| Error::Input(format!("scene graph deserialization failed: {e}")))
}

pub fn read_archive(path: &Path) -> Result<SceneArchive> {
    decode_archive(&fs::read(path)?)
}

fn render_state(mesh: &Mesh) -> RenderState {
    let vb = mesh.vertices();
    RenderState {
        lighting: vb.has_normals(),
        vertex_colors: vb.has_colors(),
        textured: vb.has_tex_coords(),
        two_sided: true,
    }
}

fn selector_bounds(node: &LodNode) -> [f64; 6] {
    match &node.bounds {
        Bounds::Aabb(b) => [
            b.min.x as f64,
            b.min.y as f64,
            b.min.z as f64,
            b.max.x as f64,
            b.max.y as f64,
            b.max.z as f64,
        ],
        Bounds::Geo(r) => {
            let (lo, hi) = node
                .mesh
                .bounds()
                .map(|b| (b.min.z as f64, b.max.z as f64))
                .unwrap_or((0.0, 0.0));
            [r.min_lon, r.min_lat, lo, r.max_lon, r.max_lat, hi]
        }
    }
}

/// Merge bit-identical vertices and drop triangles that collapse
pub fn weld(mesh: &Mesh) -> Mesh {
    let vb = mesh.vertices();
    let key = |v: usize| {
        let mut k = [0u32; 12];
        let p = vb.positions[v];
        k[..3].copy_from_slice(&[p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]);
        if let Some(n) = vb.normals.get(v) {
            k[3..6].copy_from_slice(&[n.x.to_bits(), n.y.to_bits(), n.z.to_bits()]);
        }
        if let Some(t) = vb.tex_coords.get(v) {
            k[6..8].copy_from_slice(&[t.x.to_bits(), t.y.to_bits()]);
        }
        if let Some(c) = vb.colors.get(v) {
            k[8] = u32::from_le_bytes(*c);
        }
        k
    };

    // each vertex maps onto the first vertex with the same key
    let mut canonical: HashMap<[u32; 12], u32> = HashMap::with_capacity(vb.len());
    let mut indices = Vec::with_capacity(mesh.indices().len());
    for t in 0..mesh.triangle_count() {
        let tri = mesh.triangle(t).map(|i| *canonical.entry(key(i as usize)).or_insert(i));
        if tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2] {
            indices.extend_from_slice(&tri);
        }
    }
    mesh.compact(&indices)
}

/// Split `mesh` into geometries addressable with 16-bit indices unless merged
fn batches(mesh: &Mesh, merge: bool) -> Vec<Geometry> {
    if merge || mesh.vertex_count() <= MAX_BATCH_VERTICES {
        return vec![Geometry::from_mesh(mesh)];
    }

    let mut out = Vec::new();
    let mut batch: Vec<u32> = Vec::new();
    let mut stamp = vec![usize::MAX; mesh.vertex_count()];
    let mut batch_id = 0;
    let mut batch_vertices = 0;
    for t in 0..mesh.triangle_count() {
        let tri = mesh.triangle(t);
        let fresh = tri.iter().filter(|&&i| stamp[i as usize] != batch_id).count();
        if batch_vertices + fresh > MAX_BATCH_VERTICES {
            out.push(Geometry::from_mesh(&mesh.compact(&batch)));
            batch.clear();
            batch_id += 1;
            batch_vertices = 0;
        }
        for i in tri {
            if stamp[i as usize] != batch_id {
                stamp[i as usize] = batch_id;
                batch_vertices += 1;
            }
        }
        batch.extend_from_slice(&tri);
    }
    if !batch.is_empty() {
        out.push(Geometry::from_mesh(&mesh.compact(&batch)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::math::{Aabb, GeoRect};

    fn quad(z: f32) -> Mesh {
        Mesh::from_positions(
            vec![
                Vec3::new(0.0, 0.0, z),
                Vec3::new(1.0, 0.0, z),
                Vec3::new(1.0, 1.0, z),
                Vec3::new(0.0, 1.0, z),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
        .unwrap()
    }

    fn tree() -> LodNode {
        let bounds = Bounds::Aabb(Aabb::new(Vec3::ZERO, Vec3::ONE));
        let mut root = LodNode::new(bounds, 0, quad(0.0), 4.0);
        root.children.push(LodNode::new(bounds, 1, quad(0.5), 1.0));
        root.children.push(LodNode::new(bounds, 1, Mesh::default(), 0.0));
        root.assign_ids(0);
        root
    }

    #[test]
    fn test_selector_ranges() {
        let archive = SceneGraphExporter::new(SceneGraphExportConfig::default()).build_archive(&tree());
        assert_eq!(archive.nodes.len(), 3);
        let root = archive.node(0).unwrap();
        assert_eq!(root.min_range, 4.0);
        assert_eq!(root.max_range, 8.0);
        assert_eq!(root.children, vec![1, 2]);
        assert!(archive.node(2).unwrap().geode.is_none());
        // identical states collapse into one entry
        assert_eq!(archive.states.len(), 1);
        assert_eq!(archive.triangle_count(), 4);
    }

    #[test]
    fn test_states_kept_apart_without_optimization() {
        let config = SceneGraphExportConfig {
            optimize_geometry: false,
            ..Default::default()
        };
        let archive = SceneGraphExporter::new(config).build_archive(&tree());
        assert_eq!(archive.states.len(), 2);
        assert_eq!(archive.node(1).unwrap().geode.as_ref().unwrap().state, 1);
    }

    #[test]
    fn test_archive_read_back() {
        let dir = tempfile::tempdir().unwrap();
        for compress in [true, false] {
            let exporter = SceneGraphExporter::new(SceneGraphExportConfig {
                enable_compression: compress,
                ..Default::default()
            });
            let path = dir.path().join(format!("result_{compress}.osgb"));
            exporter.export(&tree(), &path).unwrap();

            let bytes = fs::read(&path).unwrap();
            assert_eq!(&bytes[0..4], b"PLSG");
            assert_eq!(bytes[4] as u32 & FLAG_LZ4 != 0, compress);
            let archive = read_archive(&path).unwrap();
            assert_eq!(archive, exporter.build_archive(&tree()));
        }
    }

    #[test]
    fn test_hierarchical_layout() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = SceneGraphExporter::new(SceneGraphExportConfig::default());
        let paths = exporter.export_hierarchical(&tree(), dir.path()).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(dir.path().join("level_0/node_0.osgb").exists());
        assert!(dir.path().join("level_1/node_2.osgb").exists());

        let child = read_archive(&node_path(dir.path(), 1, 1)).unwrap();
        assert_eq!(child.root, 1);
        assert_eq!(child.nodes.len(), 1);
        assert_eq!(child.nodes[0].bounds[2], 0.0);
    }

    #[test]
    fn test_geo_bounds_use_mesh_altitude() {
        let rect = GeoRect::new(0.0, 0.0, 1.0, 1.0);
        let node = LodNode::new(Bounds::Geo(rect), 0, quad(7.0), 0.0);
        assert_eq!(selector_bounds(&node), [0.0, 0.0, 7.0, 1.0, 1.0, 7.0]);
    }

    #[test]
    fn test_weld_merges_duplicates() {
        let mesh = Mesh::from_positions(
            vec![
                Vec3::ZERO,
                Vec3::X,
                Vec3::Y,
                Vec3::Y,
                Vec3::X,
                Vec3::ONE,
                Vec3::ZERO,
            ],
            vec![0, 1, 2, 3, 4, 5, 0, 6, 1],
        )
        .unwrap();
        let welded = weld(&mesh);
        assert_eq!(welded.vertex_count(), 4);
        // third triangle degenerates once 0 and 6 merge
        assert_eq!(welded.triangle_count(), 2);
        assert!(welded.is_compact());
    }

    #[test]
    fn test_unmerged_batches_respect_16_bit_limit() {
        let n = MAX_BATCH_VERTICES + 9;
        let positions: Vec<Vec3> = (0..n).map(|i| Vec3::new(i as f32, (i % 2) as f32, 0.0)).collect();
        let indices: Vec<u32> = (0..n as u32 - 2).flat_map(|i| [i, i + 1, i + 2]).collect();
        let mesh = Mesh::from_positions(positions, indices).unwrap();

        let split = batches(&mesh, false);
        assert!(split.len() > 1);
        assert!(split.iter().all(|g| g.positions.len() <= MAX_BATCH_VERTICES));
        let total: usize = split.iter().map(Geometry::triangle_count).sum();
        assert_eq!(total, mesh.triangle_count());
        assert_eq!(batches(&mesh, true).len(), 1);
    }
}
