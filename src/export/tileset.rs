//! 3D Tiles export: `tileset.json` plus one binary tile per non-empty node

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::b3dm::wrap_b3dm;
use super::glb::{mesh_to_glb, GlbOptions};
use crate::core::types::Result;
use crate::lod::{root_extent, LodNode};
use crate::math::Bounds;

/// Binary payload of each tile
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    #[default]
    B3dm,
    Glb,
}

impl TileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::B3dm => "b3dm",
            TileFormat::Glb => "glb",
        }
    }
}

/// 3D Tiles export settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilesExportConfig {
    pub format: TileFormat,
    /// Quantize tile geometry (`KHR_mesh_quantization`)
    pub enable_compression: bool,
    /// 0 disables quantization even when compression is enabled
    pub compression_level: u32,
    /// Generate normals for meshes without them
    pub generate_normals: bool,
    /// `asset.version` of the manifest
    pub asset_version: String,
    pub copyright: Option<String>,
}

impl Default for TilesExportConfig {
    fn default() -> Self {
        Self {
            format: TileFormat::B3dm,
            enable_compression: true,
            compression_level: 7,
            generate_normals: true,
            asset_version: "1.1".to_string(),
            copyright: None,
        }
    }
}

impl TilesExportConfig {
    fn glb_options(&self) -> GlbOptions {
        GlbOptions {
            quantize: self.enable_compression && self.compression_level > 0,
            generate_normals: self.generate_normals,
        }
    }
}

/// What an export run wrote
#[derive(Clone, Debug, Default)]
pub struct TilesetOutput {
    pub tileset_path: PathBuf,
    pub tile_count: usize,
    pub bytes_written: u64,
}

pub struct TilesetExporter {
    config: TilesExportConfig,
}

impl TilesetExporter {
    pub fn new(config: TilesExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TilesExportConfig {
        &self.config
    }

    /// Content URI of `node`, relative to the tileset root
    pub fn tile_uri(&self, node: &LodNode) -> Option<String> {
        (!node.mesh.is_empty())
            .then(|| format!("tiles/level_{}_{}.{}", node.level, node.id, self.config.format.extension()))
    }

    /// Encode the binary payload of one tile
    pub fn encode_tile(&self, node: &LodNode) -> Result<Vec<u8>> {
        let glb = mesh_to_glb(&node.mesh, &self.config.glb_options())?;
        Ok(match self.config.format {
            TileFormat::B3dm => wrap_b3dm(&glb),
            TileFormat::Glb => glb,
        })
    }

    /// Build the manifest for the tree rooted at `root`
    pub fn tileset_json(&self, root: &LodNode) -> Value {
        let mut asset = json!({
            "version": self.config.asset_version,
            "generator": "plylod",
        });
        if let Some(copyright) = &self.config.copyright {
            asset["copyright"] = json!(copyright);
        }
        let geometric_error = if root.geometric_error > 0.0 {
            root.geometric_error
        } else {
            root_extent(&root.bounds)
        };
        json!({
            "asset": asset,
            "geometricError": geometric_error,
            "root": self.tile_json(root).0,
        })
    }

    /// Tile object and the subtree altitude range
    fn tile_json(&self, node: &LodNode) -> (Value, (f64, f64)) {
        let children: Vec<(Value, (f64, f64))> = node.children.iter().map(|c| self.tile_json(c)).collect();

        let heights = match &node.bounds {
            Bounds::Aabb(aabb) => (aabb.min.z as f64, aabb.max.z as f64),
            Bounds::Geo(_) => {
                let own = altitude_range(node);
                // widen by descendants so child regions nest in the parent's
                children.iter().fold(own, |acc, (_, (lo, hi))| match acc {
                    Some((a, b)) => Some((a.min(*lo), b.max(*hi))),
                    None => Some((*lo, *hi)),
                })
                .unwrap_or((0.0, 0.0))
            }
        };

        let mut tile = json!({
            "boundingVolume": { "region": region(&node.bounds, heights) },
            "geometricError": node.geometric_error,
            "refine": "REPLACE",
        });
        if let Some(uri) = self.tile_uri(node) {
            tile["content"] = json!({ "uri": uri });
        }
        if !children.is_empty() {
            tile["children"] = Value::Array(children.into_iter().map(|(t, _)| t).collect());
        }
        (tile, heights)
    }

    /// Write tiles in parallel, then `tileset.json`
    pub fn export(&self, root: &LodNode, out_dir: &Path) -> Result<TilesetOutput> {
        let mut nodes = Vec::new();
        root.traverse(&mut |node| {
            if let Some(uri) = self.tile_uri(node) {
                nodes.push((out_dir.join(uri), node));
            }
        });

        fs::create_dir_all(out_dir.join("tiles"))?;
        let bytes: u64 = nodes
            .par_iter()
            .map(|(path, node)| -> Result<u64> {
                let data = self.encode_tile(node)?;
                fs::write(path, &data)?;
                log::debug!("Wrote {} ({} bytes)", path.display(), data.len());
                Ok(data.len() as u64)
            })
            .collect::<Result<Vec<u64>>>()?
            .into_iter()
            .sum();

        let tileset_path = out_dir.join("tileset.json");
        let manifest = serde_json::to_string_pretty(&self.tileset_json(root))?;
        fs::write(&tileset_path, &manifest)?;

        log::info!(
            "Exported {} tiles ({:.2} MB) to {}",
            nodes.len(),
            bytes as f64 / (1024.0 * 1024.0),
            out_dir.display()
        );
        Ok(TilesetOutput {
            tileset_path,
            tile_count: nodes.len(),
            bytes_written: bytes + manifest.len() as u64,
        })
    }
}

/// Altitude range of the node's own mesh
fn altitude_range(node: &LodNode) -> Option<(f64, f64)> {
    node.mesh
        .bounds()
        .map(|b| (b.min.z as f64, b.max.z as f64))
}

/// `[west, south, east, north, min_height, max_height]`, angles in radians
///
/// Box bounds read x as longitude and y as latitude in degrees.
pub fn region(bounds: &Bounds, heights: (f64, f64)) -> [f64; 6] {
    let (west, south, east, north) = match bounds {
        Bounds::Geo(r) => (r.min_lon, r.min_lat, r.max_lon, r.max_lat),
        Bounds::Aabb(b) => (b.min.x as f64, b.min.y as f64, b.max.x as f64, b.max.y as f64),
    };
    [
        west.to_radians(),
        south.to_radians(),
        east.to_radians(),
        north.to_radians(),
        heights.0,
        heights.1,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::export::b3dm::parse_b3dm;
    use crate::export::glb::parse_glb;
    use crate::geo::extent_meters;
    use crate::math::GeoRect;
    use crate::mesh::Mesh;

    fn patch(rect: &GeoRect, z: f32) -> Mesh {
        let (x0, y0, x1, y1) = (rect.min_lon as f32, rect.min_lat as f32, rect.max_lon as f32, rect.max_lat as f32);
        Mesh::from_positions(
            vec![
                Vec3::new(x0, y0, z),
                Vec3::new(x1, y0, z),
                Vec3::new(x1, y1, z + 5.0),
                Vec3::new(x0, y1, z),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
        .unwrap()
    }

    fn geo_tree() -> LodNode {
        let rect = GeoRect::new(100.0, 30.0, 120.0, 50.0);
        let mut root = LodNode::new(Bounds::Geo(rect), 0, patch(&rect, 0.0), 500.0);
        for (i, quad) in rect.subdivide().iter().enumerate() {
            let mesh = if i == 3 { Mesh::default() } else { patch(quad, 10.0) };
            root.children.push(LodNode::new(Bounds::Geo(*quad), 1, mesh, 100.0));
        }
        root.assign_ids(0);
        root
    }

    fn contains(outer: &Value, inner: &Value) -> bool {
        let o: Vec<f64> = outer.as_array().unwrap().iter().map(|v| v.as_f64().unwrap()).collect();
        let i: Vec<f64> = inner.as_array().unwrap().iter().map(|v| v.as_f64().unwrap()).collect();
        i[0] >= o[0] && i[1] >= o[1] && i[2] <= o[2] && i[3] <= o[3] && i[4] >= o[4] && i[5] <= o[5]
    }

    #[test]
    fn test_tileset_structure() {
        let root = geo_tree();
        let exporter = TilesetExporter::new(TilesExportConfig::default());
        let json = exporter.tileset_json(&root);

        assert_eq!(json["asset"]["version"], "1.1");
        assert_eq!(json["asset"]["generator"], "plylod");
        assert!(json["asset"].get("copyright").is_none());
        assert_eq!(json["geometricError"], 500.0);

        let tile = &json["root"];
        assert_eq!(tile["refine"], "REPLACE");
        assert_eq!(tile["content"]["uri"], "tiles/level_0_0.b3dm");
        let region = tile["boundingVolume"]["region"].as_array().unwrap();
        assert!((region[0].as_f64().unwrap() - 100f64.to_radians()).abs() < 1e-12);
        assert!((region[3].as_f64().unwrap() - 50f64.to_radians()).abs() < 1e-12);

        let children = tile["children"].as_array().unwrap();
        assert_eq!(children.len(), 4);
        assert_eq!(children[0]["content"]["uri"], "tiles/level_1_1.b3dm");
        // empty mesh: no content
        assert!(children[3].get("content").is_none());
        for child in children {
            assert!(child["geometricError"].as_f64().unwrap() <= 500.0);
            assert!(contains(&tile["boundingVolume"]["region"], &child["boundingVolume"]["region"]));
        }
    }

    #[test]
    fn test_zero_root_error_falls_back_to_extent() {
        let rect = GeoRect::new(0.0, 0.0, 2.0, 1.0);
        let root = LodNode::new(Bounds::Geo(rect), 0, patch(&rect, 0.0), 0.0);
        let json = TilesetExporter::new(TilesExportConfig::default()).tileset_json(&root);
        let (w, h) = extent_meters(&rect);
        assert_eq!(json["geometricError"].as_f64().unwrap(), w.max(h));
        assert!(json["root"].get("children").is_none());
    }

    #[test]
    fn test_export_writes_tiles_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let root = geo_tree();
        let exporter = TilesetExporter::new(TilesExportConfig {
            copyright: Some("ACME".into()),
            ..Default::default()
        });
        let out = exporter.export(&root, dir.path()).unwrap();

        assert_eq!(out.tile_count, 4);
        let manifest: Value = serde_json::from_str(&fs::read_to_string(&out.tileset_path).unwrap()).unwrap();
        assert_eq!(manifest["asset"]["copyright"], "ACME");

        let tile = fs::read(dir.path().join("tiles/level_1_2.b3dm")).unwrap();
        let (header, glb) = parse_b3dm(&tile).unwrap();
        assert_eq!(header.byte_length as usize, tile.len());
        let (gltf, _) = parse_glb(glb).unwrap();
        assert_eq!(gltf["extensionsUsed"][0], "KHR_mesh_quantization");
        assert!(!dir.path().join("tiles/level_1_4.b3dm").exists());
    }

    #[test]
    fn test_glb_format_and_determinism() {
        let dir = tempfile::tempdir().unwrap();
        let config = TilesExportConfig {
            format: TileFormat::Glb,
            enable_compression: false,
            ..Default::default()
        };
        let exporter = TilesetExporter::new(config);
        let root = geo_tree();
        exporter.export(&root, dir.path()).unwrap();
        let first = fs::read_to_string(dir.path().join("tileset.json")).unwrap();
        exporter.export(&root, dir.path()).unwrap();
        let second = fs::read_to_string(dir.path().join("tileset.json")).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("tiles/level_0_0.glb"));
        let glb = fs::read(dir.path().join("tiles/level_0_0.glb")).unwrap();
        assert_eq!(&glb[0..4], b"glTF");
    }
}
