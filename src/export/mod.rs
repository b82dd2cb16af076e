//! Exporters: 3D Tiles (glb/b3dm tiles plus `tileset.json`) and scene-graph archives

pub mod b3dm;
pub mod glb;
pub mod scene_graph;
pub mod tileset;

pub use b3dm::{parse_b3dm, wrap_b3dm};
pub use glb::{mesh_to_glb, GlbOptions};
pub use scene_graph::{read_archive, SceneArchive, SceneGraphExportConfig, SceneGraphExporter};
pub use tileset::{TileFormat, TilesExportConfig, TilesetExporter, TilesetOutput};

pub use crate::geo::wgs84_to_cartesian;
