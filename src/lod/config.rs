//! LOD construction settings

use serde::{Deserialize, Serialize};

/// Configuration for LOD tree construction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Deepest level a node may have (root is level 0)
    pub max_lod_levels: u32,
    /// Nodes with fewer triangles are not split in recursive mode
    ///
    /// Only read when `enforce_recursive_limits` is set.
    pub min_triangles_for_subdivision: usize,
    /// Smallest rectangle side, in degrees, that is still split
    pub min_tile_size_degrees: f64,
    /// Box volume below `min_node_size³` is not split
    pub min_node_size: f64,
    /// Apply the triangle-count and size floors on top of the strategy's
    /// own stop rule in recursive mode
    pub enforce_recursive_limits: bool,
    /// Build sibling subtrees concurrently
    pub enable_parallel_processing: bool,
    /// Mirror a spatial partition instead of recursing on simplified meshes
    pub use_octree_subdivision: bool,
    /// Relative deviation accepted by the simplification kernel
    pub target_error: f32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            max_lod_levels: 8,
            min_triangles_for_subdivision: 100,
            min_tile_size_degrees: 0.001,
            min_node_size: 0.001,
            enforce_recursive_limits: false,
            enable_parallel_processing: true,
            use_octree_subdivision: true,
            target_error: 0.01,
        }
    }
}
