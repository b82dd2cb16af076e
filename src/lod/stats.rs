//! LOD tree statistics

use serde::Serialize;

use super::LodNode;
use crate::math::Bounds;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LodStats {
    pub total_nodes: usize,
    pub leaf_nodes: usize,
    pub total_triangles: usize,
    pub max_depth: u32,
    pub triangles_per_level: Vec<usize>,
    pub nodes_per_level: Vec<usize>,
    pub total_bounds: Option<Bounds>,
}

impl LodStats {
    pub fn compute(root: &LodNode) -> Self {
        let mut stats = LodStats {
            total_bounds: Some(root.bounds),
            ..Default::default()
        };
        root.traverse(&mut |node| {
            let level = node.level as usize;
            if stats.nodes_per_level.len() <= level {
                stats.nodes_per_level.resize(level + 1, 0);
                stats.triangles_per_level.resize(level + 1, 0);
            }
            let tris = node.mesh.triangle_count();
            stats.total_nodes += 1;
            stats.total_triangles += tris;
            stats.nodes_per_level[level] += 1;
            stats.triangles_per_level[level] += tris;
            stats.max_depth = stats.max_depth.max(node.level);
            if node.is_leaf() {
                stats.leaf_nodes += 1;
            }
        });
        stats
    }
}
