//! Partition tree statistics

use serde::Serialize;

use super::SpatialNode;

/// Shape summary of a partition tree, gathered in one depth-first pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub total_nodes: usize,
    pub leaf_nodes: usize,
    pub total_triangles: usize,
    pub max_depth: u32,
    /// Triangles held by nodes at each depth
    pub triangles_per_level: Vec<usize>,
    /// Nodes at each depth
    pub nodes_per_level: Vec<usize>,
}

impl PartitionStats {
    pub fn compute(root: &SpatialNode) -> Self {
        let mut stats = PartitionStats::default();
        root.traverse(&mut |node| {
            stats.total_nodes += 1;
            if node.is_leaf() {
                stats.leaf_nodes += 1;
            }
            stats.total_triangles += node.triangles.len();
            stats.max_depth = stats.max_depth.max(node.depth);

            let depth = node.depth as usize;
            if stats.nodes_per_level.len() <= depth {
                stats.nodes_per_level.resize(depth + 1, 0);
                stats.triangles_per_level.resize(depth + 1, 0);
            }
            stats.nodes_per_level[depth] += 1;
            stats.triangles_per_level[depth] += node.triangles.len();
        });
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::math::{Aabb, Bounds};

    #[test]
    fn test_counts() {
        let bounds = Bounds::Aabb(Aabb::new(Vec3::ZERO, Vec3::ONE));
        let mut root = SpatialNode::new(bounds, 0, Vec::new());
        root.children = vec![None; 8];
        root.children[0] = Some(Box::new(SpatialNode::new(bounds, 1, vec![0, 1, 2])));
        root.children[7] = Some(Box::new(SpatialNode::new(bounds, 1, vec![3])));

        let stats = PartitionStats::compute(&root);
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.leaf_nodes, 2);
        assert_eq!(stats.total_triangles, 4);
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.nodes_per_level, vec![1, 2]);
        assert_eq!(stats.triangles_per_level, vec![0, 4]);
    }
}
