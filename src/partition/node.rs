//! Partition tree node

use crate::math::Bounds;

/// Node of a spatial partition tree
///
/// Leaves own the ids of the triangles routed to them; internal nodes own
/// a fixed-arity array of optional children and no triangles.
#[derive(Clone, Debug)]
pub struct SpatialNode {
    pub bounds: Bounds,
    pub depth: u32,
    /// Triangle ids (leaf only)
    pub triangles: Vec<u32>,
    /// One slot per sub-bounds, in subdivision order
    pub children: Vec<Option<Box<SpatialNode>>>,
}

impl SpatialNode {
    pub fn new(bounds: Bounds, depth: u32, triangles: Vec<u32>) -> Self {
        Self {
            bounds,
            depth,
            triangles,
            children: Vec::new(),
        }
    }

    /// A node is a leaf iff no child slot is populated
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// Populated children in slot order
    pub fn child_nodes(&self) -> impl Iterator<Item = &SpatialNode> {
        self.children.iter().filter_map(|c| c.as_deref())
    }

    /// Depth-first pre-order visit of this subtree
    pub fn traverse<'a>(&'a self, visit: &mut impl FnMut(&'a SpatialNode)) {
        visit(self);
        for child in self.child_nodes() {
            child.traverse(visit);
        }
    }

    /// Triangle ids of every leaf below this node, in depth-first order
    pub fn collect_triangles(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        self.traverse(&mut |node| {
            if node.is_leaf() {
                ids.extend_from_slice(&node.triangles);
            }
        });
        ids
    }

    /// Number of leaves below (and including) this node
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |node| {
            if node.is_leaf() {
                count += 1;
            }
        });
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::math::Aabb;

    fn cube() -> Bounds {
        Bounds::Aabb(Aabb::new(Vec3::ZERO, Vec3::ONE))
    }

    #[test]
    fn test_leaf_detection() {
        let mut node = SpatialNode::new(cube(), 0, vec![0, 1]);
        assert!(node.is_leaf());
        node.children = vec![None; 8];
        assert!(node.is_leaf());
        node.children[3] = Some(Box::new(SpatialNode::new(cube(), 1, vec![0, 1])));
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_collect_in_slot_order() {
        let mut root = SpatialNode::new(cube(), 0, Vec::new());
        root.children = vec![None; 8];
        root.children[5] = Some(Box::new(SpatialNode::new(cube(), 1, vec![9])));
        root.children[1] = Some(Box::new(SpatialNode::new(cube(), 1, vec![4, 2])));
        assert_eq!(root.collect_triangles(), vec![4, 2, 9]);
        assert_eq!(root.leaf_count(), 2);
    }
}
