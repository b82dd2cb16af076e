//! LOD tree node

use crate::math::Bounds;
use crate::mesh::Mesh;

/// Node of the LOD hierarchy
///
/// Children refine their parent: they sit one level deeper, inside the
/// parent's bounds, with a geometric error no larger than the parent's.
#[derive(Clone, Debug)]
pub struct LodNode {
    /// Depth-first preorder index, root = 0
    pub id: u32,
    pub bounds: Bounds,
    pub level: u32,
    pub mesh: Mesh,
    pub geometric_error: f64,
    pub children: Vec<LodNode>,
}

impl LodNode {
    pub fn new(bounds: Bounds, level: u32, mesh: Mesh, geometric_error: f64) -> Self {
        Self {
            id: 0,
            bounds,
            level,
            mesh,
            geometric_error,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth-first pre-order visit of this subtree
    pub fn traverse<'a>(&'a self, visit: &mut impl FnMut(&'a LodNode)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }

    /// Visit every node together with its parent
    pub fn traverse_edges<'a>(&'a self, visit: &mut impl FnMut(&'a LodNode, &'a LodNode)) {
        for child in &self.children {
            visit(self, child);
            child.traverse_edges(visit);
        }
    }

    /// Renumber the subtree in depth-first preorder starting at `first`
    ///
    /// Returns the next free id.
    pub fn assign_ids(&mut self, first: u32) -> u32 {
        self.id = first;
        let mut next = first + 1;
        for child in &mut self.children {
            next = child.assign_ids(next);
        }
        next
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(LodNode::node_count).sum::<usize>()
    }

    /// Nodes of this subtree in preorder
    pub fn nodes(&self) -> Vec<&LodNode> {
        let mut out = Vec::new();
        self.traverse(&mut |node| out.push(node));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::math::Aabb;

    fn node(level: u32) -> LodNode {
        LodNode::new(
            Bounds::Aabb(Aabb::new(Vec3::ZERO, Vec3::ONE)),
            level,
            Mesh::default(),
            0.0,
        )
    }

    #[test]
    fn test_preorder_ids() {
        let mut root = node(0);
        let mut a = node(1);
        a.children.push(node(2));
        root.children.push(a);
        root.children.push(node(1));

        assert_eq!(root.assign_ids(0), 4);
        let ids: Vec<u32> = root.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(root.children[1].id, 3);
        assert_eq!(root.node_count(), 4);
    }

    #[test]
    fn test_edges() {
        let mut root = node(0);
        root.children.push(node(1));
        root.children.push(node(1));
        let mut count = 0;
        root.traverse_edges(&mut |parent, child| {
            assert_eq!(parent.level + 1, child.level);
            count += 1;
        });
        assert_eq!(count, 2);
    }
}
