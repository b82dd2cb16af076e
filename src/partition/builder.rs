//! Partition tree construction by triangle-centroid routing

use super::{PartitionConfig, SpatialNode};
use crate::core::types::Vec3;
use crate::math::{Bounds, GeoRect};
use crate::mesh::Mesh;

/// Builds octrees (box bounds) or quadtrees (geographic bounds) over a mesh
///
/// Every triangle lands in exactly one leaf: the child whose closed
/// sub-bounds holds its centroid, lowest index first on shared faces.
#[derive(Clone, Debug, Default)]
pub struct Partitioner {
    config: PartitionConfig,
}

impl Partitioner {
    pub fn new(config: PartitionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Build a tree rooted at `root`, or at the mesh's box bounds if `None`
    ///
    /// Returns `None` for an empty mesh.
    pub fn build(&self, mesh: &Mesh, root: Option<Bounds>) -> Option<SpatialNode> {
        if mesh.is_empty() {
            log::warn!("Cannot partition an empty mesh");
            return None;
        }
        let root = match root {
            Some(bounds) => bounds,
            None => Bounds::from_positions(mesh.positions(), false)?,
        };
        Some(self.build_from(mesh, root))
    }

    /// Build a quadtree over (x, y) read as (lon, lat)
    pub fn build_geographic(&self, mesh: &Mesh, rect: Option<GeoRect>) -> Option<SpatialNode> {
        let root = match rect {
            Some(rect) => Bounds::Geo(rect),
            None => Bounds::from_positions(mesh.positions(), true)?,
        };
        self.build(mesh, Some(root))
    }

    fn build_from(&self, mesh: &Mesh, root: Bounds) -> SpatialNode {
        let centroids = mesh.centroids();
        let all: Vec<u32> = (0..centroids.len() as u32).collect();
        let mut node = SpatialNode::new(root, 0, all);
        self.split(&mut node, &centroids);

        log::debug!(
            "Partitioned {} triangles into {} leaves",
            centroids.len(),
            node.leaf_count()
        );
        node
    }

    fn should_stop(&self, node: &SpatialNode) -> bool {
        node.triangles.len() <= self.config.max_triangles_per_node
            || node.depth >= self.config.max_depth
            || node.bounds.is_below_size(self.config.min_node_size)
    }

    fn split(&self, node: &mut SpatialNode, centroids: &[Vec3]) {
        if self.should_stop(node) {
            return;
        }

        let sub_bounds = node.bounds.subdivide();
        let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); sub_bounds.len()];
        for &t in &node.triangles {
            let slot = node.bounds.child_index(centroids[t as usize]);
            buckets[slot].push(t);
        }

        let mut children: Vec<Option<Box<SpatialNode>>> = Vec::with_capacity(sub_bounds.len());
        for (bounds, ids) in sub_bounds.into_iter().zip(buckets) {
            if ids.is_empty() {
                children.push(None);
                continue;
            }
            let mut child = SpatialNode::new(bounds, node.depth + 1, ids);
            self.split(&mut child, centroids);
            children.push(Some(Box::new(child)));
        }

        node.children = children;
        if !node.is_leaf() {
            node.triangles = Vec::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Aabb;
    use crate::partition::PartitionStats;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// `count` small random triangles inside the unit cube
    fn random_mesh(count: usize, seed: u64) -> Mesh {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut positions = Vec::with_capacity(count * 3);
        for _ in 0..count * 3 {
            positions.push(Vec3::new(rng.random(), rng.random(), rng.random()));
        }
        let indices = (0..positions.len() as u32).collect();
        Mesh::from_positions(positions, indices).unwrap()
    }

    fn config(max: usize) -> PartitionConfig {
        PartitionConfig {
            max_triangles_per_node: max,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_mesh_gives_no_tree() {
        assert!(Partitioner::default().build(&Mesh::default(), None).is_none());
    }

    #[test]
    fn test_small_mesh_is_single_leaf() {
        let mesh = random_mesh(10, 1);
        let tree = Partitioner::new(config(100)).build(&mesh, None).unwrap();
        assert!(tree.is_leaf());
        assert_eq!(tree.triangles.len(), 10);
    }

    #[test]
    fn test_conservation_and_uniqueness() {
        let mesh = random_mesh(1000, 7);
        let tree = Partitioner::new(config(100)).build(&mesh, None).unwrap();

        let mut ids = tree.collect_triangles();
        assert_eq!(ids.len(), 1000);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 1000);

        let stats = PartitionStats::compute(&tree);
        assert!(stats.max_depth >= 1);
        assert_eq!(stats.total_triangles, 1000);
    }

    #[test]
    fn test_leaves_hold_their_centroids() {
        let mesh = random_mesh(500, 3);
        let tree = Partitioner::new(config(20)).build(&mesh, None).unwrap();
        tree.traverse(&mut |node| {
            if node.is_leaf() {
                for &t in &node.triangles {
                    assert!(node.bounds.contains_vertex(mesh.centroid(t as usize)));
                }
                assert!(node.triangles.len() <= 20 || node.depth == 8);
            } else {
                assert!(node.triangles.is_empty());
            }
        });
    }

    #[test]
    fn test_planar_mesh_stays_single_leaf() {
        let mut rng = StdRng::seed_from_u64(9);
        let positions: Vec<Vec3> = (0..2000 * 3)
            .map(|_| Vec3::new(rng.random(), rng.random(), 0.0))
            .collect();
        let indices = (0..positions.len() as u32).collect();
        let mesh = Mesh::from_positions(positions, indices).unwrap();

        let tree = Partitioner::default().build(&mesh, None).unwrap();
        assert!(tree.is_leaf());
        assert_eq!(tree.triangles.len(), 2000);
        assert_eq!(PartitionStats::compute(&tree).total_nodes, 1);
    }

    #[test]
    fn test_depth_limit() {
        let mesh = random_mesh(300, 11);
        let limited = PartitionConfig {
            max_triangles_per_node: 1,
            max_depth: 2,
            min_node_size: 0.0,
        };
        let tree = Partitioner::new(limited).build(&mesh, None).unwrap();
        assert_eq!(PartitionStats::compute(&tree).max_depth, 2);
    }

    #[test]
    fn test_centroid_on_split_plane_goes_low() {
        // both triangles have centroid exactly at the root center (1,1,1)
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 2.0, 2.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.5, 1.0, 1.0),
            Vec3::new(1.5, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
        ];
        let mesh = Mesh::from_positions(positions, vec![0, 1, 2, 3, 4, 5]).unwrap();
        let tree = Partitioner::new(PartitionConfig {
            max_triangles_per_node: 1,
            max_depth: 1,
            min_node_size: 0.0,
        })
        .build(&mesh, Some(Bounds::Aabb(Aabb::new(Vec3::ZERO, Vec3::splat(2.0)))))
        .unwrap();

        let child = tree.children[0].as_ref().unwrap();
        assert_eq!(child.triangles, vec![0, 1]);
        assert!(tree.children[1..].iter().all(Option::is_none));
    }

    #[test]
    fn test_quadtree_on_lon_lat() {
        let positions = vec![
            Vec3::new(101.0, 31.0, 0.0),
            Vec3::new(102.0, 31.0, 0.0),
            Vec3::new(101.0, 32.0, 0.0),
            Vec3::new(118.0, 48.0, 0.0),
            Vec3::new(119.0, 48.0, 0.0),
            Vec3::new(118.0, 49.0, 0.0),
        ];
        let mesh = Mesh::from_positions(positions, vec![0, 1, 2, 3, 4, 5]).unwrap();
        let tree = Partitioner::new(config(1))
            .build_geographic(&mesh, Some(GeoRect::new(100.0, 30.0, 120.0, 50.0)))
            .unwrap();

        assert_eq!(tree.children.len(), 4);
        assert_eq!(tree.children[0].as_ref().unwrap().triangles, vec![0]);
        assert_eq!(tree.children[3].as_ref().unwrap().triangles, vec![1]);
        assert!(tree.children[1].is_none() && tree.children[2].is_none());
    }

    #[test]
    fn test_deterministic() {
        let mesh = random_mesh(800, 5);
        let p = Partitioner::new(config(50));
        let a = p.build(&mesh, None).unwrap();
        let b = p.build(&mesh, None).unwrap();
        assert_eq!(a.collect_triangles(), b.collect_triangles());
        assert_eq!(PartitionStats::compute(&a), PartitionStats::compute(&b));
    }
}
