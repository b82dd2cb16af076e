//! LOD tree construction
//!
//! Two ways to build the hierarchy:
//! - recursive: each node splits its own (already simplified) mesh into
//!   sub-bounds and simplifies every part one level coarser;
//! - partition-guided: a spatial partition over the full-resolution mesh is
//!   mirrored, with each internal node holding a simplification of all the
//!   geometry below it.
//!
//! Geographic inputs always build recursively over a quadtree.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use super::{LodConfig, LodNode, LodStats};
use crate::core::error::Error;
use crate::core::progress::CancellationToken;
use crate::core::types::Result;
use crate::geo::extent_meters;
use crate::math::{Aabb, Bounds, GeoRect};
use crate::mesh::{clip_to_rect, Mesh};
use crate::partition::{PartitionConfig, Partitioner, SpatialNode};
use crate::simplify::{simplify, SimplificationStrategy};

/// Errors above the parent's are pulled down to this fraction of it
const ERROR_CLAMP: f64 = 0.9;

/// Builds LOD trees for one strategy and configuration
pub struct LodBuilder<'a> {
    config: LodConfig,
    strategy: &'a dyn SimplificationStrategy,
    /// Triangle budget per node in partition-guided mode
    max_triangles_per_tile: usize,
    cancel: CancellationToken,
    nodes_built: AtomicUsize,
}

impl<'a> LodBuilder<'a> {
    pub fn new(config: LodConfig, strategy: &'a dyn SimplificationStrategy) -> Self {
        Self {
            config,
            strategy,
            max_triangles_per_tile: 50_000,
            cancel: CancellationToken::new(),
            nodes_built: AtomicUsize::new(0),
        }
    }

    pub fn with_tile_budget(mut self, max_triangles_per_tile: usize) -> Self {
        self.max_triangles_per_tile = max_triangles_per_tile.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    /// Build from explicit root bounds; the bounds flavour picks the mode
    pub fn build(&self, mesh: &Mesh, root: Bounds) -> Result<LodNode> {
        match root {
            Bounds::Aabb(aabb) => self.build_geometric(mesh, Some(aabb)),
            Bounds::Geo(rect) => self.build_geographic(mesh, Some(rect)),
        }
    }

    /// Octree LOD over a mesh in 3D space
    pub fn build_geometric(&self, mesh: &Mesh, root: Option<Aabb>) -> Result<LodNode> {
        let tight = mesh
            .referenced_bounds()
            .ok_or_else(|| Error::Input("cannot build LOD tree from an empty mesh".into()))?;
        let bounds = Bounds::Aabb(root.map_or(tight, |r| r.merged(&tight)));

        let start = std::time::Instant::now();
        let root_node = if self.config.use_octree_subdivision {
            self.build_partitioned(mesh, bounds)?
        } else {
            self.build_recursive_root(mesh.clone(), bounds)?
        };
        self.finish(root_node, start)
    }

    /// Quadtree LOD over a mesh whose positions are (lon, lat, alt)
    pub fn build_geographic(&self, mesh: &Mesh, root: Option<GeoRect>) -> Result<LodNode> {
        if mesh.is_empty() {
            return Err(Error::Input("cannot build LOD tree from an empty mesh".into()));
        }
        let (rect, mesh) = match root {
            Some(rect) => (rect, clip_to_rect(mesh, &rect)),
            None => {
                let rect = GeoRect::from_lon_lat(
                    mesh.positions().iter().map(|p| (p.x as f64, p.y as f64)),
                )
                .ok_or_else(|| Error::Input("mesh has no positions".into()))?;
                (rect, mesh.clone())
            }
        };
        if mesh.is_empty() {
            return Err(Error::Input(format!("no geometry inside {rect:?}")));
        }

        let start = std::time::Instant::now();
        let root_node = self.build_recursive_root(mesh, Bounds::Geo(rect))?;
        self.finish(root_node, start)
    }

    fn finish(&self, mut root: LodNode, start: std::time::Instant) -> Result<LodNode> {
        root.assign_ids(0);
        validate(&root)?;
        let stats = LodStats::compute(&root);
        log::info!(
            "Built LOD tree: {} nodes, {} leaves, depth {}, {} triangles in {:.2}s",
            stats.total_nodes,
            stats.leaf_nodes,
            stats.max_depth,
            stats.total_triangles,
            start.elapsed().as_secs_f64()
        );
        Ok(root)
    }

    fn note_node(&self, node: &LodNode) {
        let n = self.nodes_built.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!(
            "LOD node #{n}: level {}, {} triangles, error {:.4}",
            node.level,
            node.mesh.triangle_count(),
            node.geometric_error
        );
    }

    /// Run `f` over sibling work items, in parallel if enabled, keeping order
    fn map_children<T, R, F>(&self, items: &[T], f: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<Option<R>> + Sync + Send,
    {
        let results: Vec<Result<Option<R>>> = if self.config.enable_parallel_processing {
            items.par_iter().map(&f).collect()
        } else {
            items.iter().map(&f).collect()
        };
        results.into_iter().filter_map(Result::transpose).collect()
    }

    // ---- recursive mode ----

    fn build_recursive_root(&self, mesh: Mesh, bounds: Bounds) -> Result<LodNode> {
        let mut root = self.build_recursive(LodNode::new(bounds, 0, mesh, 0.0))?;
        if !root.is_leaf() {
            root.geometric_error = root_extent(&root.bounds);
            clamp_errors(&mut root);
        }
        Ok(root)
    }

    fn can_split(&self, node: &LodNode) -> bool {
        if node.level >= self.config.max_lod_levels {
            return false;
        }
        if self.config.enforce_recursive_limits && self.below_limits(node) {
            return false;
        }
        self.strategy.should_subdivide(&node.mesh, &node.bounds, node.level)
    }

    fn below_limits(&self, node: &LodNode) -> bool {
        node.mesh.triangle_count() < self.config.min_triangles_for_subdivision
            || match &node.bounds {
                Bounds::Geo(r) => r.width().min(r.height()) < self.config.min_tile_size_degrees,
                aabb => aabb.is_below_size(self.config.min_node_size),
            }
    }

    fn build_recursive(&self, mut node: LodNode) -> Result<LodNode> {
        self.cancel.check()?;
        self.note_node(&node);
        if !self.can_split(&node) {
            return Ok(node);
        }

        let parts = split_mesh(&node.mesh, &node.bounds);
        let level = node.level + 1;
        node.children = self.map_children(&parts, |(cell, sub)| {
            if sub.is_empty() {
                return Ok(None);
            }
            let target = self.strategy.target_triangle_count(sub, level);
            let simplified = simplify(sub, self.strategy, target)?;
            let error = self.strategy.geometric_error(sub, &simplified);
            let child = LodNode::new(*cell, level, simplified, error);
            self.build_recursive(child).map(Some)
        })?;
        Ok(node)
    }

    // ---- partition-guided mode ----

    fn build_partitioned(&self, mesh: &Mesh, bounds: Bounds) -> Result<LodNode> {
        let partitioner = Partitioner::new(PartitionConfig {
            max_triangles_per_node: self.max_triangles_per_tile,
            max_depth: self.config.max_lod_levels,
            min_node_size: self.config.min_node_size,
        });
        let tree = partitioner
            .build(mesh, Some(bounds))
            .ok_or_else(|| Error::Input("cannot partition an empty mesh".into()))?;

        let mut root = self.mirror(mesh, &tree, bounds)?;
        if !root.is_leaf() {
            root.geometric_error = root_extent(&root.bounds);
            clamp_errors(&mut root);
        }
        Ok(root)
    }

    fn mirror(&self, mesh: &Mesh, spatial: &SpatialNode, bounds: Bounds) -> Result<LodNode> {
        self.cancel.check()?;
        let level = spatial.depth;
        let budget = self.max_triangles_per_tile;

        let node = if spatial.is_leaf() {
            let source = mesh.subset(&spatial.triangles);
            if source.triangle_count() > budget {
                let simplified = simplify(&source, self.strategy, budget)?;
                let error = self.strategy.geometric_error(&source, &simplified);
                LodNode::new(bounds, level, simplified, error)
            } else {
                LodNode::new(bounds, level, source, 0.0)
            }
        } else {
            let source = mesh.subset(&spatial.collect_triangles());
            let target = self.strategy.target_triangle_count(&source, level).min(budget);
            let simplified = simplify(&source, self.strategy, target)?;
            let error = self.strategy.geometric_error(&source, &simplified);
            let mut node = LodNode::new(bounds, level, simplified, error);

            let children: Vec<&SpatialNode> = spatial.child_nodes().collect();
            node.children = self.map_children(&children, |child| {
                let routed = mesh.subset(&child.collect_triangles());
                let child_bounds = grown(child.bounds, &routed);
                self.mirror(mesh, child, child_bounds).map(Some)
            })?;
            node
        };
        self.note_node(&node);
        Ok(node)
    }
}

/// Subdivision cell grown to cover the geometry routed into it
fn grown(cell: Bounds, routed: &Mesh) -> Bounds {
    match (cell, routed.referenced_bounds()) {
        (Bounds::Aabb(b), Some(tight)) => Bounds::Aabb(b.merged(&tight)),
        _ => cell,
    }
}

/// Split a node's mesh across its sub-bounds
///
/// Boxes route each triangle by centroid and grow each cell to cover what
/// it received. Rectangles keep inside triangles whole and clip the ones
/// crossing a split line.
fn split_mesh(mesh: &Mesh, bounds: &Bounds) -> Vec<(Bounds, Mesh)> {
    let cells = bounds.subdivide();
    match bounds {
        Bounds::Aabb(_) => {
            let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); cells.len()];
            for (t, c) in mesh.centroids().into_iter().enumerate() {
                buckets[bounds.child_index(c)].push(t as u32);
            }
            cells
                .into_iter()
                .zip(buckets)
                .map(|(cell, ids)| {
                    let sub = mesh.subset(&ids);
                    (grown(cell, &sub), sub)
                })
                .collect()
        }
        Bounds::Geo(_) => cells
            .into_iter()
            .map(|cell| {
                let sub = match &cell {
                    Bounds::Geo(rect) => clip_to_rect(mesh, rect),
                    Bounds::Aabb(_) => Mesh::default(),
                };
                (cell, sub)
            })
            .collect(),
    }
}

/// Error of a root that has children: its largest side, in metres for rectangles
pub fn root_extent(bounds: &Bounds) -> f64 {
    match bounds {
        Bounds::Aabb(b) => b.max_extent() as f64,
        Bounds::Geo(r) => {
            let (w, h) = extent_meters(r);
            w.max(h)
        }
    }
}

/// Pull any child error above its parent's down to a fraction of the parent
fn clamp_errors(node: &mut LodNode) {
    let parent = node.geometric_error;
    for child in &mut node.children {
        if child.geometric_error > parent {
            log::debug!(
                "Clamping error {:.4} of level {} node to {:.4}",
                child.geometric_error,
                child.level,
                parent * ERROR_CLAMP
            );
            child.geometric_error = parent * ERROR_CLAMP;
        }
        clamp_errors(child);
    }
}

/// Check level, containment and error monotonicity on every parent/child pair
pub fn validate(root: &LodNode) -> Result<()> {
    let mut violation: Option<String> = None;
    root.traverse_edges(&mut |parent, child| {
        if violation.is_some() {
            return;
        }
        if child.level != parent.level + 1 {
            violation = Some(format!("node {} has level {} under level {}", child.id, child.level, parent.level));
        } else if child.geometric_error > parent.geometric_error {
            violation = Some(format!(
                "node {} error {} exceeds parent error {}",
                child.id, child.geometric_error, parent.geometric_error
            ));
        } else if !parent.bounds.contains(&child.bounds) {
            violation = Some(format!("node {} bounds escape parent {}", child.id, parent.id));
        }
    });
    match violation {
        Some(msg) => Err(Error::Processing(msg)),
        None => Ok(()),
    }
}
