//! Immutable indexed triangle mesh

use super::buffer::VertexBuffer;
use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::math::Aabb;

/// Sentinel for "vertex not yet remapped"
const UNMAPPED: u32 = u32::MAX;

/// Triangle mesh: a vertex buffer plus a flat index buffer
///
/// Every index is below the vertex count and the index count is a multiple
/// of three. Operations return new meshes; a mesh is never edited in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    vertices: VertexBuffer,
    indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh, validating buffer invariants
    pub fn new(vertices: VertexBuffer, indices: Vec<u32>) -> Result<Self> {
        vertices.validate().map_err(Error::Input)?;
        if indices.len() % 3 != 0 {
            return Err(Error::Input(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        let count = vertices.len() as u32;
        if let Some(bad) = indices.iter().find(|&&i| i >= count) {
            return Err(Error::Input(format!(
                "index {} out of range for {} vertices",
                bad, count
            )));
        }
        Ok(Self { vertices, indices })
    }

    /// Position-only mesh
    pub fn from_positions(positions: Vec<Vec3>, indices: Vec<u32>) -> Result<Self> {
        Self::new(VertexBuffer::from_positions(positions), indices)
    }

    /// Internal constructor for buffers built by this crate's own operations
    pub(crate) fn from_parts(vertices: VertexBuffer, indices: Vec<u32>) -> Self {
        debug_assert!(vertices.validate().is_ok());
        debug_assert!(indices.len() % 3 == 0);
        debug_assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        Self { vertices, indices }
    }

    pub fn vertices(&self) -> &VertexBuffer {
        &self.vertices
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.vertices.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Empty iff there are no vertices or no indices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Vertex indices of triangle `t`
    pub fn triangle(&self, t: usize) -> [u32; 3] {
        let i = t * 3;
        [self.indices[i], self.indices[i + 1], self.indices[i + 2]]
    }

    /// Corner positions of triangle `t`
    pub fn triangle_positions(&self, t: usize) -> [Vec3; 3] {
        self.triangle(t).map(|i| self.vertices.positions[i as usize])
    }

    /// Centroid `(v0 + v1 + v2) / 3` of triangle `t`
    pub fn centroid(&self, t: usize) -> Vec3 {
        let [a, b, c] = self.triangle_positions(t);
        (a + b + c) / 3.0
    }

    /// Centroids of all triangles in order
    pub fn centroids(&self) -> Vec<Vec3> {
        (0..self.triangle_count()).map(|t| self.centroid(t)).collect()
    }

    /// Tight bounds of the vertex positions
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(&self.vertices.positions)
    }

    /// Tight bounds of the vertices actually referenced by triangles
    pub fn referenced_bounds(&self) -> Option<Aabb> {
        let mut iter = self.indices.iter().map(|&i| self.vertices.positions[i as usize]);
        let first = iter.next()?;
        let mut aabb = Aabb::new(first, first);
        for p in iter {
            aabb.expand(p);
        }
        Some(aabb)
    }

    /// Mesh with exactly the listed triangles
    ///
    /// The vertex buffer is compacted to referenced vertices in first-seen
    /// order. Out-of-range triangle ids are ignored.
    pub fn subset(&self, triangle_ids: &[u32]) -> Mesh {
        let tri_count = self.triangle_count();
        let mut indices = Vec::with_capacity(triangle_ids.len() * 3);
        for &t in triangle_ids {
            if (t as usize) < tri_count {
                indices.extend_from_slice(&self.triangle(t as usize));
            }
        }
        self.compact(&indices)
    }

    /// Build a compact mesh from an index buffer into this mesh's vertices
    ///
    /// Each output vertex takes the attributes of its first-seen pre-image.
    pub fn compact(&self, indices: &[u32]) -> Mesh {
        let mut remap = vec![UNMAPPED; self.vertex_count()];
        let mut order: Vec<u32> = Vec::new();
        let mut new_indices = Vec::with_capacity(indices.len());

        for &i in indices {
            let slot = &mut remap[i as usize];
            if *slot == UNMAPPED {
                *slot = order.len() as u32;
                order.push(i);
            }
            new_indices.push(*slot);
        }

        Mesh::from_parts(self.vertices.gather(&order), new_indices)
    }

    /// Concatenate meshes, rebasing each index buffer by the running vertex offset
    pub fn concat<'a, I>(meshes: I) -> Mesh
    where
        I: IntoIterator<Item = &'a Mesh>,
    {
        let meshes: Vec<&Mesh> = meshes.into_iter().filter(|m| !m.vertices.is_empty()).collect();
        let vertices = VertexBuffer::concat(meshes.iter().map(|m| &m.vertices));

        let mut indices = Vec::with_capacity(meshes.iter().map(|m| m.indices.len()).sum());
        let mut offset = 0u32;
        for m in &meshes {
            indices.extend(m.indices.iter().map(|&i| i + offset));
            offset += m.vertex_count() as u32;
        }
        Mesh::from_parts(vertices, indices)
    }

    /// Copy with every position translated by `offset`
    pub fn translated(&self, offset: Vec3) -> Mesh {
        self.with_positions(|p| p + offset)
    }

    /// Copy with positions mapped through `f`
    pub fn with_positions(&self, f: impl Fn(Vec3) -> Vec3) -> Mesh {
        Mesh {
            vertices: self.vertices.map_positions(f),
            indices: self.indices.clone(),
        }
    }

    /// Check that every vertex is referenced by some triangle
    pub fn is_compact(&self) -> bool {
        let mut used = vec![false; self.vertex_count()];
        for &i in &self.indices {
            used[i as usize] = true;
        }
        used.into_iter().all(|u| u)
    }
}
