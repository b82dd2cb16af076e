//! Per-vertex attribute storage

use crate::core::types::{Vec2, Vec3};

/// Parallel attribute arrays over the vertex dimension
///
/// Positions are always present. Optional attributes are either empty or
/// exactly as long as `positions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexBuffer {
    pub positions: Vec<Vec3>,
    /// Per-vertex normals or empty
    pub normals: Vec<Vec3>,
    /// Per-vertex texture coordinates or empty
    pub tex_coords: Vec<Vec2>,
    /// Per-vertex RGBA colors or empty
    pub colors: Vec<[u8; 4]>,
}

impl VertexBuffer {
    /// Position-only buffer
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        Self { positions, ..Default::default() }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_tex_coords(&self) -> bool {
        !self.tex_coords.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    /// Check that every present attribute matches the position count
    pub fn validate(&self) -> Result<(), String> {
        let n = self.positions.len();
        let check = |name: &str, len: usize| {
            if len != 0 && len != n {
                Err(format!("{} has {} entries for {} vertices", name, len, n))
            } else {
                Ok(())
            }
        };
        check("normals", self.normals.len())?;
        check("tex_coords", self.tex_coords.len())?;
        check("colors", self.colors.len())
    }

    /// Build a new buffer holding the vertices listed in `order`
    pub fn gather(&self, order: &[u32]) -> VertexBuffer {
        let pick = |i: &u32| *i as usize;
        VertexBuffer {
            positions: order.iter().map(|i| self.positions[pick(i)]).collect(),
            normals: if self.has_normals() {
                order.iter().map(|i| self.normals[pick(i)]).collect()
            } else {
                Vec::new()
            },
            tex_coords: if self.has_tex_coords() {
                order.iter().map(|i| self.tex_coords[pick(i)]).collect()
            } else {
                Vec::new()
            },
            colors: if self.has_colors() {
                order.iter().map(|i| self.colors[pick(i)]).collect()
            } else {
                Vec::new()
            },
        }
    }

    /// Concatenate buffers
    ///
    /// An optional attribute survives only if every non-empty input has it.
    pub fn concat<'a, I>(buffers: I) -> VertexBuffer
    where
        I: IntoIterator<Item = &'a VertexBuffer>,
        I::IntoIter: Clone,
    {
        let iter = buffers.into_iter();
        let non_empty = || iter.clone().filter(|b| !b.is_empty());
        let keep_normals = non_empty().all(|b| b.has_normals());
        let keep_tex = non_empty().all(|b| b.has_tex_coords());
        let keep_colors = non_empty().all(|b| b.has_colors());

        let mut out = VertexBuffer::default();
        for b in non_empty() {
            out.positions.extend_from_slice(&b.positions);
            if keep_normals {
                out.normals.extend_from_slice(&b.normals);
            }
            if keep_tex {
                out.tex_coords.extend_from_slice(&b.tex_coords);
            }
            if keep_colors {
                out.colors.extend_from_slice(&b.colors);
            }
        }
        out
    }

    /// Apply `f` to every position, keeping other attributes
    pub fn map_positions(&self, f: impl Fn(Vec3) -> Vec3) -> VertexBuffer {
        VertexBuffer {
            positions: self.positions.iter().map(|p| f(*p)).collect(),
            ..self.clone()
        }
    }
}
