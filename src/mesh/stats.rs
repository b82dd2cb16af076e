//! Mesh statistics

use serde::Serialize;

use super::Mesh;
use crate::math::Aabb;

/// Summary of a mesh used for load reports and CLI output
#[derive(Clone, Debug, Default, Serialize)]
pub struct MeshStats {
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub bounds: Option<Aabb>,
    /// Sum of triangle areas
    pub surface_area: f64,
    pub has_normals: bool,
    pub has_tex_coords: bool,
    pub has_colors: bool,
}

impl MeshStats {
    pub fn compute(mesh: &Mesh) -> Self {
        let surface_area = (0..mesh.triangle_count())
            .map(|t| {
                let [a, b, c] = mesh.triangle_positions(t);
                0.5 * (b - a).cross(c - a).length() as f64
            })
            .sum();

        let vertices = mesh.vertices();
        Self {
            vertex_count: mesh.vertex_count(),
            triangle_count: mesh.triangle_count(),
            bounds: mesh.bounds(),
            surface_area,
            has_normals: vertices.has_normals(),
            has_tex_coords: vertices.has_tex_coords(),
            has_colors: vertices.has_colors(),
        }
    }
}
