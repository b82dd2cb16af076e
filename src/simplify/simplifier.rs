//! Strategy-driven mesh simplification

use super::kernel;
use super::strategy::SimplificationStrategy;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::mesh::Mesh;

/// Simplify `mesh` to at most `target` triangles
///
/// Meshes already within budget, and empty meshes, come back unchanged.
/// Output vertices are compacted in first-seen order and keep the
/// attributes of the input vertex they came from.
pub fn simplify(mesh: &Mesh, strategy: &dyn SimplificationStrategy, target: usize) -> Result<Mesh> {
    if mesh.is_empty() || mesh.triangle_count() <= target {
        return Ok(mesh.clone());
    }

    let output = kernel::simplify_with_error(
        mesh.indices(),
        mesh.positions(),
        target.saturating_mul(3),
        strategy.target_error(),
    );
    if output.indices.is_empty() {
        return Err(Error::Processing(format!(
            "simplification of {} triangles to {} produced an empty mesh",
            mesh.triangle_count(),
            target
        )));
    }

    let simplified = mesh.compact(&output.indices);
    log::debug!(
        "Simplified {} -> {} triangles ({}, error {:.4})",
        mesh.triangle_count(),
        simplified.triangle_count(),
        strategy.name(),
        output.error
    );
    Ok(simplified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::types::{Vec2, Vec3};
    use crate::mesh::VertexBuffer;
    use crate::simplify::TriangleCountStrategy;

    fn textured_grid(n: u32) -> Mesh {
        let mut vb = VertexBuffer::default();
        for y in 0..=n {
            for x in 0..=n {
                vb.positions.push(Vec3::new(x as f32, y as f32, ((x * y) % 3) as f32 * 0.1));
                vb.tex_coords.push(Vec2::new(x as f32 / n as f32, y as f32 / n as f32));
            }
        }
        let row = n + 1;
        let mut indices = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let i = y * row + x;
                indices.extend_from_slice(&[i, i + 1, i + row + 1, i, i + row + 1, i + row]);
            }
        }
        Mesh::new(vb, indices).unwrap()
    }

    #[test]
    fn test_identity_when_within_target() {
        let mesh = textured_grid(4);
        let strategy = TriangleCountStrategy::default();
        let out = simplify(&mesh, &strategy, mesh.triangle_count()).unwrap();
        assert_eq!(out.indices(), mesh.indices());
        assert_eq!(out.positions(), mesh.positions());
    }

    #[test]
    fn test_empty_passthrough() {
        let mesh = Mesh::from_positions(vec![], vec![]).unwrap();
        let out = simplify(&mesh, &TriangleCountStrategy::default(), 0).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_reduces_and_compacts() {
        let mesh = textured_grid(16);
        let out = simplify(&mesh, &TriangleCountStrategy::default(), 128).unwrap();
        assert!(out.triangle_count() <= 128);
        assert!(out.triangle_count() > 0);
        assert!(out.is_compact());
        assert!(out.indices().iter().all(|&i| (i as usize) < out.vertex_count()));
        assert_eq!(out.vertices().tex_coords.len(), out.vertex_count());

        // every output vertex is an input vertex with its attributes intact
        for (p, uv) in out.positions().iter().zip(&out.vertices().tex_coords) {
            let src = mesh.positions().iter().position(|q| q == p).unwrap();
            assert_eq!(mesh.vertices().tex_coords[src], *uv);
        }
    }

    #[test]
    fn test_zero_target_is_processing_error() {
        let mesh = textured_grid(2);
        let err = simplify(&mesh, &TriangleCountStrategy::default(), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Processing);
    }
}
