//! Clipping triangles against a geographic rectangle
//!
//! Geographic subdivision routes by vertex inclusion: a triangle whose
//! corners all lie in a quadrant goes there whole, and a triangle that
//! straddles a split line is cut so that each quadrant receives only the
//! part inside it. Positions are read as (lon, lat, alt).

use super::{Mesh, VertexBuffer};
use crate::core::types::{Vec2, Vec3};
use crate::math::GeoRect;

#[derive(Clone, Copy, Debug)]
struct ClipVertex {
    pos: Vec3,
    normal: Vec3,
    uv: Vec2,
    color: [f32; 4],
}

impl ClipVertex {
    fn from_buffer(vb: &VertexBuffer, i: u32) -> Self {
        let i = i as usize;
        Self {
            pos: vb.positions[i],
            normal: vb.normals.get(i).copied().unwrap_or(Vec3::ZERO),
            uv: vb.tex_coords.get(i).copied().unwrap_or(Vec2::ZERO),
            color: vb.colors.get(i).map(|c| c.map(f32::from)).unwrap_or([0.0; 4]),
        }
    }

    fn lerp(&self, other: &ClipVertex, t: f32) -> Self {
        let mut color = [0.0; 4];
        for (k, c) in color.iter_mut().enumerate() {
            *c = self.color[k] + (other.color[k] - self.color[k]) * t;
        }
        Self {
            pos: self.pos.lerp(other.pos, t),
            normal: self.normal.lerp(other.normal, t).normalize_or_zero(),
            uv: self.uv.lerp(other.uv, t),
            color,
        }
    }

    fn coord(&self, axis: usize) -> f64 {
        if axis == 0 { self.pos.x as f64 } else { self.pos.y as f64 }
    }
}

/// Accumulates output vertices with the attribute set of the source
struct Output<'a> {
    src: &'a VertexBuffer,
    vertices: VertexBuffer,
    indices: Vec<u32>,
}

impl<'a> Output<'a> {
    fn new(src: &'a VertexBuffer) -> Self {
        Self { src, vertices: VertexBuffer::default(), indices: Vec::new() }
    }

    fn push_source(&mut self, i: u32) -> u32 {
        let i = i as usize;
        let index = self.vertices.len() as u32;
        self.vertices.positions.push(self.src.positions[i]);
        if self.src.has_normals() {
            self.vertices.normals.push(self.src.normals[i]);
        }
        if self.src.has_tex_coords() {
            self.vertices.tex_coords.push(self.src.tex_coords[i]);
        }
        if self.src.has_colors() {
            self.vertices.colors.push(self.src.colors[i]);
        }
        index
    }

    fn push_clipped(&mut self, v: &ClipVertex) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.positions.push(v.pos);
        if self.src.has_normals() {
            self.vertices.normals.push(v.normal);
        }
        if self.src.has_tex_coords() {
            self.vertices.tex_coords.push(v.uv);
        }
        if self.src.has_colors() {
            self.vertices.colors.push(v.color.map(|c| c.round().clamp(0.0, 255.0) as u8));
        }
        index
    }
}

/// Restrict `mesh` to the part lying inside the closed rectangle `rect`
///
/// Every vertex of the result satisfies `rect.contains(x, y)`. Attributes of
/// cut vertices are interpolated along the cut edge.
pub fn clip_to_rect(mesh: &Mesh, rect: &GeoRect) -> Mesh {
    let src = mesh.vertices();
    let mut out = Output::new(src);
    let mut kept = vec![u32::MAX; mesh.vertex_count()];

    for t in 0..mesh.triangle_count() {
        let tri = mesh.triangle(t);
        let corners = tri.map(|i| src.positions[i as usize]);

        if corners.iter().all(|p| rect.contains(p.x as f64, p.y as f64)) {
            for i in tri {
                if kept[i as usize] == u32::MAX {
                    kept[i as usize] = out.push_source(i);
                }
                out.indices.push(kept[i as usize]);
            }
            continue;
        }

        let Some(footprint) = GeoRect::from_lon_lat(corners.iter().map(|p| (p.x as f64, p.y as f64))) else {
            continue;
        };
        if !rect.intersects(&footprint) {
            continue;
        }

        let polygon = clip_polygon(tri.map(|i| ClipVertex::from_buffer(src, i)).to_vec(), rect);
        if polygon.len() < 3 {
            continue;
        }

        let mut fan: Vec<Option<u32>> = vec![None; polygon.len()];
        for k in 1..polygon.len() - 1 {
            let (a, b, c) = (&polygon[0], &polygon[k], &polygon[k + 1]);
            if a.pos == b.pos || b.pos == c.pos || a.pos == c.pos {
                continue;
            }
            for j in [0, k, k + 1] {
                let index = match fan[j] {
                    Some(index) => index,
                    None => {
                        let index = out.push_clipped(&polygon[j]);
                        fan[j] = Some(index);
                        index
                    }
                };
                out.indices.push(index);
            }
        }
    }

    Mesh::from_parts(out.vertices, out.indices)
}

/// Sutherland-Hodgman clip of a convex polygon against the rectangle edges
fn clip_polygon(mut poly: Vec<ClipVertex>, rect: &GeoRect) -> Vec<ClipVertex> {
    let planes = [
        (0, rect.min_lon, true),
        (0, rect.max_lon, false),
        (1, rect.min_lat, true),
        (1, rect.max_lat, false),
    ];

    for (axis, bound, keep_above) in planes {
        if poly.is_empty() {
            break;
        }
        let inside = |v: &ClipVertex| {
            let c = v.coord(axis);
            if keep_above { c >= bound } else { c <= bound }
        };

        let mut next = Vec::with_capacity(poly.len() + 2);
        for i in 0..poly.len() {
            let a = &poly[i];
            let b = &poly[(i + 1) % poly.len()];
            match (inside(a), inside(b)) {
                (true, true) => next.push(*b),
                (true, false) => next.push(cut(a, b, axis, bound)),
                (false, true) => {
                    next.push(cut(a, b, axis, bound));
                    next.push(*b);
                }
                (false, false) => {}
            }
        }
        poly = next;
    }

    for v in &mut poly {
        v.pos.x = snap_inside(v.pos.x as f64, rect.min_lon, rect.max_lon);
        v.pos.y = snap_inside(v.pos.y as f64, rect.min_lat, rect.max_lat);
    }
    poly
}

fn cut(a: &ClipVertex, b: &ClipVertex, axis: usize, bound: f64) -> ClipVertex {
    let (ca, cb) = (a.coord(axis), b.coord(axis));
    let t = ((bound - ca) / (cb - ca)).clamp(0.0, 1.0);
    let mut v = a.lerp(b, t as f32);
    if axis == 0 {
        v.pos.x = bound as f32;
    } else {
        v.pos.y = bound as f32;
    }
    v
}

/// Nearest f32 to `value` that lies in the closed range `[lo, hi]`
fn snap_inside(value: f64, lo: f64, hi: f64) -> f32 {
    if lo > hi {
        return lo as f32;
    }
    let mut v = value.clamp(lo, hi) as f32;
    while (v as f64) < lo {
        v = step_up(v);
    }
    while (v as f64) > hi {
        v = step_down(v);
    }
    v
}

fn step_up(v: f32) -> f32 {
    if v == 0.0 {
        f32::from_bits(1)
    } else if v > 0.0 {
        f32::from_bits(v.to_bits() + 1)
    } else {
        f32::from_bits(v.to_bits() - 1)
    }
}

fn step_down(v: f32) -> f32 {
    -step_up(-v)
}
