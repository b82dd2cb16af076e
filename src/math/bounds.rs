//! Tagged bounds over 3D boxes and geographic rectangles

use serde::{Deserialize, Serialize};

use super::{Aabb, GeoRect};
use crate::core::types::Vec3;

/// Bounds of a spatial or LOD node
///
/// Geographic bounds read vertex `x` as longitude and `y` as latitude.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Bounds {
    Aabb(Aabb),
    Geo(GeoRect),
}

impl Bounds {
    /// Tight bounds of a position set in the requested flavour
    pub fn from_positions(positions: &[Vec3], geographic: bool) -> Option<Bounds> {
        if geographic {
            GeoRect::from_lon_lat(positions.iter().map(|p| (p.x as f64, p.y as f64))).map(Bounds::Geo)
        } else {
            Aabb::from_points(positions).map(Bounds::Aabb)
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Bounds::Geo(_))
    }

    /// Number of children produced by [`Bounds::subdivide`]
    pub fn arity(&self) -> usize {
        match self {
            Bounds::Aabb(_) => 8,
            Bounds::Geo(_) => 4,
        }
    }

    /// Equal subdivision: octants for boxes, SW/SE/NW/NE for rectangles
    pub fn subdivide(&self) -> Vec<Bounds> {
        match self {
            Bounds::Aabb(b) => b.subdivide().into_iter().map(Bounds::Aabb).collect(),
            Bounds::Geo(r) => r.subdivide().into_iter().map(Bounds::Geo).collect(),
        }
    }

    /// Index of the lowest-numbered child whose closed bounds hold `p`
    pub fn child_index(&self, p: Vec3) -> usize {
        match self {
            Bounds::Aabb(b) => b.octant_of(p) as usize,
            Bounds::Geo(r) => r.quadrant_of(p.x as f64, p.y as f64) as usize,
        }
    }

    /// Closed containment of a vertex position
    pub fn contains_vertex(&self, p: Vec3) -> bool {
        match self {
            Bounds::Aabb(b) => b.contains_point(p),
            Bounds::Geo(r) => r.contains(p.x as f64, p.y as f64),
        }
    }

    /// Containment of other bounds of the same flavour
    pub fn contains(&self, other: &Bounds) -> bool {
        match (self, other) {
            (Bounds::Aabb(a), Bounds::Aabb(b)) => a.contains_aabb(b),
            (Bounds::Geo(a), Bounds::Geo(b)) => a.contains_rect(b),
            _ => false,
        }
    }

    /// Smallest bounds of the same flavour covering both; mixed flavours keep `self`
    pub fn union(&self, other: &Bounds) -> Bounds {
        match (self, other) {
            (Bounds::Aabb(a), Bounds::Aabb(b)) => Bounds::Aabb(a.merged(b)),
            (Bounds::Geo(a), Bounds::Geo(b)) => Bounds::Geo(a.union(b)),
            _ => *self,
        }
    }

    /// Box volume, or rectangle area in square degrees
    pub fn volume(&self) -> f64 {
        match self {
            Bounds::Aabb(b) => b.volume() as f64,
            Bounds::Geo(r) => r.area(),
        }
    }

    /// Largest per-axis extent in the bounds' own units
    pub fn max_extent(&self) -> f64 {
        match self {
            Bounds::Aabb(b) => b.max_extent() as f64,
            Bounds::Geo(r) => r.width().max(r.height()),
        }
    }

    pub fn diagonal(&self) -> f64 {
        match self {
            Bounds::Aabb(b) => b.diagonal() as f64,
            Bounds::Geo(r) => r.diagonal(),
        }
    }

    /// Minimum-size stop test used by the partitioner
    ///
    /// Boxes compare their volume against `min_size³`, so a flat box is
    /// always below size. Rectangles compare their shorter side against
    /// `min_size`.
    pub fn is_below_size(&self, min_size: f64) -> bool {
        match self {
            Bounds::Aabb(b) => (b.volume() as f64) < min_size.powi(3),
            Bounds::Geo(r) => r.width().min(r.height()) < min_size,
        }
    }
}

impl From<Aabb> for Bounds {
    fn from(value: Aabb) -> Self {
        Bounds::Aabb(value)
    }
}

impl From<GeoRect> for Bounds {
    fn from(value: GeoRect) -> Self {
        Bounds::Geo(value)
    }
}
