//! Simplification strategies: how many triangles per level, when to split, how much error

use serde::{Deserialize, Serialize};

use crate::math::Bounds;
use crate::mesh::Mesh;

/// Relative deviation handed to the edge-collapse kernel
pub const DEFAULT_TARGET_ERROR: f32 = 0.01;

/// Decides LOD budgets and errors for the builder
pub trait SimplificationStrategy: Send + Sync {
    /// Triangle budget for a node at `level` built from `mesh`
    fn target_triangle_count(&self, mesh: &Mesh, level: u32) -> usize;

    /// Whether a node holding `mesh` within `bounds` at `level` gets children
    fn should_subdivide(&self, mesh: &Mesh, bounds: &Bounds, level: u32) -> bool;

    /// Error introduced by replacing `original` with `simplified`
    fn geometric_error(&self, original: &Mesh, simplified: &Mesh) -> f64;

    fn target_error(&self) -> f32 {
        DEFAULT_TARGET_ERROR
    }

    fn name(&self) -> &'static str;
}

/// Halve (by `ratio`) the triangle count per level
#[derive(Clone, Debug)]
pub struct TriangleCountStrategy {
    pub max_triangles_per_tile: usize,
    pub reduction_ratio: f64,
}

impl Default for TriangleCountStrategy {
    fn default() -> Self {
        Self {
            max_triangles_per_tile: 50_000,
            reduction_ratio: 0.5,
        }
    }
}

impl SimplificationStrategy for TriangleCountStrategy {
    fn target_triangle_count(&self, mesh: &Mesh, level: u32) -> usize {
        let scaled = mesh.triangle_count() as f64 * self.reduction_ratio.powi(level as i32);
        (scaled.floor() as usize).max(100)
    }

    fn should_subdivide(&self, mesh: &Mesh, _bounds: &Bounds, level: u32) -> bool {
        mesh.triangle_count() > self.max_triangles_per_tile && level < 8
    }

    fn geometric_error(&self, original: &Mesh, simplified: &Mesh) -> f64 {
        let n = original.triangle_count();
        if n == 0 {
            return 0.0;
        }
        (1.0 - simplified.triangle_count() as f64 / n as f64) * 100.0
    }

    fn name(&self) -> &'static str {
        "triangle_count"
    }
}

/// Error as the change in bounding size, scaled to screen pixels
#[derive(Clone, Debug)]
pub struct ScreenSpaceErrorStrategy {
    pub max_screen_space_error: f64,
}

impl Default for ScreenSpaceErrorStrategy {
    fn default() -> Self {
        Self { max_screen_space_error: 16.0 }
    }
}

impl ScreenSpaceErrorStrategy {
    /// Smallest box diagonal worth splitting
    pub const MIN_DIAGONAL: f64 = 1.0;
    /// Smallest rectangle diagonal worth splitting, in degrees
    pub const MIN_DIAGONAL_DEGREES: f64 = 0.01;
}

impl SimplificationStrategy for ScreenSpaceErrorStrategy {
    fn target_triangle_count(&self, mesh: &Mesh, level: u32) -> usize {
        let scaled = mesh.triangle_count() as f64 / 2f64.powi(level as i32);
        (scaled.floor() as usize).max(50)
    }

    fn should_subdivide(&self, _mesh: &Mesh, bounds: &Bounds, level: u32) -> bool {
        let threshold = match bounds {
            Bounds::Aabb(_) => Self::MIN_DIAGONAL,
            Bounds::Geo(_) => Self::MIN_DIAGONAL_DEGREES,
        };
        bounds.diagonal() > threshold && level < 10
    }

    fn geometric_error(&self, original: &Mesh, simplified: &Mesh) -> f64 {
        let (Some(a), Some(b)) = (original.bounds(), simplified.bounds()) else {
            return 0.0;
        };
        let delta = (a.size() - b.size()).abs().max_element() as f64;
        delta * self.max_screen_space_error
    }

    fn name(&self) -> &'static str {
        "screen_space_error"
    }
}

/// Split boxes until they fall under a volume; error as relative volume change
#[derive(Clone, Debug)]
pub struct VolumeThresholdStrategy {
    pub min_volume: f64,
    pub reduction_ratio: f64,
}

impl Default for VolumeThresholdStrategy {
    fn default() -> Self {
        Self {
            min_volume: 0.001,
            reduction_ratio: 0.5,
        }
    }
}

impl SimplificationStrategy for VolumeThresholdStrategy {
    fn target_triangle_count(&self, mesh: &Mesh, level: u32) -> usize {
        let scaled = mesh.triangle_count() as f64 * self.reduction_ratio.powi(level as i32);
        (scaled.floor() as usize).max(10)
    }

    fn should_subdivide(&self, _mesh: &Mesh, bounds: &Bounds, level: u32) -> bool {
        match bounds {
            Bounds::Aabb(b) => (b.volume() as f64) > self.min_volume && level < 8,
            Bounds::Geo(_) => false,
        }
    }

    fn geometric_error(&self, original: &Mesh, simplified: &Mesh) -> f64 {
        let volume = original.bounds().map_or(0.0, |b| b.volume() as f64);
        if volume == 0.0 {
            return 0.0;
        }
        let simplified_volume = simplified.bounds().map_or(0.0, |b| b.volume() as f64);
        (volume - simplified_volume).abs() / volume * 100.0
    }

    fn name(&self) -> &'static str {
        "volume_threshold"
    }
}

/// Serializable strategy selection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    TriangleCount {
        #[serde(default = "default_max_triangles")]
        max_triangles_per_tile: usize,
        #[serde(default = "default_ratio")]
        reduction_ratio: f64,
    },
    ScreenSpaceError {
        #[serde(default = "default_max_sse")]
        max_screen_space_error: f64,
    },
    VolumeThreshold {
        #[serde(default = "default_min_volume")]
        min_volume: f64,
        #[serde(default = "default_ratio")]
        reduction_ratio: f64,
    },
}

fn default_max_triangles() -> usize {
    50_000
}

fn default_ratio() -> f64 {
    0.5
}

fn default_max_sse() -> f64 {
    16.0
}

fn default_min_volume() -> f64 {
    0.001
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::TriangleCount {
            max_triangles_per_tile: default_max_triangles(),
            reduction_ratio: default_ratio(),
        }
    }
}

impl StrategyConfig {
    pub fn build(&self) -> Box<dyn SimplificationStrategy> {
        match *self {
            StrategyConfig::TriangleCount { max_triangles_per_tile, reduction_ratio } => {
                Box::new(TriangleCountStrategy { max_triangles_per_tile, reduction_ratio })
            }
            StrategyConfig::ScreenSpaceError { max_screen_space_error } => {
                Box::new(ScreenSpaceErrorStrategy { max_screen_space_error })
            }
            StrategyConfig::VolumeThreshold { min_volume, reduction_ratio } => {
                Box::new(VolumeThresholdStrategy { min_volume, reduction_ratio })
            }
        }
    }

    /// Per-tile triangle budget, if the strategy has one
    pub fn max_triangles_per_tile(&self) -> Option<usize> {
        match self {
            StrategyConfig::TriangleCount { max_triangles_per_tile, .. } => {
                Some(*max_triangles_per_tile)
            }
            _ => None,
        }
    }
}
