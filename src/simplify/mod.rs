//! Mesh simplification: edge-collapse kernel and LOD strategies

pub mod cluster;
pub mod kernel;
pub mod simplifier;
pub mod strategy;

pub use kernel::{simplify_indices, simplify_with_error};
pub use simplifier::simplify;
pub use strategy::{
    ScreenSpaceErrorStrategy, SimplificationStrategy, StrategyConfig, TriangleCountStrategy,
    VolumeThresholdStrategy, DEFAULT_TARGET_ERROR,
};
