//! LOD hierarchy: nodes, configuration, construction and statistics

pub mod builder;
pub mod config;
pub mod node;
pub mod stats;

pub use builder::{root_extent, validate, LodBuilder};
pub use config::LodConfig;
pub use node::LodNode;
pub use stats::LodStats;
