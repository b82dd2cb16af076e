//! Spatial partitioning of meshes into octrees and quadtrees

pub mod config;
pub mod node;
pub mod builder;
pub mod stats;

pub use config::PartitionConfig;
pub use node::SpatialNode;
pub use builder::Partitioner;
pub use stats::PartitionStats;
