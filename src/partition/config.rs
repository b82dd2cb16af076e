//! Partitioner configuration

use serde::{Deserialize, Serialize};

/// Capacity and depth limits for spatial partitioning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// A node holding at most this many triangles stays a leaf
    pub max_triangles_per_node: usize,
    /// Nodes at this depth are never split
    pub max_depth: u32,
    /// Boxes with volume below the cube of this are never split
    pub min_node_size: f64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_triangles_per_node: 1000,
            max_depth: 8,
            min_node_size: 0.001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PartitionConfig::default();
        assert_eq!(config.max_triangles_per_node, 1000);
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.min_node_size, 0.001);
    }

    #[test]
    fn test_partial_json_override() {
        let config: PartitionConfig = serde_json::from_str(r#"{"max_depth": 3}"#).unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.max_triangles_per_node, 1000);
    }
}
