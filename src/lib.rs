//! plylod - Level-of-detail trees for PLY meshes
//!
//! Loads one or more PLY files, partitions the merged mesh into an octree
//! (model space) or quadtree (lon/lat), simplifies every node and exports
//! the hierarchy as 3D Tiles or a scene-graph archive.

pub mod core;
pub mod math;
pub mod mesh;
pub mod geo;
pub mod partition;
pub mod simplify;
pub mod lod;
pub mod io;
pub mod export;
pub mod pipeline;
