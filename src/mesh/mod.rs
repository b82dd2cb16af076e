//! Triangle mesh model and mesh-level operations

pub mod buffer;
pub mod model;
pub mod stats;
pub mod clip;

pub use buffer::VertexBuffer;
pub use model::Mesh;
pub use stats::MeshStats;
pub use clip::clip_to_rect;
