//! Mathematical utilities and data structures

pub mod aabb;
pub mod geo_rect;
pub mod bounds;

pub use aabb::Aabb;
pub use geo_rect::GeoRect;
pub use bounds::Bounds;
