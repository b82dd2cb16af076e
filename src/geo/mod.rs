//! Geographic helpers: points, distances, WGS84 and coordinate reference systems

pub mod point;
pub mod distance;
pub mod wgs84;
pub mod crs;

pub use point::{GeoPoint, compute_bounds};
pub use distance::{EARTH_RADIUS, area_square_meters, distance_meters, extent_meters};
pub use wgs84::{local_to_geographic, wgs84_to_cartesian};
pub use crs::{Crs, CrsTransformer, CrsUnit, SUPPORTED_CRS};
