//! Geographic point

use serde::{Deserialize, Serialize};

use crate::math::GeoRect;

/// Longitude/latitude in degrees plus altitude in metres
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
    #[serde(default)]
    pub alt: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64, alt: f64) -> Self {
        Self { lon, lat, alt }
    }
}

/// Smallest rectangle holding every point, `None` for an empty slice
pub fn compute_bounds(points: &[GeoPoint]) -> Option<GeoRect> {
    GeoRect::from_lon_lat(points.iter().map(|p| (p.lon, p.lat)))
}
