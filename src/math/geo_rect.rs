//! Geographic rectangle in (longitude, latitude) degrees

use serde::{Deserialize, Serialize};

/// Quadrant order produced by [`GeoRect::subdivide`]
pub const QUADRANT_NAMES: [&str; 4] = ["SW", "SE", "NW", "NE"];

/// Axis-aligned rectangle in geographic coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoRect {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self { min_lon, min_lat, max_lon, max_lat }
    }

    /// Tight rectangle over (lon, lat) pairs, `None` if there are none
    pub fn from_lon_lat<I>(points: I) -> Option<GeoRect>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (lon, lat) = iter.next()?;
        let mut rect = GeoRect::new(lon, lat, lon, lat);
        for (lon, lat) in iter {
            rect.expand(lon, lat);
        }
        Some(rect)
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn center_lon(&self) -> f64 {
        (self.min_lon + self.max_lon) * 0.5
    }

    pub fn center_lat(&self) -> f64 {
        (self.min_lat + self.max_lat) * 0.5
    }

    /// Area in square degrees
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Diagonal length in degrees
    pub fn diagonal(&self) -> f64 {
        self.width().hypot(self.height())
    }

    /// True if width or height is not positive
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Closed containment test
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    pub fn contains_rect(&self, other: &GeoRect) -> bool {
        self.contains(other.min_lon, other.min_lat) && self.contains(other.max_lon, other.max_lat)
    }

    pub fn intersects(&self, other: &GeoRect) -> bool {
        !(other.min_lon > self.max_lon
            || other.max_lon < self.min_lon
            || other.min_lat > self.max_lat
            || other.max_lat < self.min_lat)
    }

    /// Overlap of two rectangles; empty if they are disjoint
    pub fn intersection(&self, other: &GeoRect) -> GeoRect {
        GeoRect {
            min_lon: self.min_lon.max(other.min_lon),
            min_lat: self.min_lat.max(other.min_lat),
            max_lon: self.max_lon.min(other.max_lon),
            max_lat: self.max_lat.min(other.max_lat),
        }
    }

    pub fn union(&self, other: &GeoRect) -> GeoRect {
        GeoRect {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    pub fn expand(&mut self, lon: f64, lat: f64) {
        self.min_lon = self.min_lon.min(lon);
        self.min_lat = self.min_lat.min(lat);
        self.max_lon = self.max_lon.max(lon);
        self.max_lat = self.max_lat.max(lat);
    }

    /// Quadrant rectangle; index bit 0 = east half, bit 1 = north half
    pub fn quadrant(&self, index: u8) -> GeoRect {
        let mid_lon = self.center_lon();
        let mid_lat = self.center_lat();
        let (lon0, lon1) = if index & 1 != 0 { (mid_lon, self.max_lon) } else { (self.min_lon, mid_lon) };
        let (lat0, lat1) = if index & 2 != 0 { (mid_lat, self.max_lat) } else { (self.min_lat, mid_lat) };
        GeoRect::new(lon0, lat0, lon1, lat1)
    }

    /// Four equal quadrants in order SW, SE, NW, NE
    pub fn subdivide(&self) -> [GeoRect; 4] {
        std::array::from_fn(|i| self.quadrant(i as u8))
    }

    /// Lowest-index quadrant whose closed rectangle holds the point
    pub fn quadrant_of(&self, lon: f64, lat: f64) -> u8 {
        let mut index = 0u8;
        if lon > self.center_lon() {
            index |= 1;
        }
        if lat > self.center_lat() {
            index |= 2;
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let rect = GeoRect::new(100.0, 30.0, 120.0, 50.0);
        assert_eq!(rect.width(), 20.0);
        assert_eq!(rect.height(), 20.0);
        assert_eq!(rect.center_lon(), 110.0);
        assert_eq!(rect.center_lat(), 40.0);
        assert!(!rect.is_empty());
        assert!(GeoRect::new(1.0, 1.0, 1.0, 2.0).is_empty());
    }

    #[test]
    fn test_subdivide_order() {
        let rect = GeoRect::new(100.0, 30.0, 120.0, 50.0);
        let [sw, se, nw, ne] = rect.subdivide();
        assert_eq!(sw, GeoRect::new(100.0, 30.0, 110.0, 40.0));
        assert_eq!(se, GeoRect::new(110.0, 30.0, 120.0, 40.0));
        assert_eq!(nw, GeoRect::new(100.0, 40.0, 110.0, 50.0));
        assert_eq!(ne, GeoRect::new(110.0, 40.0, 120.0, 50.0));
        assert_eq!(sw.union(&se).union(&nw).union(&ne), rect);
        assert!(sw.intersection(&ne).is_empty());
        assert!(sw.intersection(&se).is_empty());
    }

    #[test]
    fn test_contains_and_intersects() {
        let rect = GeoRect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(10.0, 0.0));
        assert!(!rect.contains(10.1, 5.0));
        assert!(rect.intersects(&GeoRect::new(10.0, 10.0, 11.0, 11.0)));
        assert!(!rect.intersects(&GeoRect::new(10.5, 0.0, 11.0, 1.0)));
        assert!(rect.contains_rect(&GeoRect::new(1.0, 1.0, 2.0, 2.0)));
    }

    #[test]
    fn test_quadrant_of_tie_break() {
        let rect = GeoRect::new(0.0, 0.0, 2.0, 2.0);
        assert_eq!(rect.quadrant_of(1.0, 1.0), 0);
        assert_eq!(rect.quadrant_of(1.5, 0.5), 1);
        assert_eq!(rect.quadrant_of(0.5, 1.5), 2);
        assert_eq!(rect.quadrant_of(1.5, 1.5), 3);
    }

    #[test]
    fn test_from_lon_lat() {
        assert!(GeoRect::from_lon_lat(std::iter::empty()).is_none());
        let rect = GeoRect::from_lon_lat([(116.3, 39.9), (116.5, 39.8)]).unwrap();
        assert_eq!(rect, GeoRect::new(116.3, 39.8, 116.5, 39.9));
    }
}
