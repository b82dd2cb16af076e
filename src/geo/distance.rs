//! Great-circle distances and approximate areas

use super::GeoPoint;
use crate::math::GeoRect;

/// Spherical earth radius used for distances, in metres
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Haversine distance between two points in metres (altitude ignored)
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS * c
}

/// East-west and north-south extent of a rectangle in metres
///
/// Longitude spans are scaled by the cosine of the mean latitude.
pub fn extent_meters(rect: &GeoRect) -> (f64, f64) {
    if rect.is_empty() {
        return (0.0, 0.0);
    }
    let mean_lat = rect.center_lat().to_radians();
    let width = rect.width().to_radians() * mean_lat.cos() * EARTH_RADIUS;
    let height = rect.height().to_radians() * EARTH_RADIUS;
    (width, height)
}

/// Approximate rectangle area in square metres; 0 for an empty rectangle
pub fn area_square_meters(rect: &GeoRect) -> f64 {
    let (w, h) = extent_meters(rect);
    w * h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let d = distance_meters(&GeoPoint::new(0.0, 0.0, 0.0), &GeoPoint::new(1.0, 0.0, 0.0));
        assert!((110_000.0..=112_000.0).contains(&d), "distance {}", d);
    }

    #[test]
    fn test_distance_symmetric_and_zero() {
        let a = GeoPoint::new(116.39, 39.91, 0.0);
        let b = GeoPoint::new(121.47, 31.23, 0.0);
        assert!((distance_meters(&a, &b) - distance_meters(&b, &a)).abs() < 1e-6);
        assert_eq!(distance_meters(&a, &a), 0.0);
    }

    #[test]
    fn test_area() {
        assert_eq!(area_square_meters(&GeoRect::new(0.0, 0.0, 0.0, 1.0)), 0.0);
        let one_degree = area_square_meters(&GeoRect::new(0.0, 0.0, 1.0, 1.0));
        // roughly 111 km x 111 km
        assert!(one_degree > 1.2e10 && one_degree < 1.3e10);
    }
}
