//! WGS84 ellipsoid conversions

use super::GeoPoint;
use crate::core::types::DVec3;

/// Semi-major axis in metres
pub const WGS84_A: f64 = 6_378_137.0;
/// Flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// First eccentricity squared, `2f - f²`
pub const WGS84_E2: f64 = 2.0 * WGS84_F - WGS84_F * WGS84_F;

/// Earth-centred earth-fixed coordinates of (lon, lat) in degrees and height in metres
pub fn wgs84_to_cartesian(lon: f64, lat: f64, height: f64) -> DVec3 {
    let lon = lon.to_radians();
    let lat = lat.to_radians();
    let sin_lat = lat.sin();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    DVec3::new(
        (n + height) * lat.cos() * lon.cos(),
        (n + height) * lat.cos() * lon.sin(),
        (n * (1.0 - WGS84_E2) + height) * sin_lat,
    )
}

/// Convert local east/north/up metres around `origin` to a geographic point
///
/// Uses the meridian and prime-vertical radii of curvature at the origin
/// latitude, accurate for the few-kilometre extent of a single scan.
pub fn local_to_geographic(origin: &GeoPoint, local: DVec3) -> GeoPoint {
    let lat0 = origin.lat.to_radians();
    let sin_lat = lat0.sin();
    let w = 1.0 - WGS84_E2 * sin_lat * sin_lat;
    let prime_vertical = WGS84_A / w.sqrt();
    let meridian = WGS84_A * (1.0 - WGS84_E2) / (w * w.sqrt());

    let cos_lat = lat0.cos().max(1e-12);
    GeoPoint {
        lon: origin.lon + (local.x / (prime_vertical * cos_lat)).to_degrees(),
        lat: origin.lat + (local.y / meridian).to_degrees(),
        alt: origin.alt + local.z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_semi_major_axis() {
        let p = wgs84_to_cartesian(0.0, 0.0, 0.0);
        assert!((p.x - 6_378_137.0).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
        assert!(p.z.abs() < 1e-6);
    }

    #[test]
    fn test_north_pole() {
        let p = wgs84_to_cartesian(0.0, 90.0, 0.0);
        // polar radius b = a (1 - f)
        let b = WGS84_A * (1.0 - WGS84_F);
        assert!(p.x.abs() < 1e-6);
        assert!((p.z - b).abs() < 1e-3);
    }

    #[test]
    fn test_height_adds_along_normal_at_equator() {
        let p = wgs84_to_cartesian(90.0, 0.0, 100.0);
        assert!(p.x.abs() < 1e-6);
        assert!((p.y - (WGS84_A + 100.0)).abs() < 1e-6);
    }

    #[test]
    fn test_local_offsets() {
        let origin = GeoPoint::new(116.0, 40.0, 50.0);
        let same = local_to_geographic(&origin, DVec3::ZERO);
        assert_eq!(same, origin);

        let east = local_to_geographic(&origin, DVec3::new(1000.0, 0.0, 2.0));
        assert!(east.lon > origin.lon);
        assert_eq!(east.lat, origin.lat);
        assert_eq!(east.alt, 52.0);

        let north = local_to_geographic(&origin, DVec3::new(0.0, 111_000.0, 0.0));
        assert!((north.lat - origin.lat - 1.0).abs() < 0.01);
    }
}
