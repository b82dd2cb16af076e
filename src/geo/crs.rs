//! Coordinate reference systems
//!
//! Only EPSG codes are modelled. Transformation between different systems
//! needs a projection library and is not available: the transformer maps a
//! system onto itself and reports `None` otherwise.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::GeoPoint;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::GeoRect;

/// Codes accepted by [`Crs::supported`]
pub const SUPPORTED_CRS: [u32; 8] = [4326, 3857, 4269, 4979, 32649, 32650, 2154, 25832];

/// EPSG codes of geographic (angular) systems
const GEOGRAPHIC_CODES: [u32; 3] = [4326, 4269, 4979];

/// Unit of a system's horizontal axes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrsUnit {
    Degree,
    Metre,
}

/// A coordinate reference system identified by its EPSG code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// WGS84 geographic, `EPSG:4326`
    pub const WGS84: Crs = Crs { epsg: 4326 };

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Parse `code` and check it against the allow-list
    pub fn supported(code: &str) -> Result<Crs> {
        let crs: Crs = code.parse()?;
        if SUPPORTED_CRS.contains(&crs.epsg) {
            Ok(crs)
        } else {
            Err(Error::Config(format!("unsupported CRS {}", crs)))
        }
    }

    pub fn is_geographic(&self) -> bool {
        GEOGRAPHIC_CODES.contains(&self.epsg)
    }

    pub fn is_projected(&self) -> bool {
        !self.is_geographic()
    }

    pub fn unit(&self) -> CrsUnit {
        if self.is_geographic() { CrsUnit::Degree } else { CrsUnit::Metre }
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::WGS84
    }
}

impl FromStr for Crs {
    type Err = Error;

    /// Accepts `EPSG:<positive integer>`
    fn from_str(s: &str) -> Result<Self> {
        let code = s
            .trim()
            .strip_prefix("EPSG:")
            .ok_or_else(|| Error::Config(format!("CRS '{}' is not of the form EPSG:<code>", s)))?;
        match code.parse::<u32>() {
            Ok(epsg) if epsg > 0 => Ok(Crs { epsg }),
            _ => Err(Error::Config(format!("invalid EPSG code in '{}'", s))),
        }
    }
}

impl TryFrom<String> for Crs {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Maps coordinates from a source to a target system
#[derive(Clone, Copy, Debug)]
pub struct CrsTransformer {
    source: Crs,
    target: Crs,
}

impl CrsTransformer {
    pub fn new(source: Crs, target: Crs) -> Self {
        Self { source, target }
    }

    /// True if points can be carried from source to target
    pub fn is_available(&self) -> bool {
        self.source == self.target
    }

    pub fn transform_point(&self, point: &GeoPoint) -> Option<GeoPoint> {
        self.is_available().then_some(*point)
    }

    pub fn transform_rect(&self, rect: &GeoRect) -> Option<GeoRect> {
        self.is_available().then_some(*rect)
    }

    /// Transform a batch, dropping points that cannot be carried over
    pub fn transform_points(&self, points: &[GeoPoint]) -> Vec<GeoPoint> {
        points.iter().filter_map(|p| self.transform_point(p)).collect()
    }
}
