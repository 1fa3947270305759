//! Coordinate Reference System handling.
//!
//! The service exposes exactly one reference system, WGS84 (EPSG:4326). Clients
//! spell it in several ways and the spelling decides the axis order of the
//! coordinates that follow, so parsing returns both.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier written into every outgoing `srsName` attribute.
pub const DEFAULT_SRS_NAME: &str = "EPSG:4326";

/// Reference systems supported by the WFS proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (degrees)
    Epsg4326,
}

impl CrsCode {
    /// Parse an `srsName` attribute value.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326" (x = longitude, y = latitude)
    /// - "http://www.opengis.net/gml/srs/epsg.xml#4326" (x = longitude, y = latitude)
    /// - "urn:ogc:def:crs:EPSG::4326" (latitude first, as the EPSG definition mandates)
    pub fn from_srs_name(s: &str) -> Result<(Self, AxisOrder), CrsParseError> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "HTTP://WWW.OPENGIS.NET/GML/SRS/EPSG.XML#4326" => {
                Ok((CrsCode::Epsg4326, AxisOrder::XY))
            }
            "URN:OGC:DEF:CRS:EPSG::4326"
            | "URN:OGC:DEF:CRS:EPSG:6.6:4326"
            | "URN:X-OGC:DEF:CRS:EPSG:4326"
            | "HTTP://WWW.OPENGIS.NET/DEF/CRS/EPSG/0/4326" => {
                Ok((CrsCode::Epsg4326, AxisOrder::LatLon))
            }
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Axis order used when no `srsName` is present.
    pub fn default_axis_order(&self) -> AxisOrder {
        AxisOrder::XY
    }

    /// Get the valid bounds for this CRS.
    pub fn valid_bounds(&self) -> crate::BoundingBox {
        match self {
            CrsCode::Epsg4326 => crate::BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => DEFAULT_SRS_NAME,
        };
        write!(f, "{}", code)
    }
}

/// Axis order for coordinate interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// X (longitude), Y (latitude)
    XY,
    /// Y (latitude), X (longitude)
    LatLon,
}

impl AxisOrder {
    /// Reorder a coordinate pair as read from the wire into (x, y).
    pub fn to_xy(&self, first: f64, second: f64) -> (f64, f64) {
        match self {
            AxisOrder::XY => (first, second),
            AxisOrder::LatLon => (second, first),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}
