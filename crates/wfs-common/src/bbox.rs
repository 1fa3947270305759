//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A bounding box in EPSG:4326 (x = longitude, y = latitude), in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parse a WFS BBOX parameter string: "minx,miny,maxx,maxy"
    pub fn from_kvp_string(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let parse = |part: &str| {
            part.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| BboxParseError::InvalidNumber(part.to_string()))
        };

        let bbox = Self {
            min_x: parse(parts[0])?,
            min_y: parse(parts[1])?,
            max_x: parse(parts[2])?,
            max_y: parse(parts[3])?,
        };

        if bbox.min_x > bbox.max_x || bbox.min_y > bbox.max_y {
            return Err(BboxParseError::Inverted(s.to_string()));
        }

        Ok(bbox)
    }

    /// Smallest box containing all the given points, `None` for no points.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points.into_iter().fold(None, |acc, (x, y)| {
            let point = BoundingBox::new(x, y, x, y);
            Some(match acc {
                Some(bbox) => bbox.union(&point),
                None => point,
            })
        })
    }

    /// Check if this bbox intersects another. Touching edges count.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),

    #[error("Invalid BBOX: {0}. Minimum corner exceeds maximum corner")]
    Inverted(String),
}
