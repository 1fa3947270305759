//! Single-geometry model and the backend-native (WKT) codec.
//!
//! Areas carry at most one geometry: a point, a line string, or a polygon
//! (optionally with holes). Coordinates are always stored as x = longitude,
//! y = latitude in EPSG:4326, whatever axis order the wire format used.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;

use crate::bbox::BoundingBox;
use crate::crs::CrsCode;

/// Errors raised while decoding, encoding, or validating a geometry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    /// Geometry kind outside point / line string / polygon.
    #[error("Unsupported geometry: {0}")]
    Unsupported(String),

    /// Structurally broken geometry (bad numbers, unclosed rings, ...).
    #[error("Invalid geometry: {0}")]
    Invalid(String),

    #[error("Unsupported reference system: {0}")]
    UnsupportedCrs(String),

    #[error("Empty geometry")]
    Empty,
}

/// A position in EPSG:4326, x = longitude, y = latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    /// Name of the kind as used by both WKT and GML (`Point`, `LineString`, `Polygon`).
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
        }
    }
}

/// One geometry value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    Polygon {
        exterior: Vec<Coord>,
        interiors: Vec<Vec<Coord>>,
    },
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::Polygon { .. } => GeometryKind::Polygon,
        }
    }

    /// Reference system every geometry in this service is expressed in.
    pub fn crs(&self) -> CrsCode {
        CrsCode::Epsg4326
    }

    /// All positions of the geometry, exterior ring first.
    pub fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            Geometry::Point(c) => Box::new(std::iter::once(c)),
            Geometry::LineString(points) => Box::new(points.iter()),
            Geometry::Polygon {
                exterior,
                interiors,
            } => Box::new(exterior.iter().chain(interiors.iter().flatten())),
        }
    }

    /// Envelope of the geometry. Never `None` for a validated geometry.
    pub fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.coords().map(|c| (c.x, c.y)))
    }

    /// Check the structural rules a geometry must satisfy before it is
    /// handed to the backend or encoded for a client.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let bounds = self.crs().valid_bounds();
        for c in self.coords() {
            if !c.x.is_finite() || !c.y.is_finite() {
                return Err(GeometryError::Invalid(format!(
                    "non-finite coordinate ({}, {})",
                    c.x, c.y
                )));
            }
            if !bounds.contains_point(c.x, c.y) {
                return Err(GeometryError::Invalid(format!(
                    "coordinate ({}, {}) outside EPSG:4326 bounds",
                    c.x, c.y
                )));
            }
        }

        match self {
            Geometry::Point(_) => Ok(()),
            Geometry::LineString(points) => {
                if points.len() < 2 {
                    return Err(GeometryError::Invalid(
                        "LineString must have at least 2 positions".to_string(),
                    ));
                }
                Ok(())
            }
            Geometry::Polygon {
                exterior,
                interiors,
            } => {
                validate_ring(exterior)?;
                interiors.iter().try_for_each(|ring| validate_ring(ring))
            }
        }
    }

    /// Parse the backend-native WKT form.
    ///
    /// Accepts `POINT`, `LINESTRING` and `POLYGON`, with an optional `Z`, `M`
    /// or `ZM` tag (extra ordinates are dropped) and an optional `SRID=4326;`
    /// prefix.
    pub fn from_wkt(wkt: &str) -> Result<Self, GeometryError> {
        let mut wkt = wkt.trim();
        if wkt.is_empty() {
            return Err(GeometryError::Empty);
        }

        if let Some((prefix, rest)) = wkt.split_once(';') {
            let srid = prefix.trim().to_uppercase();
            if srid != "SRID=4326" {
                return Err(GeometryError::UnsupportedCrs(prefix.trim().to_string()));
            }
            wkt = rest.trim();
        }

        let tag_end = wkt.find('(').unwrap_or(wkt.len());
        let tag = wkt[..tag_end].trim().to_uppercase();
        let body = wkt[tag_end..].trim();

        let mut tag_parts = tag.split_whitespace();
        let kind = tag_parts.next().unwrap_or_default().to_string();
        let modifier = tag_parts.next();
        if !matches!(modifier, None | Some("Z") | Some("M") | Some("ZM"))
            || tag_parts.next().is_some()
        {
            if tag.ends_with("EMPTY") {
                return Err(GeometryError::Empty);
            }
            return Err(GeometryError::Invalid(format!("unexpected WKT tag '{}'", tag)));
        }
        if body.is_empty() {
            return Err(GeometryError::Invalid(format!("missing coordinates for {}", kind)));
        }

        let geometry = match kind.as_str() {
            "POINT" => {
                let points = parse_position_list(strip_parens(body)?)?;
                match points.as_slice() {
                    [single] => Geometry::Point(*single),
                    _ => {
                        return Err(GeometryError::Invalid(
                            "POINT must have exactly one position".to_string(),
                        ))
                    }
                }
            }
            "LINESTRING" => Geometry::LineString(parse_position_list(strip_parens(body)?)?),
            "POLYGON" => {
                let mut rings = split_groups(strip_parens(body)?)?
                    .into_iter()
                    .map(|ring| parse_position_list(ring))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter();
                let exterior = rings.next().ok_or(GeometryError::Empty)?;
                Geometry::Polygon {
                    exterior,
                    interiors: rings.collect(),
                }
            }
            "MULTIPOINT" | "MULTILINESTRING" | "MULTIPOLYGON" | "GEOMETRYCOLLECTION" => {
                return Err(GeometryError::Unsupported(kind))
            }
            other => return Err(GeometryError::Unsupported(other.to_string())),
        };

        geometry.validate()?;
        Ok(geometry)
    }

    /// Serialize to WKT, e.g. `POLYGON ((0 0, 1 0, 1 1, 0 0))`.
    pub fn to_wkt(&self) -> String {
        let mut out = String::new();
        match self {
            Geometry::Point(c) => {
                let _ = write!(out, "POINT ({} {})", c.x, c.y);
            }
            Geometry::LineString(points) => {
                out.push_str("LINESTRING ");
                write_wkt_ring(&mut out, points);
            }
            Geometry::Polygon {
                exterior,
                interiors,
            } => {
                out.push_str("POLYGON (");
                write_wkt_ring(&mut out, exterior);
                for ring in interiors {
                    out.push_str(", ");
                    write_wkt_ring(&mut out, ring);
                }
                out.push(')');
            }
        }
        out
    }
}

fn validate_ring(ring: &[Coord]) -> Result<(), GeometryError> {
    if ring.len() < 4 {
        return Err(GeometryError::Invalid(
            "Polygon ring must have at least 4 positions (including closing position)".to_string(),
        ));
    }
    if ring.first() != ring.last() {
        return Err(GeometryError::Invalid("Polygon ring is not closed".to_string()));
    }
    Ok(())
}

fn write_wkt_ring(out: &mut String, points: &[Coord]) {
    out.push('(');
    for (i, c) in points.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{} {}", c.x, c.y);
    }
    out.push(')');
}

/// Remove one pair of enclosing parentheses.
fn strip_parens(s: &str) -> Result<&str, GeometryError> {
    let s = s.trim();
    s.strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .map(str::trim)
        .ok_or_else(|| GeometryError::Invalid(format!("unbalanced parentheses in '{}'", s)))
}

/// Split `(a), (b), (c)` into the inner text of each group.
fn split_groups(s: &str) -> Result<Vec<&str>, GeometryError> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, ch) in s.char_indices() {
        match ch {
            '(' => {
                if depth == 0 {
                    start = Some(i + 1);
                }
                depth += 1;
            }
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| GeometryError::Invalid("unbalanced parentheses".to_string()))?;
                if depth == 0 {
                    if let Some(begin) = start.take() {
                        groups.push(s[begin..i].trim());
                    }
                }
            }
            ',' if depth == 0 => {}
            c if depth == 0 && !c.is_whitespace() => {
                return Err(GeometryError::Invalid(format!(
                    "unexpected '{}' between rings",
                    c
                )));
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(GeometryError::Invalid("unbalanced parentheses".to_string()));
    }
    if groups.is_empty() {
        return Err(GeometryError::Empty);
    }
    Ok(groups)
}

/// Parse `x y[ z[ m]], x y, ...` into positions.
fn parse_position_list(s: &str) -> Result<Vec<Coord>, GeometryError> {
    if s.trim().is_empty() {
        return Err(GeometryError::Empty);
    }

    s.split(',')
        .map(|pair| {
            let parts: Vec<&str> = pair.split_whitespace().collect();
            if parts.len() < 2 || parts.len() > 4 {
                return Err(GeometryError::Invalid(format!(
                    "expected 'x y' position, got '{}'",
                    pair.trim()
                )));
            }
            let x = parse_ordinate(parts[0])?;
            let y = parse_ordinate(parts[1])?;
            Ok(Coord::new(x, y))
        })
        .collect()
}

pub(crate) fn parse_ordinate(s: &str) -> Result<f64, GeometryError> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GeometryError::Invalid(format!("invalid coordinate value '{}'", s)))
}
