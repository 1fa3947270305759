//! The area feature: the one record type exchanged with clients and the backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::geometry::{Geometry, GeometryError};

/// Prefix of the GML `fid` attribute of an area feature.
pub const FID_PREFIX: &str = "area.";

/// Backend-assigned identifier of an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(pub u64);

impl AreaId {
    /// GML feature id, e.g. `area.12`.
    pub fn to_fid(&self) -> String {
        format!("{}{}", FID_PREFIX, self.0)
    }

    /// Parse a client feature id, with or without the `area.` prefix.
    pub fn from_fid(fid: &str) -> Option<Self> {
        let fid = fid.trim();
        let bare = fid.strip_prefix(FID_PREFIX).unwrap_or(fid);
        bare.parse().ok()
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AreaId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(AreaId)
    }
}

/// An area as seen by WFS clients.
///
/// Features coming back from GetFeature always have an `id`; features parsed
/// from an Insert never do (a client-supplied fid is dropped).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaFeature {
    pub id: Option<AreaId>,
    pub name: String,
    pub area_type: String,
    pub description: String,
    pub geometry: Option<Geometry>,
}

impl AreaFeature {
    /// Build a client-facing feature from a backend record, decoding its WKT.
    pub fn try_from_record(record: AreaRecord) -> Result<Self, GeometryError> {
        let geometry = match record.geometry.as_deref().map(str::trim) {
            Some(wkt) if !wkt.is_empty() => Some(Geometry::from_wkt(wkt)?),
            _ => None,
        };

        Ok(Self {
            geometry,
            ..Self::from_record_attributes(record)
        })
    }

    /// Feature with the record's attributes only. The stored WKT is not
    /// decoded, so this never fails.
    pub fn from_record_attributes(record: AreaRecord) -> Self {
        Self {
            id: Some(record.id),
            name: record.name,
            area_type: record.area_type,
            description: record.description,
            geometry: None,
        }
    }
}

/// An area as stored by the backend, geometry in its native WKT form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRecord {
    pub id: AreaId,
    pub name: String,
    pub area_type: String,
    pub description: String,
    pub geometry: Option<String>,
}

impl AreaRecord {
    /// Record a feature would be stored as under `id`.
    pub fn from_feature(id: AreaId, feature: &AreaFeature) -> Self {
        Self {
            id,
            name: feature.name.clone(),
            area_type: feature.area_type.clone(),
            description: feature.description.clone(),
            geometry: feature.geometry.as_ref().map(Geometry::to_wkt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coord;

    #[test]
    fn test_fid_round_trip() {
        assert_eq!(AreaId(42).to_fid(), "area.42");
        assert_eq!(AreaId::from_fid("area.42"), Some(AreaId(42)));
        assert_eq!(AreaId::from_fid("42"), Some(AreaId(42)));
        assert_eq!(AreaId::from_fid(" area.7 "), Some(AreaId(7)));
        assert_eq!(AreaId::from_fid("field.42"), None);
        assert_eq!(AreaId::from_fid(""), None);
    }

    #[test]
    fn test_try_from_record() {
        let record = AreaRecord {
            id: AreaId(3),
            name: "Barn".to_string(),
            area_type: "building".to_string(),
            description: "<p>Red</p>".to_string(),
            geometry: Some("POINT (1.5 2.5)".to_string()),
        };
        let feature = AreaFeature::try_from_record(record).unwrap();
        assert_eq!(feature.id, Some(AreaId(3)));
        assert_eq!(feature.geometry, Some(Geometry::Point(Coord::new(1.5, 2.5))));
    }

    #[test]
    fn test_try_from_record_without_geometry() {
        let record = AreaRecord {
            id: AreaId(4),
            name: "Pasture".to_string(),
            area_type: "paddock".to_string(),
            description: String::new(),
            geometry: Some("  ".to_string()),
        };
        let feature = AreaFeature::try_from_record(record).unwrap();
        assert!(feature.geometry.is_none());
    }

    #[test]
    fn test_try_from_record_bad_geometry() {
        let record = AreaRecord {
            id: AreaId(5),
            name: "Broken".to_string(),
            area_type: String::new(),
            description: String::new(),
            geometry: Some("MULTIPOINT ((1 2), (3 4))".to_string()),
        };
        assert!(AreaFeature::try_from_record(record).is_err());
    }
}
