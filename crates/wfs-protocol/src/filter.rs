//! The supported subset of OGC Filter Encoding 1.0.
//!
//! Accepted operators are `ogc:BBOX` (with a `gml:Box` or `gml:Envelope`),
//! `ogc:FeatureId`, and `ogc:And` over those. Anything else is rejected with
//! an `InvalidParameterValue` exception.

use wfs_common::{AreaFeature, AreaId, BoundingBox, WfsError, WfsResult};

use crate::gml;
use crate::xml::{self, XmlElement};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Feature envelope intersects the box, edges inclusive.
    BBox(BoundingBox),
    /// Feature id is one of the listed ids.
    FeatureIds(Vec<AreaId>),
    And(Vec<Filter>),
}

impl Filter {
    /// Parse an `ogc:Filter` element.
    pub fn from_xml(filter: &XmlElement) -> WfsResult<Self> {
        if filter.name != "Filter" {
            return Err(WfsError::UnsupportedFilter(format!(
                "expected ogc:Filter, found '{}'",
                filter.name
            )));
        }

        let feature_ids: Vec<&XmlElement> = filter
            .children
            .iter()
            .filter(|c| is_feature_id(c))
            .collect();

        match (filter.children.len(), feature_ids.len()) {
            (0, _) => Err(WfsError::UnsupportedFilter("empty filter".to_string())),
            (n, m) if n == m => Ok(Filter::FeatureIds(
                feature_ids
                    .into_iter()
                    .map(parse_feature_id)
                    .collect::<WfsResult<_>>()?,
            )),
            (1, 0) => Self::from_operator(&filter.children[0]),
            _ => Err(WfsError::UnsupportedFilter(
                "a filter holds either feature ids or a single operator".to_string(),
            )),
        }
    }

    /// Parse the XML-encoded `FILTER` KVP parameter.
    pub fn from_kvp(value: &str) -> WfsResult<Self> {
        let element = xml::parse(value).map_err(|e| match e {
            WfsError::MalformedXml(message) => WfsError::invalid_parameter("FILTER", message),
            other => other,
        })?;
        Self::from_xml(&element)
    }

    fn from_operator(operator: &XmlElement) -> WfsResult<Self> {
        match operator.name.as_str() {
            "BBOX" => {
                let geometry = operator
                    .children
                    .iter()
                    .find(|c| c.name == "Box" || c.name == "Envelope")
                    .ok_or_else(|| {
                        WfsError::UnsupportedFilter("BBOX without gml:Box or gml:Envelope".to_string())
                    })?;
                let bbox = gml::decode_box(geometry)
                    .map_err(|e| WfsError::invalid_parameter("FILTER", e.to_string()))?;
                Ok(Filter::BBox(bbox))
            }
            "FeatureId" | "GmlObjectId" => Ok(Filter::FeatureIds(vec![parse_feature_id(operator)?])),
            "And" => {
                if operator.children.is_empty() {
                    return Err(WfsError::UnsupportedFilter("empty ogc:And".to_string()));
                }
                let operands = operator
                    .children
                    .iter()
                    .map(Self::from_operator)
                    .collect::<WfsResult<Vec<_>>>()?;
                Ok(Filter::And(operands))
            }
            other => Err(WfsError::UnsupportedFilter(format!(
                "filter operator '{}' is not supported",
                other
            ))),
        }
    }

    /// Combine optional filters with `And`.
    pub fn all(mut filters: Vec<Filter>) -> Option<Filter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::And(filters)),
        }
    }

    pub fn matches(&self, feature: &AreaFeature) -> bool {
        match self {
            Filter::BBox(bbox) => feature
                .geometry
                .as_ref()
                .and_then(|g| g.envelope())
                .map(|envelope| bbox.intersects(&envelope))
                .unwrap_or(false),
            Filter::FeatureIds(ids) => feature.id.map(|id| ids.contains(&id)).unwrap_or(false),
            Filter::And(operands) => operands.iter().all(|f| f.matches(feature)),
        }
    }

    /// Ids the filter restricts the result to, if it does.
    pub fn feature_ids(&self) -> Option<&[AreaId]> {
        match self {
            Filter::FeatureIds(ids) => Some(ids),
            Filter::And(operands) => operands.iter().find_map(Filter::feature_ids),
            Filter::BBox(_) => None,
        }
    }

    /// A bounding box a backend may use to narrow its listing.
    pub fn bbox_hint(&self) -> Option<BoundingBox> {
        match self {
            Filter::BBox(bbox) => Some(*bbox),
            Filter::And(operands) => operands.iter().find_map(Filter::bbox_hint),
            Filter::FeatureIds(_) => None,
        }
    }
}

fn is_feature_id(element: &XmlElement) -> bool {
    element.name == "FeatureId" || element.name == "GmlObjectId"
}

fn parse_feature_id(element: &XmlElement) -> WfsResult<AreaId> {
    let fid = element
        .attr("fid")
        .or_else(|| element.attr("id"))
        .ok_or_else(|| WfsError::UnsupportedFilter("FeatureId without fid".to_string()))?;
    parse_fid(fid, "FILTER")
}

/// Parse a client feature id (`area.12` or `12`).
pub fn parse_fid(fid: &str, param: &str) -> WfsResult<AreaId> {
    AreaId::from_fid(fid)
        .ok_or_else(|| WfsError::invalid_parameter(param, format!("invalid feature id '{}'", fid)))
}
