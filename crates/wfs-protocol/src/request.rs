//! Request parsing: KVP (GET) and XML (POST) encodings into [`WfsRequest`].

use wfs_common::{BoundingBox, WfsError, WfsResult};

use crate::filter::{parse_fid, Filter};
use crate::schema::SchemaRegistry;
use crate::transaction::TransactionRequest;
use crate::xml::{self, XmlElement, NS_WFS};

pub const WFS_VERSION: &str = "1.0.0";

/// A parsed, operation-tagged WFS request.
#[derive(Debug, Clone, PartialEq)]
pub enum WfsRequest {
    GetCapabilities,
    DescribeFeatureType(DescribeFeatureTypeRequest),
    GetFeature(GetFeatureRequest),
    Transaction(TransactionRequest),
}

impl WfsRequest {
    /// Operation name, used for logging and metrics labels.
    pub fn operation(&self) -> &'static str {
        match self {
            WfsRequest::GetCapabilities => "GetCapabilities",
            WfsRequest::DescribeFeatureType(_) => "DescribeFeatureType",
            WfsRequest::GetFeature(_) => "GetFeature",
            WfsRequest::Transaction(_) => "Transaction",
        }
    }
}

/// DescribeFeatureType request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeFeatureTypeRequest {
    pub type_names: Vec<String>,
}

/// GetFeature request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetFeatureRequest {
    /// Requested type names. Empty when only feature ids were given.
    pub type_names: Vec<String>,
    pub filter: Option<Filter>,
    pub max_features: Option<usize>,
}

/// KVP (Key-Value Pair) query string parameters for WFS.
///
/// Keys are case-insensitive; unknown keys are ignored.
#[derive(Debug, Clone, Default)]
pub struct WfsKvpParams {
    pub service: Option<String>,
    pub request: Option<String>,
    pub version: Option<String>,
    pub type_name: Option<String>,
    pub bbox: Option<String>,
    pub feature_id: Option<String>,
    pub max_features: Option<String>,
    pub filter: Option<String>,
    pub output_format: Option<String>,
}

impl WfsKvpParams {
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref().to_ascii_uppercase().as_str() {
                "SERVICE" => &mut params.service,
                "REQUEST" => &mut params.request,
                "VERSION" => &mut params.version,
                "TYPENAME" | "TYPENAMES" => &mut params.type_name,
                "BBOX" => &mut params.bbox,
                "FEATUREID" => &mut params.feature_id,
                "MAXFEATURES" => &mut params.max_features,
                "FILTER" => &mut params.filter,
                "OUTPUTFORMAT" => &mut params.output_format,
                _ => continue,
            };
            slot.get_or_insert(value.into());
        }
        params
    }

    /// Whether the query string carries any WFS parameter at all.
    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.request.is_none()
    }

    /// Parse into a typed request.
    pub fn into_request(self) -> WfsResult<WfsRequest> {
        match self.service.as_deref().map(str::trim) {
            Some(service) if service.eq_ignore_ascii_case("WFS") => {}
            Some(other) => return Err(WfsError::UnsupportedService(other.to_string())),
            None => return Err(WfsError::MissingParameter("SERVICE".to_string())),
        }
        check_version(self.version.as_deref())?;

        let request = self
            .request
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| WfsError::MissingParameter("REQUEST".to_string()))?;

        match operation_name(request) {
            Some("GetCapabilities") => Ok(WfsRequest::GetCapabilities),
            Some("DescribeFeatureType") => {
                Ok(WfsRequest::DescribeFeatureType(DescribeFeatureTypeRequest {
                    type_names: split_list(self.type_name.as_deref()),
                }))
            }
            Some("GetFeature") => self.into_get_feature().map(WfsRequest::GetFeature),
            Some("Transaction") => Err(WfsError::invalid_parameter(
                "REQUEST",
                "Transaction requires an XML POST body",
            )),
            _ => Err(WfsError::OperationNotSupported(request.to_string())),
        }
    }

    fn into_get_feature(self) -> WfsResult<GetFeatureRequest> {
        let type_names = split_list(self.type_name.as_deref());
        let feature_ids = split_list(self.feature_id.as_deref());
        if type_names.is_empty() && feature_ids.is_empty() {
            return Err(WfsError::MissingParameter("TYPENAME".to_string()));
        }

        let mut filters = Vec::new();
        if let Some(bbox) = self.bbox.as_deref() {
            let bbox = BoundingBox::from_kvp_string(bbox)
                .map_err(|e| WfsError::invalid_parameter("BBOX", e.to_string()))?;
            filters.push(Filter::BBox(bbox));
        }
        if !feature_ids.is_empty() {
            let ids = feature_ids
                .iter()
                .map(|fid| parse_fid(fid, "FEATUREID"))
                .collect::<WfsResult<Vec<_>>>()?;
            filters.push(Filter::FeatureIds(ids));
        }
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.trim().is_empty()) {
            filters.push(Filter::from_kvp(filter)?);
        }

        Ok(GetFeatureRequest {
            type_names,
            filter: Filter::all(filters),
            max_features: parse_max_features(self.max_features.as_deref())?,
        })
    }
}

/// Parse an XML POST body into a typed request.
pub fn parse_xml_request(body: &str, schemas: &SchemaRegistry) -> WfsResult<WfsRequest> {
    let root = xml::parse(body)?;

    if !root.in_namespace_or_default(NS_WFS) {
        return Err(WfsError::OperationNotSupported(format!(
            "{{{}}}{}",
            root.namespace.as_deref().unwrap_or_default(),
            root.name
        )));
    }

    match root.attr("service").map(str::trim) {
        Some(service) if service != "WFS" => {
            return Err(WfsError::UnsupportedService(service.to_string()))
        }
        _ => {}
    }

    let operation = operation_name(&root.name)
        .ok_or_else(|| WfsError::OperationNotSupported(root.name.clone()))?;

    // GetCapabilities carries no version, or a list of acceptable ones.
    if operation != "GetCapabilities" {
        check_version(root.attr("version"))?;
    }

    match operation {
        "GetCapabilities" => Ok(WfsRequest::GetCapabilities),
        "DescribeFeatureType" => Ok(WfsRequest::DescribeFeatureType(DescribeFeatureTypeRequest {
            type_names: root
                .children_named("TypeName")
                .map(|t| t.text().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        })),
        "GetFeature" => parse_xml_get_feature(&root).map(WfsRequest::GetFeature),
        "Transaction" => {
            TransactionRequest::from_xml(schemas.area(), &root).map(WfsRequest::Transaction)
        }
        _ => Err(WfsError::OperationNotSupported(root.name.clone())),
    }
}

fn parse_xml_get_feature(root: &XmlElement) -> WfsResult<GetFeatureRequest> {
    let mut type_names = Vec::new();
    let mut filters = Vec::new();

    for query in root.children_named("Query") {
        let type_name = query
            .attr("typeName")
            .ok_or_else(|| WfsError::MissingParameter("typeName".to_string()))?;
        type_names.extend(split_list(Some(type_name)));
        if let Some(filter) = query.child("Filter") {
            filters.push(Filter::from_xml(filter)?);
        }
    }

    if type_names.is_empty() {
        return Err(WfsError::MissingParameter("Query".to_string()));
    }

    Ok(GetFeatureRequest {
        type_names,
        filter: Filter::all(filters),
        max_features: parse_max_features(root.attr("maxFeatures"))?,
    })
}

/// Canonical operation name for a (case-insensitive) request value.
fn operation_name(request: &str) -> Option<&'static str> {
    ["GetCapabilities", "DescribeFeatureType", "GetFeature", "Transaction"]
        .into_iter()
        .find(|op| op.eq_ignore_ascii_case(request))
}

/// Absent VERSION means 1.0.0; anything else explicit must be 1.0.0.
fn check_version(version: Option<&str>) -> WfsResult<()> {
    match version.map(str::trim) {
        None | Some("") | Some(WFS_VERSION) => Ok(()),
        Some(other) => Err(WfsError::UnsupportedVersion(other.to_string())),
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_max_features(value: Option<&str>) -> WfsResult<Option<usize>> {
    value
        .map(|v| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| WfsError::invalid_parameter("MAXFEATURES", format!("'{}' is not a count", v)))
        })
        .transpose()
}
