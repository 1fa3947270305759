//! JSON shapes of the farmOS (Drupal RestWS) taxonomy term API.

use serde::Deserialize;
use serde_json::{json, Value};

use wfs_common::{AreaFeature, AreaId, AreaRecord, BackendError, Geometry};

/// Machine name of the vocabulary holding farm areas.
pub const AREA_VOCABULARY: &str = "farm_areas";

/// One page of a RestWS listing.
#[derive(Debug, Deserialize)]
pub struct EntityPage {
    #[serde(default)]
    pub list: Vec<Value>,
    /// URL of the last page, e.g. `.../taxonomy_term.json?bundle=farm_areas&page=3`.
    #[serde(default)]
    pub last: Option<String>,
}

impl EntityPage {
    /// Index of the last page, 0 when absent or unparseable.
    pub fn last_page(&self) -> u32 {
        self.last
            .as_deref()
            .and_then(|url| reqwest::Url::parse(url).ok())
            .and_then(|url| {
                url.query_pairs()
                    .find(|(key, _)| key == "page")
                    .and_then(|(_, value)| value.parse().ok())
            })
            .unwrap_or(0)
    }
}

/// Response of a create call.
#[derive(Debug, Deserialize)]
pub struct CreatedEntity {
    pub id: Value,
}

/// Parse an id RestWS sends either as `"12"` or `12`.
pub fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Text of a field RestWS sends either as a plain string or `{"value": ...}`.
fn text_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

/// Vocabulary id a term belongs to.
pub fn term_vocabulary(term: &Value) -> Option<u64> {
    match term.get("vocabulary") {
        Some(Value::Object(map)) => map.get("id").and_then(parse_id),
        Some(other) => parse_id(other),
        None => None,
    }
}

/// Map a taxonomy term to an area record.
pub fn term_to_record(term: &Value) -> Result<AreaRecord, BackendError> {
    let id = term
        .get("tid")
        .and_then(parse_id)
        .ok_or_else(|| BackendError::InvalidResponse("taxonomy term without tid".to_string()))?;

    let geometry = term
        .get("field_farm_geofield")
        .and_then(Value::as_array)
        .and_then(|values| values.first())
        .and_then(|value| value.get("geom"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|wkt| !wkt.trim().is_empty());

    Ok(AreaRecord {
        id: AreaId(id),
        name: text_value(term.get("name")),
        area_type: text_value(term.get("field_farm_area_type")),
        description: text_value(term.get("description")),
        geometry,
    })
}

/// JSON body of a create or update call.
pub fn feature_to_term(feature: &AreaFeature, vocabulary: Option<u64>) -> Value {
    let geofield = match &feature.geometry {
        Some(geometry) => json!([{ "geom": Geometry::to_wkt(geometry) }]),
        None => json!([]),
    };

    let mut term = json!({
        "name": feature.name,
        "description": feature.description,
        "field_farm_area_type": feature.area_type,
        "field_farm_geofield": geofield,
    });
    if let (Some(vid), Some(map)) = (vocabulary, term.as_object_mut()) {
        map.insert("vocabulary".to_string(), json!(vid));
    }
    term
}
