//! WFS Transaction: parsing of Insert / Update / Delete actions and the
//! `WFS_TransactionResponse` document.

use std::fmt;

use wfs_common::{AreaFeature, AreaId, Geometry, WfsError, WfsResult};

use crate::feature::decode_feature;
use crate::filter::parse_fid;
use crate::gml;
use crate::schema::{FeatureTypeSchema, GEOMETRY_PROPERTY};
use crate::xml::{escape, XmlElement};

/// Kind of a transaction sub-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Insert,
    Update,
    Delete,
    /// An element that is not a supported action (e.g. `wfs:Native`).
    Unknown,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Insert => "Insert",
            ActionKind::Update => "Update",
            ActionKind::Delete => "Delete",
            ActionKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// New value of one property in an Update.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    /// `None` clears the geometry.
    Geometry(Option<Geometry>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyUpdate {
    /// Local property name, e.g. `name` for `ms:name`.
    pub name: String,
    pub value: PropertyValue,
}

impl PropertyUpdate {
    /// Whether this update sets (or clears) the geometry.
    pub fn replaces_geometry(&self) -> bool {
        self.name == GEOMETRY_PROPERTY && matches!(self.value, PropertyValue::Geometry(_))
    }

    /// Apply the new value to a feature. Returns false for a property the
    /// feature type does not have.
    pub fn apply(&self, feature: &mut AreaFeature) -> bool {
        match (self.name.as_str(), &self.value) {
            (GEOMETRY_PROPERTY, PropertyValue::Geometry(geometry)) => {
                feature.geometry = geometry.clone();
            }
            ("name", PropertyValue::Text(text)) => feature.name = text.clone(),
            ("areaType", PropertyValue::Text(text)) => feature.area_type = text.clone(),
            ("description", PropertyValue::Text(text)) => feature.description = text.clone(),
            _ => return false,
        }
        true
    }
}

/// One sub-operation, in request order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAction {
    Insert {
        handle: Option<String>,
        feature: AreaFeature,
    },
    Update {
        handle: Option<String>,
        id: AreaId,
        properties: Vec<PropertyUpdate>,
    },
    Delete {
        handle: Option<String>,
        id: AreaId,
    },
    /// A sub-operation that could not be parsed; reported as a failure at
    /// its position without aborting the rest of the batch.
    Rejected {
        handle: Option<String>,
        kind: ActionKind,
        reason: String,
    },
}

impl TransactionAction {
    pub fn handle(&self) -> Option<&str> {
        match self {
            TransactionAction::Insert { handle, .. }
            | TransactionAction::Update { handle, .. }
            | TransactionAction::Delete { handle, .. }
            | TransactionAction::Rejected { handle, .. } => handle.as_deref(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            TransactionAction::Insert { .. } => ActionKind::Insert,
            TransactionAction::Update { .. } => ActionKind::Update,
            TransactionAction::Delete { .. } => ActionKind::Delete,
            TransactionAction::Rejected { kind, .. } => *kind,
        }
    }
}

/// A parsed `wfs:Transaction`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionRequest {
    pub handle: Option<String>,
    pub actions: Vec<TransactionAction>,
}

impl TransactionRequest {
    /// Parse the children of a `wfs:Transaction` root element.
    ///
    /// Only document-level problems are errors; a broken action becomes a
    /// [`TransactionAction::Rejected`] entry.
    pub fn from_xml(schema: &FeatureTypeSchema, root: &XmlElement) -> WfsResult<Self> {
        if root.name != "Transaction" {
            return Err(WfsError::MalformedXml(format!(
                "expected wfs:Transaction, found '{}'",
                root.name
            )));
        }

        let mut actions = Vec::new();
        for element in &root.children {
            let handle = element.attr("handle").map(str::to_string);
            match element.name.as_str() {
                "Insert" => parse_insert(schema, element, handle, &mut actions),
                "Update" => parse_update(schema, element, handle, &mut actions),
                "Delete" => parse_delete(schema, element, handle, &mut actions),
                "LockId" => {}
                other => actions.push(TransactionAction::Rejected {
                    handle,
                    kind: ActionKind::Unknown,
                    reason: format!("unsupported transaction action '{}'", other),
                }),
            }
        }

        Ok(Self {
            handle: root.attr("handle").map(str::to_string),
            actions,
        })
    }
}

fn parse_insert(
    schema: &FeatureTypeSchema,
    element: &XmlElement,
    handle: Option<String>,
    actions: &mut Vec<TransactionAction>,
) {
    if element.children.is_empty() {
        actions.push(TransactionAction::Rejected {
            handle,
            kind: ActionKind::Insert,
            reason: "Insert without a feature".to_string(),
        });
        return;
    }

    for feature in &element.children {
        let action = match decode_feature(schema, feature) {
            Ok(feature) => TransactionAction::Insert {
                handle: handle.clone(),
                feature,
            },
            Err(err) => TransactionAction::Rejected {
                handle: handle.clone(),
                kind: ActionKind::Insert,
                reason: err.to_string(),
            },
        };
        actions.push(action);
    }
}

fn parse_update(
    schema: &FeatureTypeSchema,
    element: &XmlElement,
    handle: Option<String>,
    actions: &mut Vec<TransactionAction>,
) {
    let parsed = check_type_name(schema, element)
        .and_then(|_| parse_properties(element))
        .and_then(|properties| Ok((properties, target_ids(element)?)));

    match parsed {
        Ok((properties, ids)) => actions.extend(ids.into_iter().map(|id| TransactionAction::Update {
            handle: handle.clone(),
            id,
            properties: properties.clone(),
        })),
        Err(err) => actions.push(TransactionAction::Rejected {
            handle,
            kind: ActionKind::Update,
            reason: err.to_string(),
        }),
    }
}

fn parse_delete(
    schema: &FeatureTypeSchema,
    element: &XmlElement,
    handle: Option<String>,
    actions: &mut Vec<TransactionAction>,
) {
    match check_type_name(schema, element).and_then(|_| target_ids(element)) {
        Ok(ids) => actions.extend(ids.into_iter().map(|id| TransactionAction::Delete {
            handle: handle.clone(),
            id,
        })),
        Err(err) => actions.push(TransactionAction::Rejected {
            handle,
            kind: ActionKind::Delete,
            reason: err.to_string(),
        }),
    }
}

fn check_type_name(schema: &FeatureTypeSchema, element: &XmlElement) -> WfsResult<()> {
    match element.attr("typeName") {
        Some(name) if schema.matches(name) => Ok(()),
        Some(name) => Err(WfsError::invalid_parameter(
            "typeName",
            format!("unknown feature type '{}'", name),
        )),
        None => Err(WfsError::MissingParameter("typeName".to_string())),
    }
}

/// Ids named by the `ogc:Filter` of an Update or Delete. Only FeatureId
/// filters can address records here.
fn target_ids(element: &XmlElement) -> WfsResult<Vec<AreaId>> {
    let filter = element
        .child("Filter")
        .ok_or_else(|| WfsError::MissingParameter("Filter".to_string()))?;

    if filter.children.is_empty() {
        return Err(WfsError::UnsupportedFilter("empty filter".to_string()));
    }

    filter
        .children
        .iter()
        .map(|child| match child.name.as_str() {
            "FeatureId" | "GmlObjectId" => {
                let fid = child
                    .attr("fid")
                    .or_else(|| child.attr("id"))
                    .ok_or_else(|| WfsError::UnsupportedFilter("FeatureId without fid".to_string()))?;
                parse_fid(fid, "FILTER")
            }
            other => Err(WfsError::UnsupportedFilter(format!(
                "only FeatureId filters are supported in transactions, found '{}'",
                other
            ))),
        })
        .collect()
}

fn parse_properties(element: &XmlElement) -> WfsResult<Vec<PropertyUpdate>> {
    element
        .children_named("Property")
        .map(|property| {
            let name = property
                .child("Name")
                .map(|n| n.text())
                .filter(|n| !n.is_empty())
                .ok_or_else(|| WfsError::MissingParameter("Property/Name".to_string()))?;
            let local = name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name).to_string();

            let value = if local == GEOMETRY_PROPERTY {
                match property.child("Value") {
                    Some(value) => PropertyValue::Geometry(gml::decode_geometry_property(value)?),
                    None => PropertyValue::Geometry(None),
                }
            } else {
                // Descriptions are free text and keep their whitespace and markup.
                let text = property.child("Value").map(|v| {
                    if local == "description" {
                        v.content()
                    } else {
                        v.text()
                    }
                });
                PropertyValue::Text(text.unwrap_or_default().to_string())
            };

            Ok(PropertyUpdate { name: local, value })
        })
        .collect()
}

/// Result of one executed sub-operation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    /// Zero-based position in the request.
    pub position: usize,
    pub handle: Option<String>,
    pub kind: ActionKind,
    /// Affected id (assigned id for inserts), or the failure reason.
    pub result: Result<AreaId, String>,
}

impl TransactionOutcome {
    /// Handle of the sub-operation, or `Kind #n` when the client gave none.
    pub fn locator(&self) -> String {
        match &self.handle {
            Some(handle) => handle.clone(),
            None => format!("{} #{}", self.kind, self.position + 1),
        }
    }
}

/// Aggregated outcomes, encoded as `wfs:WFS_TransactionResponse`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionResponse {
    pub handle: Option<String>,
    pub outcomes: Vec<TransactionOutcome>,
}

impl TransactionResponse {
    /// True only when every sub-operation succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TransactionOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Ids assigned by successful inserts, in request order.
    pub fn inserted_ids(&self) -> Vec<AreaId> {
        self.outcomes
            .iter()
            .filter(|o| o.kind == ActionKind::Insert)
            .filter_map(|o| o.result.as_ref().ok().copied())
            .collect()
    }

    pub fn encode(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:WFS_TransactionResponse version="1.0.0"
    xmlns:wfs="http://www.opengis.net/wfs"
    xmlns:ogc="http://www.opengis.net/ogc">
"#,
        );

        for outcome in &self.outcomes {
            if let (ActionKind::Insert, Ok(id)) = (outcome.kind, &outcome.result) {
                xml.push_str(&format!(
                    "  <wfs:InsertResult{}><ogc:FeatureId fid=\"{}\"/></wfs:InsertResult>\n",
                    handle_attr(outcome.handle.as_deref()),
                    id.to_fid()
                ));
            }
        }

        let status = if self.is_success() { "SUCCESS" } else { "FAILED" };
        xml.push_str(&format!(
            "  <wfs:TransactionResult{}>\n    <wfs:Status><wfs:{}/></wfs:Status>\n",
            handle_attr(self.handle.as_deref()),
            status
        ));

        if let Some(first) = self.failures().next() {
            xml.push_str(&format!(
                "    <wfs:Locator>{}</wfs:Locator>\n",
                escape(&first.locator())
            ));
        }
        for failure in self.failures() {
            if let Err(reason) = &failure.result {
                xml.push_str(&format!(
                    "    <wfs:Message>{}</wfs:Message>\n",
                    escape(&format!("{}: {}", failure.locator(), reason))
                ));
            }
        }

        xml.push_str("  </wfs:TransactionResult>\n</wfs:WFS_TransactionResponse>\n");
        xml
    }
}

fn handle_attr(handle: Option<&str>) -> String {
    handle
        .map(|h| format!(r#" handle="{}""#, escape(h)))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;
    use wfs_common::Coord;

    const NS: &str = r#"xmlns:wfs="http://www.opengis.net/wfs" xmlns:ogc="http://www.opengis.net/ogc" xmlns:gml="http://www.opengis.net/gml" xmlns:ms="http://mapserver.gis.umn.edu/mapserver""#;

    fn parse(body: &str) -> TransactionRequest {
        let doc = format!(
            r#"<wfs:Transaction {} service="WFS" version="1.0.0">{}</wfs:Transaction>"#,
            NS, body
        );
        TransactionRequest::from_xml(&FeatureTypeSchema::area(), &xml::parse(&doc).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_actions_in_order() {
        let request = parse(
            r#"<wfs:Insert handle="ins"><ms:area><ms:name>A</ms:name></ms:area><ms:area><ms:name>B</ms:name></ms:area></wfs:Insert>
<wfs:Update typeName="ms:area" handle="upd">
  <wfs:Property><wfs:Name>ms:name</wfs:Name><wfs:Value>Renamed</wfs:Value></wfs:Property>
  <wfs:Property><wfs:Name>geometry</wfs:Name><wfs:Value><gml:Point><gml:coordinates>1,2</gml:coordinates></gml:Point></wfs:Value></wfs:Property>
  <ogc:Filter><ogc:FeatureId fid="area.4"/><ogc:FeatureId fid="5"/></ogc:Filter>
</wfs:Update>
<wfs:Delete typeName="area"><ogc:Filter><ogc:FeatureId fid="area.9"/></ogc:Filter></wfs:Delete>"#,
        );

        let kinds: Vec<ActionKind> = request.actions.iter().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            [
                ActionKind::Insert,
                ActionKind::Insert,
                ActionKind::Update,
                ActionKind::Update,
                ActionKind::Delete
            ]
        );
        assert_eq!(request.actions[1].handle(), Some("ins"));

        match &request.actions[3] {
            TransactionAction::Update { id, properties, .. } => {
                assert_eq!(*id, AreaId(5));
                assert_eq!(properties[0].name, "name");
                assert_eq!(
                    properties[1].value,
                    PropertyValue::Geometry(Some(Geometry::Point(Coord::new(1.0, 2.0))))
                );
            }
            other => panic!("expected update, got {:?}", other),
        }
        assert_eq!(
            request.actions[4],
            TransactionAction::Delete {
                handle: None,
                id: AreaId(9)
            }
        );
    }

    #[test]
    fn test_broken_actions_are_rejected_in_place() {
        let request = parse(
            r#"<wfs:Delete typeName="ms:area"><ogc:Filter><ogc:BBOX/></ogc:Filter></wfs:Delete>
<wfs:Insert><ms:area><ms:name>Ok</ms:name><ms:geometry><gml:MultiPoint/></ms:geometry></ms:area></wfs:Insert>
<wfs:Native vendorId="x" safeToIgnore="true"/>
<wfs:Delete typeName="ms:roads"><ogc:Filter><ogc:FeatureId fid="1"/></ogc:Filter></wfs:Delete>"#,
        );
        assert_eq!(request.actions.len(), 4);
        assert!(request
            .actions
            .iter()
            .all(|a| matches!(a, TransactionAction::Rejected { .. })));
        assert_eq!(request.actions[2].kind(), ActionKind::Unknown);
    }

    #[test]
    fn test_update_description_keeps_markup() {
        let request = parse(
            r#"<wfs:Update typeName="ms:area">
  <wfs:Property><wfs:Name>ms:name</wfs:Name><wfs:Value> Orchard </wfs:Value></wfs:Property>
  <wfs:Property><wfs:Name>ms:description</wfs:Name><wfs:Value> Apples &amp; <b>pears</b></wfs:Value></wfs:Property>
  <ogc:Filter><ogc:FeatureId fid="area.2"/></ogc:Filter>
</wfs:Update>"#,
        );

        match &request.actions[0] {
            TransactionAction::Update { properties, .. } => {
                assert_eq!(properties[0].value, PropertyValue::Text("Orchard".to_string()));
                assert_eq!(
                    properties[1].value,
                    PropertyValue::Text(" Apples &amp; <b>pears</b>".to_string())
                );
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_property_update_apply() {
        let mut feature = AreaFeature {
            name: "Old".to_string(),
            geometry: Some(Geometry::Point(Coord::new(1.0, 1.0))),
            ..Default::default()
        };
        assert!(PropertyUpdate {
            name: "geometry".to_string(),
            value: PropertyValue::Geometry(None),
        }
        .apply(&mut feature));
        assert!(feature.geometry.is_none());
        assert!(!PropertyUpdate {
            name: "colour".to_string(),
            value: PropertyValue::Text("red".to_string()),
        }
        .apply(&mut feature));
        assert_eq!(feature.name, "Old");
    }

    #[test]
    fn test_encode_response() {
        let response = TransactionResponse {
            handle: Some("batch".to_string()),
            outcomes: vec![
                TransactionOutcome {
                    position: 0,
                    handle: Some("new".to_string()),
                    kind: ActionKind::Insert,
                    result: Ok(AreaId(12)),
                },
                TransactionOutcome {
                    position: 1,
                    handle: None,
                    kind: ActionKind::Delete,
                    result: Err("Area 99999 not found".to_string()),
                },
            ],
        };
        assert!(!response.is_success());
        assert_eq!(response.inserted_ids(), vec![AreaId(12)]);

        let root = xml::parse(&response.encode()).unwrap();
        let insert = root.child("InsertResult").unwrap();
        assert_eq!(insert.attr("handle"), Some("new"));
        assert_eq!(insert.child("FeatureId").unwrap().attr("fid"), Some("area.12"));

        let result = root.child("TransactionResult").unwrap();
        assert_eq!(result.attr("handle"), Some("batch"));
        assert!(result.child("Status").unwrap().child("FAILED").is_some());
        assert_eq!(result.child("Locator").unwrap().text(), "Delete #2");
        let messages: Vec<_> = result.children_named("Message").collect();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].text().contains("99999"));
    }

    #[test]
    fn test_encode_success() {
        let response = TransactionResponse::default();
        assert!(response.is_success());
        let root = xml::parse(&response.encode()).unwrap();
        let result = root.child("TransactionResult").unwrap();
        assert!(result.child("Status").unwrap().child("SUCCESS").is_some());
        assert!(result.child("Locator").is_none());
    }
}
