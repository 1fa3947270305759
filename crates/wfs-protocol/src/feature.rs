//! GML encoding of area features and FeatureCollection documents, and
//! decoding of features submitted in Insert actions.

use wfs_common::{AreaFeature, BoundingBox, WfsError, WfsResult};

use crate::gml;
use crate::schema::{FeatureTypeSchema, GEOMETRY_PROPERTY, MS_PREFIX, NS_MS};
use crate::xml::{escape, XmlElement, NS_GML, NS_WFS, NS_XSI};

/// Encode one feature as a `gml:featureMember`.
pub fn encode_feature_member(schema: &FeatureTypeSchema, feature: &AreaFeature) -> String {
    let fid = feature
        .id
        .map(|id| format!(r#" fid="{}""#, id.to_fid()))
        .unwrap_or_default();

    let mut xml = format!(
        "  <gml:featureMember>\n    <{}:{}{}>\n",
        MS_PREFIX, schema.name, fid
    );
    if let Some(geometry) = &feature.geometry {
        xml.push_str(&format!(
            "      <{0}:{1}>{2}</{0}:{1}>\n",
            MS_PREFIX,
            GEOMETRY_PROPERTY,
            gml::encode_geometry(geometry)
        ));
    }
    for (name, value) in [
        ("name", &feature.name),
        ("areaType", &feature.area_type),
        ("description", &feature.description),
    ] {
        xml.push_str(&format!(
            "      <{0}:{1}>{2}</{0}:{1}>\n",
            MS_PREFIX,
            name,
            escape(value)
        ));
    }
    xml.push_str(&format!(
        "    </{}:{}>\n  </gml:featureMember>\n",
        MS_PREFIX, schema.name
    ));
    xml
}

/// Build a `wfs:FeatureCollection` around already filtered features.
///
/// `service_url` is the public WFS endpoint, used to point
/// `xsi:schemaLocation` at this service's DescribeFeatureType.
pub fn encode_feature_collection(
    schema: &FeatureTypeSchema,
    features: &[AreaFeature],
    service_url: &str,
) -> String {
    let describe_url = format!(
        "{}?SERVICE=WFS&VERSION=1.0.0&REQUEST=DescribeFeatureType&TYPENAME={}",
        service_url,
        schema.qualified_name()
    );

    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:FeatureCollection
    xmlns:{prefix}="{ms}"
    xmlns:wfs="{wfs}"
    xmlns:gml="{gml}"
    xmlns:xsi="{xsi}"
    xsi:schemaLocation="{ms} {describe} {wfs} http://schemas.opengis.net/wfs/1.0.0/WFS-basic.xsd">
"#,
        prefix = MS_PREFIX,
        ms = NS_MS,
        wfs = NS_WFS,
        gml = NS_GML,
        xsi = NS_XSI,
        describe = escape(&describe_url)
    );

    let envelope = features
        .iter()
        .filter_map(|f| f.geometry.as_ref().and_then(|g| g.envelope()))
        .reduce(|a, b| a.union(&b));
    xml.push_str(&bounded_by(envelope.as_ref()));

    for feature in features {
        xml.push_str(&encode_feature_member(schema, feature));
    }

    xml.push_str("</wfs:FeatureCollection>\n");
    xml
}

fn bounded_by(envelope: Option<&BoundingBox>) -> String {
    match envelope {
        Some(bbox) => format!("  <gml:boundedBy>{}</gml:boundedBy>\n", gml::encode_box(bbox)),
        None => "  <gml:boundedBy><gml:null>missing</gml:null></gml:boundedBy>\n".to_string(),
    }
}

/// Decode a feature element such as `<ms:area>` from an Insert action.
///
/// A client-supplied `fid` is ignored and `name` is required. Unknown
/// property elements are skipped.
pub fn decode_feature(schema: &FeatureTypeSchema, element: &XmlElement) -> WfsResult<AreaFeature> {
    if element.name != schema.name {
        return Err(WfsError::invalid_parameter(
            "typeName",
            format!("unknown feature type '{}'", element.name),
        ));
    }

    let mut feature = AreaFeature::default();
    let mut has_name = false;

    for property in &element.children {
        match property.name.as_str() {
            GEOMETRY_PROPERTY => feature.geometry = gml::decode_geometry_property(property)?,
            "name" => {
                feature.name = property.text().to_string();
                has_name = !feature.name.is_empty();
            }
            "areaType" => feature.area_type = property.text().to_string(),
            "description" => feature.description = property.content().to_string(),
            _ => {}
        }
    }

    if !has_name {
        return Err(WfsError::MissingParameter("name".to_string()));
    }
    Ok(feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;
    use wfs_common::{AreaId, Coord, Geometry};

    fn north_field() -> AreaFeature {
        AreaFeature {
            id: Some(AreaId(1)),
            name: "North Field".to_string(),
            area_type: "field".to_string(),
            description: "<p>Corn & beans</p>".to_string(),
            geometry: Some(Geometry::Polygon {
                exterior: vec![
                    Coord::new(-93.6, 41.6),
                    Coord::new(-93.5, 41.6),
                    Coord::new(-93.5, 41.7),
                    Coord::new(-93.6, 41.6),
                ],
                interiors: vec![],
            }),
        }
    }

    #[test]
    fn test_feature_collection_parses_back() {
        let schema = FeatureTypeSchema::area();
        let doc = encode_feature_collection(&schema, &[north_field()], "http://farm.example/wfs");
        let root = xml::parse(&doc).unwrap();
        assert_eq!(root.name, "FeatureCollection");

        let bbox = gml::decode_box(root.child("boundedBy").unwrap().child("Box").unwrap()).unwrap();
        assert_eq!(bbox, BoundingBox::new(-93.6, 41.6, -93.5, 41.7));

        let members: Vec<_> = root.children_named("featureMember").collect();
        assert_eq!(members.len(), 1);
        let area = members[0].child("area").unwrap();
        assert_eq!(area.attr("fid"), Some("area.1"));
        assert_eq!(area.child("name").unwrap().text(), "North Field");
        assert_eq!(area.child("description").unwrap().text(), "<p>Corn & beans</p>");

        let geometry = gml::decode_geometry_property(area.child("geometry").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(Some(geometry), north_field().geometry);
    }

    #[test]
    fn test_empty_collection_has_null_bounds() {
        let doc = encode_feature_collection(&FeatureTypeSchema::area(), &[], "http://x/wfs");
        assert!(doc.contains("<gml:null>missing</gml:null>"));
        assert!(!doc.contains("featureMember"));
    }

    #[test]
    fn test_decode_insert_feature() {
        let doc = r#"<ms:area xmlns:ms="http://mapserver.gis.umn.edu/mapserver" xmlns:gml="http://www.opengis.net/gml" fid="area.77">
  <ms:geometry><gml:Point><gml:coordinates>-93.55,41.65</gml:coordinates></gml:Point></ms:geometry>
  <ms:name>New Marker</ms:name>
  <ms:areaType>other</ms:areaType>
  <ms:colour>red</ms:colour>
</ms:area>"#;
        let feature = decode_feature(&FeatureTypeSchema::area(), &xml::parse(doc).unwrap()).unwrap();
        assert_eq!(feature.id, None);
        assert_eq!(feature.name, "New Marker");
        assert_eq!(feature.area_type, "other");
        assert_eq!(feature.geometry, Some(Geometry::Point(Coord::new(-93.55, 41.65))));
    }

    #[test]
    fn test_decode_insert_description_verbatim() {
        let doc = r#"<area><name>Pond</name><description>
  <p>Stocked in <em>May</em></p>
</description></area>"#;
        let feature = decode_feature(&FeatureTypeSchema::area(), &xml::parse(doc).unwrap()).unwrap();
        assert_eq!(feature.description, "\n  <p>Stocked in <em>May</em></p>\n");
    }

    #[test]
    fn test_decode_insert_requires_name() {
        let doc = r#"<area><areaType>field</areaType></area>"#;
        let err = decode_feature(&FeatureTypeSchema::area(), &xml::parse(doc).unwrap()).unwrap_err();
        assert!(matches!(err, WfsError::MissingParameter(_)));
    }
}
