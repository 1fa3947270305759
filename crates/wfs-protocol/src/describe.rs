//! DescribeFeatureType: XML Schema of the published feature types.

use crate::schema::{FeatureTypeSchema, SchemaRegistry, GEOMETRY_PROPERTY, MS_PREFIX, NS_MS};
use crate::xml::NS_GML;

/// Build the schema document for the requested type names.
///
/// An empty request describes every registered type. Names that match no
/// registered type are dropped, so an unknown name yields a schema carrying
/// only the GML import.
pub fn describe_feature_types(registry: &SchemaRegistry, type_names: &[String]) -> String {
    let selected: Vec<&FeatureTypeSchema> = registry
        .feature_types()
        .iter()
        .filter(|t| type_names.is_empty() || type_names.iter().any(|n| t.matches(n)))
        .collect();

    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<schema xmlns="http://www.w3.org/2001/XMLSchema"
    xmlns:{prefix}="{ns}"
    xmlns:gml="{gml}"
    targetNamespace="{ns}"
    elementFormDefault="qualified" version="0.1">
  <import namespace="{gml}" schemaLocation="http://schemas.opengis.net/gml/2.1.2/feature.xsd"/>
"#,
        prefix = MS_PREFIX,
        ns = NS_MS,
        gml = NS_GML
    );

    for feature_type in selected {
        xml.push_str(&format!(
            r#"  <element name="{name}" type="{prefix}:{name}Type" substitutionGroup="gml:_Feature"/>
  <complexType name="{name}Type">
    <complexContent>
      <extension base="gml:AbstractFeatureType">
        <sequence>
          <element name="{geometry}" type="gml:{geometry_type}" minOccurs="0" maxOccurs="1"/>
"#,
            name = feature_type.name,
            prefix = MS_PREFIX,
            geometry = GEOMETRY_PROPERTY,
            geometry_type = feature_type.geometry_type
        ));
        for attribute in &feature_type.attributes {
            xml.push_str(&format!(
                "          <element name=\"{}\" type=\"{}\" minOccurs=\"{}\" maxOccurs=\"1\"/>\n",
                attribute.name,
                attribute.xsd_type,
                if attribute.required { 1 } else { 0 }
            ));
        }
        xml.push_str(
            r#"        </sequence>
      </extension>
    </complexContent>
  </complexType>
"#,
        );
    }

    xml.push_str("</schema>\n");
    xml
}
