//! WFS 1.0.0 GetCapabilities document.

use crate::schema::{SchemaRegistry, MS_PREFIX, NS_MS};
use crate::xml::escape;

/// Operations advertised by the service, in document order.
pub const OPERATIONS: [&str; 4] = [
    "GetCapabilities",
    "DescribeFeatureType",
    "GetFeature",
    "Transaction",
];

/// Generate the WFS Capabilities XML document.
///
/// The document depends only on the configuration and the schema registry,
/// so it is built once at start-up and served verbatim.
pub struct CapabilitiesBuilder<'a> {
    pub service_title: String,
    pub service_abstract: String,
    /// Public URL of the WFS endpoint (without query string).
    pub online_resource: String,
    pub schemas: &'a SchemaRegistry,
}

impl CapabilitiesBuilder<'_> {
    pub fn build(&self) -> String {
        let mut xml = String::new();
        let url = escape(&self.online_resource);

        xml.push_str(&format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<WFS_Capabilities version="1.0.0" updateSequence="0"
    xmlns="http://www.opengis.net/wfs"
    xmlns:ogc="http://www.opengis.net/ogc"
    xmlns:{}="{}"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xsi:schemaLocation="http://www.opengis.net/wfs http://schemas.opengis.net/wfs/1.0.0/WFS-capabilities.xsd">
"#,
            MS_PREFIX, NS_MS
        ));

        // Service
        xml.push_str(&format!(
            r#"  <Service>
    <Name>WFS</Name>
    <Title>{}</Title>
    <Abstract>{}</Abstract>
    <OnlineResource>{}</OnlineResource>
  </Service>
"#,
            escape(&self.service_title),
            escape(&self.service_abstract),
            url
        ));

        // Capability
        xml.push_str("  <Capability>\n    <Request>\n");
        for operation in OPERATIONS {
            let extra = match operation {
                "DescribeFeatureType" => {
                    "\n      <SchemaDescriptionLanguage><XMLSCHEMA/></SchemaDescriptionLanguage>"
                }
                "GetFeature" => "\n      <ResultFormat><GML2/></ResultFormat>",
                _ => "",
            };
            xml.push_str(&format!(
                r#"    <{0}>{1}
      <DCPType><HTTP><Get onlineResource="{2}?"/></HTTP></DCPType>
      <DCPType><HTTP><Post onlineResource="{2}"/></HTTP></DCPType>
    </{0}>
"#,
                operation, extra, url
            ));
        }
        xml.push_str("    </Request>\n  </Capability>\n");

        // FeatureTypeList
        xml.push_str(
            r#"  <FeatureTypeList>
    <Operations><Query/><Insert/><Update/><Delete/></Operations>
"#,
        );
        for feature_type in self.schemas.feature_types() {
            let bounds = feature_type.bounds();
            xml.push_str(&format!(
                r#"    <FeatureType>
      <Name>{}</Name>
      <Title>{}</Title>
      <Abstract>{}</Abstract>
      <SRS>{}</SRS>
      <LatLongBoundingBox minx="{}" miny="{}" maxx="{}" maxy="{}"/>
    </FeatureType>
"#,
                feature_type.qualified_name(),
                escape(feature_type.title),
                escape(feature_type.abstract_text),
                feature_type.crs,
                bounds.min_x,
                bounds.min_y,
                bounds.max_x,
                bounds.max_y
            ));
        }
        xml.push_str("  </FeatureTypeList>\n");

        // Filter capabilities
        xml.push_str(
            r#"  <ogc:Filter_Capabilities>
    <ogc:Spatial_Capabilities>
      <ogc:Spatial_Operators><ogc:BBOX/></ogc:Spatial_Operators>
    </ogc:Spatial_Capabilities>
    <ogc:Scalar_Capabilities>
      <ogc:Logical_Operators/>
    </ogc:Scalar_Capabilities>
  </ogc:Filter_Capabilities>
</WFS_Capabilities>
"#,
        );

        xml
    }
}
