//! Common test fixtures for WFS tests.
//!
//! This module provides pre-defined geometries and request documents that
//! represent common farm-mapping scenarios.

use wfs_common::{AreaId, AreaRecord};

/// Backend-native (WKT) geometries.
pub mod wkt {
    /// A field near Ames, Iowa (lon/lat).
    pub const NORTH_FIELD: &str =
        "POLYGON ((-93.62 42.03, -93.6 42.03, -93.6 42.05, -93.62 42.05, -93.62 42.03))";

    pub const BARN: &str = "POINT (-93.61 42.02)";

    pub const FENCE_LINE: &str = "LINESTRING (-93.63 42.01, -93.63 42.02, -93.62 42.02)";

    /// Paddock with a pond cut out of it.
    pub const PADDOCK_WITH_POND: &str = "POLYGON ((10 10, 11 10, 11 11, 10 11, 10 10), (10.4 10.4, 10.6 10.4, 10.6 10.6, 10.4 10.4))";

    /// Valid WKT of an unsupported kind.
    pub const TWO_PLOTS: &str =
        "MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((2 2, 3 2, 3 3, 2 2)))";

    pub const GARBAGE: &str = "POLYGON ((1 2, 3";
}

/// Request snippets and documents.
pub mod gml {
    /// Namespace declarations used by the request documents below.
    pub const NAMESPACES: &str = concat!(
        r#"xmlns:wfs="http://www.opengis.net/wfs" "#,
        r#"xmlns:ogc="http://www.opengis.net/ogc" "#,
        r#"xmlns:gml="http://www.opengis.net/gml" "#,
        r#"xmlns:ms="http://mapserver.gis.umn.edu/mapserver""#
    );

    /// GML 2 point, lon/lat.
    pub const POINT: &str = r#"<gml:Point srsName="EPSG:4326"><gml:coordinates decimal="." cs="," ts=" ">-93.55,41.65</gml:coordinates></gml:Point>"#;

    /// The same point, lat/lon as the URN form requires.
    pub const POINT_URN: &str = r#"<gml:Point srsName="urn:ogc:def:crs:EPSG::4326"><gml:pos>41.65 -93.55</gml:pos></gml:Point>"#;

    pub const LINESTRING: &str = r#"<gml:LineString srsName="EPSG:4326"><gml:coordinates>0,0 1,1 2,0</gml:coordinates></gml:LineString>"#;

    pub const POLYGON_WITH_HOLE: &str = r#"<gml:Polygon srsName="http://www.opengis.net/gml/srs/epsg.xml#4326"><gml:outerBoundaryIs><gml:LinearRing><gml:coordinates>10,10 11,10 11,11 10,11 10,10</gml:coordinates></gml:LinearRing></gml:outerBoundaryIs><gml:innerBoundaryIs><gml:LinearRing><gml:coordinates>10.4,10.4 10.6,10.4 10.6,10.6 10.4,10.4</gml:coordinates></gml:LinearRing></gml:innerBoundaryIs></gml:Polygon>"#;

    pub const MULTI_POLYGON: &str = r#"<gml:MultiPolygon srsName="EPSG:4326"><gml:polygonMember><gml:Polygon><gml:outerBoundaryIs><gml:LinearRing><gml:coordinates>0,0 1,0 1,1 0,0</gml:coordinates></gml:LinearRing></gml:outerBoundaryIs></gml:Polygon></gml:polygonMember></gml:MultiPolygon>"#;

    /// Wrap a geometry snippet so it parses as a standalone document.
    pub fn with_namespaces(snippet: &str) -> String {
        match snippet.find(' ') {
            Some(pos) => format!("{} {}{}", &snippet[..pos], NAMESPACES, &snippet[pos..]),
            None => snippet.to_string(),
        }
    }

    /// A `wfs:Transaction` document around the given actions.
    pub fn transaction(actions: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:Transaction service="WFS" version="1.0.0" {}>
{}
</wfs:Transaction>"#,
            NAMESPACES, actions
        )
    }

    /// A `wfs:Insert` of one area.
    pub fn insert(handle: &str, name: &str, geometry: &str) -> String {
        format!(
            r#"<wfs:Insert handle="{}"><ms:area><ms:geometry>{}</ms:geometry><ms:name>{}</ms:name><ms:areaType>other</ms:areaType><ms:description></ms:description></ms:area></wfs:Insert>"#,
            handle, geometry, name
        )
    }

    /// A `wfs:Update` setting one text property of the given fid.
    pub fn update(handle: &str, fid: &str, property: &str, value: &str) -> String {
        format!(
            r#"<wfs:Update typeName="ms:area" handle="{}"><wfs:Property><wfs:Name>{}</wfs:Name><wfs:Value>{}</wfs:Value></wfs:Property><ogc:Filter><ogc:FeatureId fid="{}"/></ogc:Filter></wfs:Update>"#,
            handle, property, value, fid
        )
    }

    /// A `wfs:Delete` of the given fid.
    pub fn delete(handle: &str, fid: &str) -> String {
        format!(
            r#"<wfs:Delete typeName="ms:area" handle="{}"><ogc:Filter><ogc:FeatureId fid="{}"/></ogc:Filter></wfs:Delete>"#,
            handle, fid
        )
    }
}

/// Common bounding boxes, (min_x, min_y, max_x, max_y).
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Around the Ames farm fixtures.
    pub const AMES_FARM: (f64, f64, f64, f64) = (-93.7, 41.9, -93.5, 42.1);

    /// Far from every fixture.
    pub const SOUTH_ATLANTIC: (f64, f64, f64, f64) = (-20.0, -40.0, -10.0, -30.0);
}

/// An [`AreaRecord`] with the given WKT geometry.
pub fn area_record(id: u64, name: &str, area_type: &str, wkt: Option<&str>) -> AreaRecord {
    AreaRecord {
        id: AreaId(id),
        name: name.to_string(),
        area_type: area_type.to_string(),
        description: String::new(),
        geometry: wkt.map(str::to_string),
    }
}
