//! GML geometry codec.
//!
//! Output is GML 2.1.2 (`gml:coordinates`, `outerBoundaryIs`), always tagged
//! `EPSG:4326` with longitude first. Input additionally accepts `gml:coord`,
//! and the GML 3 `gml:pos` / `gml:posList` / `exterior` forms that some
//! clients send even when talking WFS 1.0.0.

use wfs_common::geometry::{Coord, Geometry, GeometryError};
use wfs_common::{AxisOrder, BoundingBox, CrsCode, DEFAULT_SRS_NAME};

use crate::xml::XmlElement;

const COORDINATES_ATTRS: &str = r#"decimal="." cs="," ts=" ""#;

/// Decode a `gml:Point`, `gml:LineString` or `gml:Polygon` element.
pub fn decode_geometry(element: &XmlElement) -> Result<Geometry, GeometryError> {
    let axis = axis_order(element)?;

    let geometry = match element.name.as_str() {
        "Point" => {
            let positions = read_positions(element, axis)?;
            match positions.as_slice() {
                [single] => Geometry::Point(*single),
                [] => return Err(GeometryError::Empty),
                _ => {
                    return Err(GeometryError::Invalid(
                        "Point must have exactly one position".to_string(),
                    ))
                }
            }
        }
        "LineString" => Geometry::LineString(read_positions(element, axis)?),
        "Polygon" => {
            let exterior_ring = element
                .child("outerBoundaryIs")
                .or_else(|| element.child("exterior"))
                .ok_or(GeometryError::Empty)?;
            let exterior = read_ring(exterior_ring, axis)?;

            let interiors = element
                .children
                .iter()
                .filter(|c| c.name == "innerBoundaryIs" || c.name == "interior")
                .map(|ring| read_ring(ring, axis))
                .collect::<Result<Vec<_>, _>>()?;

            Geometry::Polygon {
                exterior,
                interiors,
            }
        }
        other => return Err(GeometryError::Unsupported(other.to_string())),
    };

    geometry.validate()?;
    Ok(geometry)
}

/// Decode the single geometry wrapped by a property element such as
/// `<ms:geometry><gml:Polygon>...</gml:Polygon></ms:geometry>`.
///
/// Returns `Ok(None)` for an empty property.
pub fn decode_geometry_property(property: &XmlElement) -> Result<Option<Geometry>, GeometryError> {
    match property.children.as_slice() {
        [] => Ok(None),
        [geometry] => decode_geometry(geometry).map(Some),
        many => Err(GeometryError::Invalid(format!(
            "expected one geometry, found {}",
            many.len()
        ))),
    }
}

/// Decode a `gml:Box` (GML 2) or `gml:Envelope` (GML 3) element.
pub fn decode_box(element: &XmlElement) -> Result<BoundingBox, GeometryError> {
    let axis = axis_order(element)?;

    let corners = match element.name.as_str() {
        "Box" => read_positions(element, axis)?,
        "Envelope" => {
            let lower = element
                .child("lowerCorner")
                .ok_or_else(|| GeometryError::Invalid("Envelope without lowerCorner".to_string()))?;
            let upper = element
                .child("upperCorner")
                .ok_or_else(|| GeometryError::Invalid("Envelope without upperCorner".to_string()))?;
            vec![read_pos(lower, axis)?, read_pos(upper, axis)?]
        }
        other => return Err(GeometryError::Unsupported(other.to_string())),
    };

    match corners.as_slice() {
        [a, b] => Ok(BoundingBox::new(
            a.x.min(b.x),
            a.y.min(b.y),
            a.x.max(b.x),
            a.y.max(b.y),
        )),
        _ => Err(GeometryError::Invalid(format!(
            "box must have exactly 2 corners, found {}",
            corners.len()
        ))),
    }
}

/// Encode a geometry as a GML 2 element.
pub fn encode_geometry(geometry: &Geometry) -> String {
    match geometry {
        Geometry::Point(c) => format!(
            r#"<gml:Point srsName="{}">{}</gml:Point>"#,
            DEFAULT_SRS_NAME,
            coordinates(std::slice::from_ref(c))
        ),
        Geometry::LineString(points) => format!(
            r#"<gml:LineString srsName="{}">{}</gml:LineString>"#,
            DEFAULT_SRS_NAME,
            coordinates(points)
        ),
        Geometry::Polygon {
            exterior,
            interiors,
        } => {
            let mut xml = format!(
                r#"<gml:Polygon srsName="{}"><gml:outerBoundaryIs><gml:LinearRing>{}</gml:LinearRing></gml:outerBoundaryIs>"#,
                DEFAULT_SRS_NAME,
                coordinates(exterior)
            );
            for ring in interiors {
                xml.push_str(&format!(
                    "<gml:innerBoundaryIs><gml:LinearRing>{}</gml:LinearRing></gml:innerBoundaryIs>",
                    coordinates(ring)
                ));
            }
            xml.push_str("</gml:Polygon>");
            xml
        }
    }
}

/// Encode a `gml:Box`.
pub fn encode_box(bbox: &BoundingBox) -> String {
    format!(
        r#"<gml:Box srsName="{}"><gml:coordinates {}>{},{} {},{}</gml:coordinates></gml:Box>"#,
        DEFAULT_SRS_NAME, COORDINATES_ATTRS, bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
    )
}

fn coordinates(points: &[Coord]) -> String {
    let tuples: Vec<String> = points.iter().map(|c| format!("{},{}", c.x, c.y)).collect();
    format!(
        "<gml:coordinates {}>{}</gml:coordinates>",
        COORDINATES_ATTRS,
        tuples.join(" ")
    )
}

fn axis_order(element: &XmlElement) -> Result<AxisOrder, GeometryError> {
    match element.attr("srsName") {
        Some(name) if !name.trim().is_empty() => CrsCode::from_srs_name(name)
            .map(|(_, axis)| axis)
            .map_err(|_| GeometryError::UnsupportedCrs(name.to_string())),
        _ => Ok(CrsCode::Epsg4326.default_axis_order()),
    }
}

/// Read a ring wrapper (`outerBoundaryIs`, `exterior`, ...) down to its positions.
fn read_ring(wrapper: &XmlElement, axis: AxisOrder) -> Result<Vec<Coord>, GeometryError> {
    let ring = wrapper
        .child("LinearRing")
        .ok_or_else(|| GeometryError::Invalid(format!("{} without LinearRing", wrapper.name)))?;
    let axis = match ring.attr("srsName") {
        Some(_) => axis_order(ring)?,
        None => axis,
    };
    read_positions(ring, axis)
}

/// Collect the positions of a geometry element from whichever encoding it uses.
fn read_positions(element: &XmlElement, axis: AxisOrder) -> Result<Vec<Coord>, GeometryError> {
    if let Some(coords) = element.child("coordinates") {
        return read_coordinates(coords, axis);
    }
    if let Some(list) = element.child("posList") {
        return read_pos_list(list, axis);
    }

    let mut positions = Vec::new();
    for child in &element.children {
        match child.name.as_str() {
            "coord" => positions.push(read_coord(child, axis)?),
            "pos" => positions.push(read_pos(child, axis)?),
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(GeometryError::Empty);
    }
    Ok(positions)
}

/// `<gml:coordinates decimal="." cs="," ts=" ">x,y x,y</gml:coordinates>`
fn read_coordinates(element: &XmlElement, axis: AxisOrder) -> Result<Vec<Coord>, GeometryError> {
    let decimal = element.attr("decimal").unwrap_or(".");
    let cs = element.attr("cs").unwrap_or(",");
    let ts = element.attr("ts").unwrap_or(" ");

    let text = element.text();
    if text.is_empty() {
        return Err(GeometryError::Empty);
    }

    let tuples: Vec<&str> = if ts.trim().is_empty() {
        text.split_whitespace().collect()
    } else {
        text.split(ts).map(str::trim).filter(|t| !t.is_empty()).collect()
    };

    tuples
        .into_iter()
        .map(|tuple| {
            let ordinates: Vec<&str> = tuple.split(cs).map(str::trim).collect();
            if ordinates.len() < 2 || ordinates.len() > 3 {
                return Err(GeometryError::Invalid(format!(
                    "expected 'x{}y' tuple, got '{}'",
                    cs, tuple
                )));
            }
            let first = parse_number(ordinates[0], decimal)?;
            let second = parse_number(ordinates[1], decimal)?;
            Ok(Coord::from(axis.to_xy(first, second)))
        })
        .collect()
}

/// `<gml:coord><gml:X>..</gml:X><gml:Y>..</gml:Y></gml:coord>`
fn read_coord(element: &XmlElement, axis: AxisOrder) -> Result<Coord, GeometryError> {
    let x = element
        .child("X")
        .ok_or_else(|| GeometryError::Invalid("coord without X".to_string()))?;
    let y = element
        .child("Y")
        .ok_or_else(|| GeometryError::Invalid("coord without Y".to_string()))?;
    let first = parse_number(x.text(), ".")?;
    let second = parse_number(y.text(), ".")?;
    Ok(Coord::from(axis.to_xy(first, second)))
}

/// `<gml:pos>x y</gml:pos>`, also used for envelope corners.
fn read_pos(element: &XmlElement, axis: AxisOrder) -> Result<Coord, GeometryError> {
    let values = split_numbers(element.text())?;
    if values.len() < 2 || values.len() > 3 {
        return Err(GeometryError::Invalid(format!(
            "expected 2 ordinates in pos, got {}",
            values.len()
        )));
    }
    Ok(Coord::from(axis.to_xy(values[0], values[1])))
}

/// `<gml:posList srsDimension="2">x y x y</gml:posList>`
fn read_pos_list(element: &XmlElement, axis: AxisOrder) -> Result<Vec<Coord>, GeometryError> {
    let dimension = match element.attr("srsDimension").or_else(|| element.attr("dimension")) {
        Some(value) => value
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|d| (2..=3).contains(d))
            .ok_or_else(|| GeometryError::Invalid(format!("invalid srsDimension '{}'", value)))?,
        None => 2,
    };

    let values = split_numbers(element.text())?;
    if values.is_empty() {
        return Err(GeometryError::Empty);
    }
    if values.len() % dimension != 0 {
        return Err(GeometryError::Invalid(format!(
            "posList length {} is not a multiple of {}",
            values.len(),
            dimension
        )));
    }

    Ok(values
        .chunks(dimension)
        .map(|chunk| Coord::from(axis.to_xy(chunk[0], chunk[1])))
        .collect())
}

fn split_numbers(text: &str) -> Result<Vec<f64>, GeometryError> {
    text.split_whitespace()
        .map(|value| parse_number(value, "."))
        .collect()
}

fn parse_number(value: &str, decimal: &str) -> Result<f64, GeometryError> {
    let normalized = if decimal == "." {
        value.trim().to_string()
    } else {
        value.trim().replace(decimal, ".")
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GeometryError::Invalid(format!("invalid coordinate value '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    fn decode(doc: &str) -> Result<Geometry, GeometryError> {
        decode_geometry(&xml::parse(doc).unwrap())
    }

    const GML: &str = r#"xmlns:gml="http://www.opengis.net/gml""#;

    #[test]
    fn test_decode_point_coordinates() {
        let g = decode(&format!(
            r#"<gml:Point {} srsName="EPSG:4326"><gml:coordinates>-93.5,42.25</gml:coordinates></gml:Point>"#,
            GML
        ))
        .unwrap();
        assert_eq!(g, Geometry::Point(Coord::new(-93.5, 42.25)));
    }

    #[test]
    fn test_decode_point_urn_swaps_axes() {
        let g = decode(&format!(
            r#"<gml:Point {} srsName="urn:ogc:def:crs:EPSG::4326"><gml:pos>42.25 -93.5</gml:pos></gml:Point>"#,
            GML
        ))
        .unwrap();
        assert_eq!(g, Geometry::Point(Coord::new(-93.5, 42.25)));
    }

    #[test]
    fn test_decode_point_coord_form() {
        let g = decode(&format!(
            r#"<gml:Point {}><gml:coord><gml:X>1.5</gml:X><gml:Y>2.5</gml:Y></gml:coord></gml:Point>"#,
            GML
        ))
        .unwrap();
        assert_eq!(g, Geometry::Point(Coord::new(1.5, 2.5)));
    }

    #[test]
    fn test_decode_custom_separators() {
        let g = decode(&format!(
            r#"<gml:LineString {}><gml:coordinates decimal="," cs=";" ts="|">1,5;2|3;4,25</gml:coordinates></gml:LineString>"#,
            GML
        ))
        .unwrap();
        assert_eq!(
            g,
            Geometry::LineString(vec![Coord::new(1.5, 2.0), Coord::new(3.0, 4.25)])
        );
    }

    #[test]
    fn test_decode_gml3_polygon_pos_list() {
        let g = decode(&format!(
            r#"<gml:Polygon {}><gml:exterior><gml:LinearRing><gml:posList srsDimension="3">0 0 5 1 0 5 1 1 5 0 0 5</gml:posList></gml:LinearRing></gml:exterior></gml:Polygon>"#,
            GML
        ))
        .unwrap();
        match g {
            Geometry::Polygon { exterior, interiors } => {
                assert_eq!(exterior.len(), 4);
                assert_eq!(exterior[2], Coord::new(1.0, 1.0));
                assert!(interiors.is_empty());
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unsupported() {
        let err = decode(&format!(
            r#"<gml:MultiPolygon {}><gml:polygonMember/></gml:MultiPolygon>"#,
            GML
        ))
        .unwrap_err();
        assert_eq!(err, GeometryError::Unsupported("MultiPolygon".to_string()));

        let err = decode(&format!(
            r#"<gml:Point {} srsName="EPSG:3857"><gml:coordinates>1,2</gml:coordinates></gml:Point>"#,
            GML
        ))
        .unwrap_err();
        assert!(matches!(err, GeometryError::UnsupportedCrs(_)));
    }

    #[test]
    fn test_decode_unclosed_ring_is_invalid() {
        let err = decode(&format!(
            r#"<gml:Polygon {}><gml:outerBoundaryIs><gml:LinearRing><gml:coordinates>0,0 1,0 1,1 0,1</gml:coordinates></gml:LinearRing></gml:outerBoundaryIs></gml:Polygon>"#,
            GML
        ))
        .unwrap_err();
        assert!(matches!(err, GeometryError::Invalid(_)));
    }

    #[test]
    fn test_encode_point_exact_order() {
        let xml = encode_geometry(&Geometry::Point(Coord::new(-93.5, 42.25)));
        assert_eq!(
            xml,
            r#"<gml:Point srsName="EPSG:4326"><gml:coordinates decimal="." cs="," ts=" ">-93.5,42.25</gml:coordinates></gml:Point>"#
        );
    }

    #[test]
    fn test_decode_box_and_envelope() {
        let bbox = decode_box(
            &xml::parse(&format!(
                r#"<gml:Box {}><gml:coordinates>-94,41 -93,42</gml:coordinates></gml:Box>"#,
                GML
            ))
            .unwrap(),
        )
        .unwrap();
        assert_eq!(bbox, BoundingBox::new(-94.0, 41.0, -93.0, 42.0));

        let bbox = decode_box(
            &xml::parse(&format!(
                r#"<gml:Envelope {} srsName="urn:ogc:def:crs:EPSG::4326"><gml:lowerCorner>41 -94</gml:lowerCorner><gml:upperCorner>42 -93</gml:upperCorner></gml:Envelope>"#,
                GML
            ))
            .unwrap(),
        )
        .unwrap();
        assert_eq!(bbox, BoundingBox::new(-94.0, 41.0, -93.0, 42.0));
    }
}
