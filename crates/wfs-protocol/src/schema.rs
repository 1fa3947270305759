//! Feature type schemas.

use wfs_common::{BoundingBox, CrsCode};

/// Namespace of the published feature types.
pub const NS_MS: &str = "http://mapserver.gis.umn.edu/mapserver";
pub const MS_PREFIX: &str = "ms";

/// Name of the geometry property of every feature type.
pub const GEOMETRY_PROPERTY: &str = "geometry";

/// One scalar attribute of a feature type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    pub name: &'static str,
    /// XML Schema type, e.g. `string`.
    pub xsd_type: &'static str,
    pub required: bool,
}

/// Static description of a feature type.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTypeSchema {
    pub name: &'static str,
    pub title: &'static str,
    pub abstract_text: &'static str,
    pub crs: CrsCode,
    /// GML property type of the geometry, any of point, line string or polygon.
    pub geometry_type: &'static str,
    pub attributes: Vec<AttributeSchema>,
}

impl FeatureTypeSchema {
    /// The farm area feature type.
    pub fn area() -> Self {
        Self {
            name: "area",
            title: "Farm areas",
            abstract_text: "Areas (fields, buildings, paddocks, ...) of the farm",
            crs: CrsCode::Epsg4326,
            geometry_type: "GeometryPropertyType",
            attributes: vec![
                AttributeSchema {
                    name: "name",
                    xsd_type: "string",
                    required: true,
                },
                AttributeSchema {
                    name: "areaType",
                    xsd_type: "string",
                    required: false,
                },
                AttributeSchema {
                    name: "description",
                    xsd_type: "string",
                    required: false,
                },
            ],
        }
    }

    /// Prefixed name, e.g. `ms:area`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", MS_PREFIX, self.name)
    }

    /// Whether a client-supplied type name refers to this type. Any
    /// namespace prefix (or none) is accepted.
    pub fn matches(&self, requested: &str) -> bool {
        let requested = requested.trim();
        let local = requested
            .rsplit_once(':')
            .map(|(_, local)| local)
            .unwrap_or(requested);
        local == self.name
    }

    /// Whether any entry of a comma-separated `TYPENAME` list refers to this type.
    pub fn matches_any(&self, type_names: &str) -> bool {
        type_names.split(',').any(|name| self.matches(name))
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn bounds(&self) -> BoundingBox {
        self.crs.valid_bounds()
    }
}

/// The set of published feature types. Built once at start-up and shared
/// read-only. The service publishes exactly one type.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    area: FeatureTypeSchema,
}

impl SchemaRegistry {
    pub fn new(area: FeatureTypeSchema) -> Self {
        Self { area }
    }

    pub fn feature_types(&self) -> &[FeatureTypeSchema] {
        std::slice::from_ref(&self.area)
    }

    /// Look a type up by (possibly prefixed) name.
    pub fn find(&self, type_name: &str) -> Option<&FeatureTypeSchema> {
        self.feature_types().iter().find(|t| t.matches(type_name))
    }

    pub fn area(&self) -> &FeatureTypeSchema {
        &self.area
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(FeatureTypeSchema::area())
    }
}
