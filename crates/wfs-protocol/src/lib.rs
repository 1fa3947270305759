//! OGC WFS 1.0.0 protocol implementation.
//!
//! Supports:
//! - KVP (GET) and XML (POST) request encodings
//! - GML 2.1.2 feature and geometry encoding
//! - GetCapabilities, DescribeFeatureType, GetFeature and Transaction documents

pub mod capabilities;
pub mod describe;
pub mod exceptions;
pub mod feature;
pub mod filter;
pub mod gml;
pub mod request;
pub mod schema;
pub mod transaction;
pub mod xml;

pub use capabilities::{CapabilitiesBuilder, OPERATIONS};
pub use describe::describe_feature_types;
pub use exceptions::{exception_report, service_exception};
pub use feature::{decode_feature, encode_feature_collection, encode_feature_member};
pub use filter::Filter;
pub use request::{
    parse_xml_request, DescribeFeatureTypeRequest, GetFeatureRequest, WfsKvpParams, WfsRequest,
    WFS_VERSION,
};
pub use schema::{AttributeSchema, FeatureTypeSchema, SchemaRegistry};
pub use transaction::{
    ActionKind, PropertyUpdate, PropertyValue, TransactionAction, TransactionOutcome,
    TransactionRequest, TransactionResponse,
};
pub use xml::XmlElement;

/// MIME type of every XML document the service returns.
pub const XML_MIMETYPE: &str = "text/xml; charset=utf-8";
