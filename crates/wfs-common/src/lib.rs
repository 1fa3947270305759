//! Common types shared by the WFS protocol crate, the backend clients and the
//! WFS service.

pub mod area;
pub mod backend;
pub mod bbox;
pub mod crs;
pub mod error;
pub mod geometry;

pub use area::{AreaFeature, AreaId, AreaRecord, FID_PREFIX};
pub use backend::{AreaBackend, AreaFilter, BackendError, Credentials, Session};
pub use bbox::{BboxParseError, BoundingBox};
pub use crs::{AxisOrder, CrsCode, CrsParseError, DEFAULT_SRS_NAME};
pub use error::{WfsError, WfsResult};
pub use geometry::{Coord, Geometry, GeometryError, GeometryKind};
