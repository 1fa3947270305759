//! Error types for the WFS proxy.

use thiserror::Error;

use crate::backend::BackendError;
use crate::geometry::GeometryError;

/// Result type alias using WfsError.
pub type WfsResult<T> = Result<T, WfsError>;

/// Primary error type for WFS operations.
///
/// Every variant is reported to clients as a `ServiceExceptionReport`; the
/// exception code and locator come from [`WfsError::wfs_exception_code`] and
/// [`WfsError::locator`].
#[derive(Debug, Error)]
pub enum WfsError {
    // === WFS Protocol Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Unsupported service '{0}', expected WFS")]
    UnsupportedService(String),

    #[error("Unsupported version '{0}', only 1.0.0 is supported")]
    UnsupportedVersion(String),

    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    #[error("Malformed XML request: {0}")]
    MalformedXml(String),

    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    // === Data Errors ===
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    // === Backend Errors ===
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl WfsError {
    /// Get the OGC exception code for this error.
    pub fn wfs_exception_code(&self) -> &'static str {
        match self {
            WfsError::MissingParameter(_) => "MissingParameterValue",
            WfsError::InvalidParameter { .. }
            | WfsError::UnsupportedService(_)
            | WfsError::UnsupportedFilter(_)
            | WfsError::MalformedXml(_)
            | WfsError::Geometry(_) => "InvalidParameterValue",
            WfsError::UnsupportedVersion(_) => "VersionNegotiationFailed",
            WfsError::OperationNotSupported(_) => "OperationNotSupported",
            _ => "NoApplicableCode",
        }
    }

    /// Name of the request parameter the error refers to, if any.
    pub fn locator(&self) -> Option<&str> {
        match self {
            WfsError::MissingParameter(param) => Some(param),
            WfsError::InvalidParameter { param, .. } => Some(param),
            WfsError::UnsupportedService(_) => Some("SERVICE"),
            WfsError::UnsupportedVersion(_) => Some("VERSION"),
            WfsError::OperationNotSupported(_) => Some("REQUEST"),
            WfsError::UnsupportedFilter(_) => Some("FILTER"),
            _ => None,
        }
    }

    /// Whether the client should be challenged for (new) credentials.
    pub fn requires_authentication(&self) -> bool {
        matches!(
            self,
            WfsError::AuthenticationRequired | WfsError::Backend(BackendError::Authentication(_))
        )
    }

    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        WfsError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }
}
