//! Contract of the area backend (the system of record).
//!
//! Every call takes an explicit [`Session`]; implementations hold no
//! per-user state, so a single backend instance can serve concurrent
//! requests from different users.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::area::{AreaFeature, AreaId, AreaRecord};
use crate::bbox::BoundingBox;

/// HTTP Basic credentials forwarded from the WFS client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// An authenticated backend session, scoped to one WFS request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    /// Value of the `Cookie` header to send with backend calls.
    pub cookie: Option<String>,
    /// CSRF token required for write calls.
    pub token: Option<String>,
}

/// Hints a backend may use to narrow a listing. Implementations are free to
/// ignore them; callers filter the result again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaFilter {
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Area {0} not found")]
    NotFound(AreaId),

    #[error("Backend unreachable: {0}")]
    Transport(String),

    #[error("Backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

/// Authenticated CRUD over area records.
#[async_trait]
pub trait AreaBackend: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, BackendError>;

    async fn list_areas(
        &self,
        session: &Session,
        filter: &AreaFilter,
    ) -> Result<Vec<AreaRecord>, BackendError>;

    async fn get_area(&self, session: &Session, id: AreaId) -> Result<AreaRecord, BackendError>;

    async fn create_area(
        &self,
        session: &Session,
        feature: &AreaFeature,
    ) -> Result<AreaId, BackendError>;

    async fn update_area(
        &self,
        session: &Session,
        id: AreaId,
        feature: &AreaFeature,
    ) -> Result<(), BackendError>;

    async fn delete_area(&self, session: &Session, id: AreaId) -> Result<(), BackendError>;
}
