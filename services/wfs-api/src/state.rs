//! Application state and shared resources.

use std::sync::Arc;

use wfs_common::AreaBackend;
use wfs_protocol::{CapabilitiesBuilder, SchemaRegistry};

use crate::config::WfsConfig;

/// Shared application state.
///
/// Everything here is immutable after start-up; the backend carries the only
/// connection state and is itself safe for concurrent use.
pub struct AppState {
    pub backend: Arc<dyn AreaBackend>,
    pub schemas: Arc<SchemaRegistry>,
    /// GetCapabilities document, built once since it does not depend on data.
    pub capabilities: String,
    pub public_url: String,
    pub fetch_concurrency: usize,
}

impl AppState {
    pub fn new(backend: Arc<dyn AreaBackend>, config: &WfsConfig) -> Self {
        let schemas = Arc::new(SchemaRegistry::default());
        let capabilities = CapabilitiesBuilder {
            service_title: config.service_title.clone(),
            service_abstract: config.service_abstract.clone(),
            online_resource: config.public_url.clone(),
            schemas: &schemas,
        }
        .build();

        Self {
            backend,
            schemas,
            capabilities,
            public_url: config.public_url.clone(),
            fetch_concurrency: config.fetch_concurrency.max(1),
        }
    }
}
