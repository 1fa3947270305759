//! GetFeature execution against the area backend.

use futures::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

use wfs_common::{
    AreaBackend, AreaFeature, AreaFilter, AreaId, AreaRecord, BackendError, Credentials, Session,
    WfsError, WfsResult,
};
use wfs_protocol::{FeatureTypeSchema, GetFeatureRequest};

/// Features selected by a GetFeature, plus the number of records dropped
/// because their geometry was missing or could not be decoded.
#[derive(Debug, Default)]
pub struct QueryResult {
    pub features: Vec<AreaFeature>,
    pub skipped: usize,
}

/// Executes GetFeature requests.
///
/// The backend is asked for candidates (listing, or one `getArea` per
/// requested id); the filter is then applied to the decoded features.
pub struct FeatureQueryEngine<'a> {
    backend: &'a dyn AreaBackend,
    schema: &'a FeatureTypeSchema,
    fetch_concurrency: usize,
}

impl<'a> FeatureQueryEngine<'a> {
    pub fn new(
        backend: &'a dyn AreaBackend,
        schema: &'a FeatureTypeSchema,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            backend,
            schema,
            fetch_concurrency: fetch_concurrency.max(1),
        }
    }

    /// Whether the request addresses the area feature type. A request by
    /// feature id alone carries no type name and always does.
    pub fn addresses_schema(&self, request: &GetFeatureRequest) -> bool {
        request.type_names.is_empty()
            || request.type_names.iter().any(|name| self.schema.matches(name))
    }

    #[instrument(skip_all, fields(type_names = ?request.type_names))]
    pub async fn execute(
        &self,
        credentials: Option<&Credentials>,
        request: &GetFeatureRequest,
    ) -> WfsResult<QueryResult> {
        if !self.addresses_schema(request) {
            debug!("Type name does not match; returning an empty collection");
            return Ok(QueryResult::default());
        }

        let credentials = credentials.ok_or(WfsError::AuthenticationRequired)?;
        let session = self.backend.authenticate(credentials).await?;

        let records = match request.filter.as_ref().and_then(|f| f.feature_ids()) {
            Some(ids) => self.fetch_by_ids(&session, ids).await?,
            None => {
                let filter = AreaFilter {
                    bbox: request.filter.as_ref().and_then(|f| f.bbox_hint()),
                };
                self.backend.list_areas(&session, &filter).await?
            }
        };

        let mut result = QueryResult::default();
        for record in records {
            let id = record.id;
            let feature = match AreaFeature::try_from_record(record) {
                Ok(feature) if feature.geometry.is_some() => feature,
                Ok(_) => {
                    warn!(area_id = %id, "Skipping area without geometry");
                    result.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(area_id = %id, error = %e, "Skipping area with undecodable geometry");
                    result.skipped += 1;
                    continue;
                }
            };

            if request.filter.as_ref().map_or(true, |f| f.matches(&feature)) {
                result.features.push(feature);
            }
        }

        if let Some(max) = request.max_features {
            result.features.truncate(max);
        }

        debug!(
            returned = result.features.len(),
            skipped = result.skipped,
            "GetFeature complete"
        );
        Ok(result)
    }

    /// Fetch the requested ids concurrently, keeping request order. Ids the
    /// backend does not know are left out.
    async fn fetch_by_ids(
        &self,
        session: &Session,
        ids: &[AreaId],
    ) -> Result<Vec<AreaRecord>, BackendError> {
        let results: Vec<Result<AreaRecord, BackendError>> = stream::iter(ids.iter().copied())
            .map(|id| self.backend.get_area(session, id))
            .buffered(self.fetch_concurrency)
            .collect()
            .await;

        let mut records = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(BackendError::NotFound(id)) => debug!(area_id = %id, "Requested area not found"),
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }
}
