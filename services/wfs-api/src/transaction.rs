//! Transaction execution against the area backend.

use tracing::{debug, info, instrument, warn};

use wfs_common::{
    AreaBackend, AreaFeature, AreaId, BackendError, Credentials, Session, WfsError, WfsResult,
};
use wfs_protocol::{
    PropertyUpdate, TransactionAction, TransactionOutcome, TransactionRequest, TransactionResponse,
};

use crate::metrics;

/// Executes Transaction requests.
///
/// Sub-operations run one after another in request order, each backend call
/// finishing before the next starts, so an Update may refer to an id created
/// by an earlier Insert of the same request. There is no rollback: a failed
/// sub-operation is recorded and the rest of the batch still runs.
pub struct TransactionEngine<'a> {
    backend: &'a dyn AreaBackend,
}

impl<'a> TransactionEngine<'a> {
    pub fn new(backend: &'a dyn AreaBackend) -> Self {
        Self { backend }
    }

    #[instrument(skip_all, fields(handle = ?request.handle, actions = request.actions.len()))]
    pub async fn execute(
        &self,
        credentials: Option<&Credentials>,
        request: TransactionRequest,
    ) -> WfsResult<TransactionResponse> {
        let credentials = credentials.ok_or(WfsError::AuthenticationRequired)?;

        // A rejected login fails every sub-operation instead of the request.
        let session = self.backend.authenticate(credentials).await;

        let mut outcomes = Vec::with_capacity(request.actions.len());
        for (position, action) in request.actions.into_iter().enumerate() {
            let handle = action.handle().map(str::to_string);
            let kind = action.kind();

            let result = match &session {
                Ok(session) => self.apply(session, action).await,
                Err(e) => Err(e.to_string()),
            };

            match &result {
                Ok(id) => debug!(position, %kind, area_id = %id, "Sub-operation succeeded"),
                Err(reason) => warn!(position, %kind, handle = ?handle, reason = %reason, "Sub-operation failed"),
            }
            metrics::record_transaction_operation(kind, result.is_ok());

            outcomes.push(TransactionOutcome {
                position,
                handle,
                kind,
                result,
            });
        }

        let response = TransactionResponse {
            handle: request.handle,
            outcomes,
        };
        info!(
            operations = response.outcomes.len(),
            failed = response.failures().count(),
            "Transaction complete"
        );
        Ok(response)
    }

    async fn apply(&self, session: &Session, action: TransactionAction) -> Result<AreaId, String> {
        match action {
            TransactionAction::Insert { feature, .. } => self
                .backend
                .create_area(session, &feature)
                .await
                .map_err(|e| e.to_string()),
            TransactionAction::Update { id, properties, .. } => self
                .update(session, id, &properties)
                .await
                .map_err(|e| e.to_string()),
            TransactionAction::Delete { id, .. } => self
                .backend
                .delete_area(session, id)
                .await
                .map(|_| id)
                .map_err(|e| e.to_string()),
            TransactionAction::Rejected { reason, .. } => Err(reason),
        }
    }

    /// Partial update: merge the supplied properties into the stored area.
    async fn update(
        &self,
        session: &Session,
        id: AreaId,
        properties: &[PropertyUpdate],
    ) -> Result<AreaId, UpdateError> {
        let record = self.backend.get_area(session, id).await?;
        // A stored geometry that is about to be replaced is never decoded, so
        // an area with unreadable WKT can still be repaired.
        let mut feature = if properties.iter().any(PropertyUpdate::replaces_geometry) {
            AreaFeature::from_record_attributes(record)
        } else {
            AreaFeature::try_from_record(record)?
        };

        for property in properties {
            if !property.apply(&mut feature) {
                debug!(area_id = %id, property = %property.name, "Ignoring unknown property");
            }
        }

        self.backend.update_area(session, id, &feature).await?;
        Ok(id)
    }
}

/// Why an Update could not be applied.
#[derive(Debug, thiserror::Error)]
enum UpdateError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("stored geometry cannot be decoded: {0}")]
    StoredGeometry(#[from] wfs_common::GeometryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures::wkt;
    use test_utils::{BackendCall, InMemoryAreaBackend};
    use wfs_common::{Coord, Geometry};
    use wfs_protocol::{ActionKind, PropertyValue};

    fn insert(handle: &str, name: &str) -> TransactionAction {
        TransactionAction::Insert {
            handle: Some(handle.to_string()),
            feature: AreaFeature {
                name: name.to_string(),
                area_type: "other".to_string(),
                geometry: Some(Geometry::Point(Coord::new(-93.55, 41.65))),
                ..Default::default()
            },
        }
    }

    fn rename(id: u64, name: &str) -> TransactionAction {
        TransactionAction::Update {
            handle: None,
            id: AreaId(id),
            properties: vec![PropertyUpdate {
                name: "name".to_string(),
                value: PropertyValue::Text(name.to_string()),
            }],
        }
    }

    fn delete(id: u64) -> TransactionAction {
        TransactionAction::Delete {
            handle: None,
            id: AreaId(id),
        }
    }

    fn batch(actions: Vec<TransactionAction>) -> TransactionRequest {
        TransactionRequest {
            handle: None,
            actions,
        }
    }

    #[tokio::test]
    async fn test_insert_then_update_runs_in_order() {
        let backend = InMemoryAreaBackend::new("farmer", "secret");
        let engine = TransactionEngine::new(&backend);

        let response = engine
            .execute(
                Some(&backend.credentials()),
                batch(vec![insert("marker", "New Marker"), rename(1, "Renamed Marker")]),
            )
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.inserted_ids(), vec![AreaId(1)]);
        assert_eq!(
            backend.data_calls().await,
            vec![
                BackendCall::CreateArea("New Marker".to_string()),
                BackendCall::GetArea(AreaId(1)),
                BackendCall::UpdateArea(AreaId(1)),
            ]
        );

        let record = backend.record(AreaId(1)).await.unwrap();
        assert_eq!(record.name, "Renamed Marker");
        // Properties not named in the update are kept.
        assert_eq!(record.area_type, "other");
        assert_eq!(record.geometry.as_deref(), Some("POINT (-93.55 41.65)"));
    }

    #[tokio::test]
    async fn test_one_failure_among_three() {
        let backend = InMemoryAreaBackend::new("farmer", "secret");
        backend.seed("North Field", "field", Some(wkt::NORTH_FIELD)).await;
        backend.fail_writes_named("Forbidden").await;
        let engine = TransactionEngine::new(&backend);

        let response = engine
            .execute(
                Some(&backend.credentials()),
                batch(vec![
                    insert("a", "Orchard"),
                    insert("b", "Forbidden"),
                    delete(1),
                ]),
            )
            .await
            .unwrap();

        assert!(!response.is_success());
        assert_eq!(response.outcomes.len(), 3);
        assert!(response.outcomes[0].result.is_ok());
        assert!(response.outcomes[1].result.is_err());
        assert_eq!(response.outcomes[2].result, Ok(AreaId(1)));
        assert_eq!(response.failures().next().unwrap().locator(), "b");
    }

    #[tokio::test]
    async fn test_delete_missing_area_fails() {
        let backend = InMemoryAreaBackend::new("farmer", "secret");
        let engine = TransactionEngine::new(&backend);

        let response = engine
            .execute(Some(&backend.credentials()), batch(vec![delete(99999)]))
            .await
            .unwrap();

        assert!(!response.is_success());
        let failure = response.failures().next().unwrap();
        assert_eq!(failure.kind, ActionKind::Delete);
        assert!(failure.result.as_ref().unwrap_err().contains("99999"));
    }

    #[tokio::test]
    async fn test_update_of_missing_area_fails() {
        let backend = InMemoryAreaBackend::new("farmer", "secret");
        let engine = TransactionEngine::new(&backend);

        let response = engine
            .execute(Some(&backend.credentials()), batch(vec![rename(7, "Ghost")]))
            .await
            .unwrap();

        assert!(!response.is_success());
        assert!(!backend
            .data_calls()
            .await
            .contains(&BackendCall::UpdateArea(AreaId(7))));
    }

    #[tokio::test]
    async fn test_update_replaces_undecodable_geometry() {
        let backend = InMemoryAreaBackend::new("farmer", "secret");
        let id = backend.seed("Two plots", "field", Some(wkt::TWO_PLOTS)).await;
        let engine = TransactionEngine::new(&backend);

        let repair = TransactionAction::Update {
            handle: None,
            id,
            properties: vec![PropertyUpdate {
                name: "geometry".to_string(),
                value: PropertyValue::Geometry(Some(Geometry::Point(Coord::new(1.0, 2.0)))),
            }],
        };
        let response = engine
            .execute(Some(&backend.credentials()), batch(vec![repair]))
            .await
            .unwrap();

        assert!(response.is_success());
        let record = backend.record(id).await.unwrap();
        assert_eq!(record.name, "Two plots");
        assert_eq!(record.area_type, "field");
        assert_eq!(record.geometry.as_deref(), Some("POINT (1 2)"));
    }

    #[tokio::test]
    async fn test_rename_keeps_undecodable_geometry_untouched() {
        let backend = InMemoryAreaBackend::new("farmer", "secret");
        let id = backend.seed("Two plots", "field", Some(wkt::TWO_PLOTS)).await;
        let engine = TransactionEngine::new(&backend);

        let response = engine
            .execute(Some(&backend.credentials()), batch(vec![rename(id.0, "Plots")]))
            .await
            .unwrap();

        assert!(!response.is_success());
        assert!(!backend
            .data_calls()
            .await
            .contains(&BackendCall::UpdateArea(id)));
        assert_eq!(
            backend.record(id).await.unwrap().geometry.as_deref(),
            Some(wkt::TWO_PLOTS)
        );
    }

    #[tokio::test]
    async fn test_rejected_action_keeps_position() {
        let backend = InMemoryAreaBackend::new("farmer", "secret");
        let engine = TransactionEngine::new(&backend);

        let rejected = TransactionAction::Rejected {
            handle: None,
            kind: ActionKind::Unknown,
            reason: "unsupported action 'Native'".to_string(),
        };
        let response = engine
            .execute(
                Some(&backend.credentials()),
                batch(vec![rejected, insert("after", "Orchard")]),
            )
            .await
            .unwrap();

        assert_eq!(response.outcomes[0].locator(), "Unknown #1");
        assert!(response.outcomes[1].result.is_ok());
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_bad_login_fails_every_operation() {
        let backend = InMemoryAreaBackend::new("farmer", "secret");
        let engine = TransactionEngine::new(&backend);

        let response = engine
            .execute(
                Some(&Credentials::new("farmer", "wrong")),
                batch(vec![insert("a", "Orchard"), delete(1)]),
            )
            .await
            .unwrap();

        assert_eq!(response.failures().count(), 2);
        assert!(backend.data_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let backend = InMemoryAreaBackend::new("farmer", "secret");
        let engine = TransactionEngine::new(&backend);

        let err = engine
            .execute(None, batch(vec![delete(1)]))
            .await
            .unwrap_err();
        assert!(err.requires_authentication());
        assert!(backend.calls().await.is_empty());
    }
}
