//! In-memory area backend for engine and HTTP tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

use wfs_common::{
    AreaBackend, AreaFeature, AreaFilter, AreaId, AreaRecord, BackendError, Credentials, Session,
};

const SESSION_COOKIE: &str = "SESSmemory=1";
const SESSION_TOKEN: &str = "memory-token";

/// One call made against the backend, in the order received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Authenticate(String),
    ListAreas,
    GetArea(AreaId),
    CreateArea(String),
    UpdateArea(AreaId),
    DeleteArea(AreaId),
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    areas: BTreeMap<AreaId, AreaRecord>,
    calls: Vec<BackendCall>,
    failing_names: HashSet<String>,
    unavailable: bool,
}

/// [`AreaBackend`] holding records in memory.
///
/// Ids are assigned sequentially from 1. Only the configured credentials
/// authenticate. Writes of features whose name was registered with
/// [`fail_writes_named`](Self::fail_writes_named) are rejected, which lets
/// tests provoke a failure in the middle of a transaction.
pub struct InMemoryAreaBackend {
    credentials: Credentials,
    state: Mutex<State>,
}

impl InMemoryAreaBackend {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            credentials: Credentials::new(username, password),
            state: Mutex::new(State {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Credentials the backend accepts.
    pub fn credentials(&self) -> Credentials {
        self.credentials.clone()
    }

    /// Store a record as-is (its geometry may be deliberately broken) and
    /// return its id.
    pub async fn seed(&self, name: &str, area_type: &str, wkt: Option<&str>) -> AreaId {
        let mut state = self.state.lock().await;
        let id = AreaId(state.next_id);
        state.next_id += 1;
        state.areas.insert(
            id,
            AreaRecord {
                id,
                name: name.to_string(),
                area_type: area_type.to_string(),
                description: String::new(),
                geometry: wkt.map(str::to_string),
            },
        );
        id
    }

    pub async fn fail_writes_named(&self, name: &str) {
        self.state.lock().await.failing_names.insert(name.to_string());
    }

    /// Make every data call fail with a transport error.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    pub async fn record(&self, id: AreaId) -> Option<AreaRecord> {
        self.state.lock().await.areas.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.areas.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().await.calls.clone()
    }

    /// Calls other than authentication, which tests usually ignore.
    pub async fn data_calls(&self) -> Vec<BackendCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| !matches!(c, BackendCall::Authenticate(_)))
            .collect()
    }

    fn check_session(&self, state: &State, session: &Session) -> Result<(), BackendError> {
        if session.username != self.credentials.username
            || session.token.as_deref() != Some(SESSION_TOKEN)
        {
            return Err(BackendError::Authentication("invalid session".to_string()));
        }
        if state.unavailable {
            return Err(BackendError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_write(state: &State, feature: &AreaFeature) -> Result<(), BackendError> {
        if state.failing_names.contains(&feature.name) {
            return Err(BackendError::Rejected {
                status: 422,
                message: format!("name '{}' is not allowed", feature.name),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AreaBackend for InMemoryAreaBackend {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, BackendError> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(BackendCall::Authenticate(credentials.username.clone()));

        if *credentials != self.credentials {
            return Err(BackendError::Authentication(format!(
                "login failed for '{}'",
                credentials.username
            )));
        }
        Ok(Session {
            username: credentials.username.clone(),
            cookie: Some(SESSION_COOKIE.to_string()),
            token: Some(SESSION_TOKEN.to_string()),
        })
    }

    async fn list_areas(
        &self,
        session: &Session,
        _filter: &AreaFilter,
    ) -> Result<Vec<AreaRecord>, BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::ListAreas);
        self.check_session(&state, session)?;
        Ok(state.areas.values().cloned().collect())
    }

    async fn get_area(&self, session: &Session, id: AreaId) -> Result<AreaRecord, BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::GetArea(id));
        self.check_session(&state, session)?;
        state.areas.get(&id).cloned().ok_or(BackendError::NotFound(id))
    }

    async fn create_area(
        &self,
        session: &Session,
        feature: &AreaFeature,
    ) -> Result<AreaId, BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::CreateArea(feature.name.clone()));
        self.check_session(&state, session)?;
        Self::check_write(&state, feature)?;

        let id = AreaId(state.next_id);
        state.next_id += 1;
        state.areas.insert(id, AreaRecord::from_feature(id, feature));
        Ok(id)
    }

    async fn update_area(
        &self,
        session: &Session,
        id: AreaId,
        feature: &AreaFeature,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::UpdateArea(id));
        self.check_session(&state, session)?;
        Self::check_write(&state, feature)?;

        match state.areas.get_mut(&id) {
            Some(record) => {
                *record = AreaRecord::from_feature(id, feature);
                Ok(())
            }
            None => Err(BackendError::NotFound(id)),
        }
    }

    async fn delete_area(&self, session: &Session, id: AreaId) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::DeleteArea(id));
        self.check_session(&state, session)?;
        state
            .areas
            .remove(&id)
            .map(|_| ())
            .ok_or(BackendError::NotFound(id))
    }
}
