//! farmOS area backend over the Drupal RestWS API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use wfs_common::{
    AreaBackend, AreaFeature, AreaFilter, AreaId, AreaRecord, BackendError, Credentials, Session,
};

use crate::model::{
    feature_to_term, parse_id, term_to_record, term_vocabulary, CreatedEntity, EntityPage,
    AREA_VOCABULARY,
};

const CSRF_HEADER: &str = "X-CSRF-Token";

/// Connection settings for a farmOS instance.
#[derive(Debug, Clone)]
pub struct FarmOsConfig {
    /// Base URL, e.g. `https://farm.example.org`.
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl FarmOsConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: concat!("farmos-wfs/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// [`AreaBackend`] backed by a farmOS server.
///
/// The client is shared by all requests. The only state it keeps is the
/// id of the area vocabulary, resolved on first use and immutable after.
pub struct FarmOsClient {
    client: Client,
    base_url: String,
    vocabulary_id: OnceCell<u64>,
}

impl FarmOsClient {
    pub fn new(config: FarmOsConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            vocabulary_id: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Attach the session cookie and CSRF token.
    fn authorized(&self, builder: RequestBuilder, session: &Session) -> RequestBuilder {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = session.cookie.as_deref().and_then(|c| HeaderValue::from_str(c).ok()) {
            headers.insert(COOKIE, cookie);
        }
        if let Some(token) = session.token.as_deref().and_then(|t| HeaderValue::from_str(t).ok()) {
            headers.insert(CSRF_HEADER, token);
        }
        builder.headers(headers)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        builder.send().await.map_err(|e| {
            warn!(error = %e, "farmOS request failed");
            BackendError::Transport(e.to_string())
        })
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }

    /// Resolve the `farm_areas` vocabulary id once.
    async fn area_vocabulary(&self, session: &Session) -> Result<u64, BackendError> {
        self.vocabulary_id
            .get_or_try_init(|| async {
                let request = self
                    .client
                    .get(self.url("taxonomy_vocabulary.json"))
                    .query(&[("machine_name", AREA_VOCABULARY)]);
                let response = self.send(self.authorized(request, session)).await?;
                let response = expect_status(response, StatusCode::OK, None).await?;
                let page: EntityPage = Self::read_json(response).await?;

                let vid = page
                    .list
                    .first()
                    .and_then(|v| v.get("vid"))
                    .and_then(parse_id)
                    .ok_or_else(|| {
                        BackendError::InvalidResponse(format!(
                            "vocabulary '{}' not found",
                            AREA_VOCABULARY
                        ))
                    })?;
                info!(vid, "Resolved farm area vocabulary");
                Ok(vid)
            })
            .await
            .copied()
    }

    async fn list_page(&self, session: &Session, page: u32) -> Result<EntityPage, BackendError> {
        let request = self.client.get(self.url("taxonomy_term.json")).query(&[
            ("bundle", AREA_VOCABULARY.to_string()),
            ("page", page.to_string()),
        ]);
        let response = self.send(self.authorized(request, session)).await?;
        let response = expect_status(response, StatusCode::OK, None).await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl AreaBackend for FarmOsClient {
    #[instrument(skip(self, credentials), fields(user = %credentials.username))]
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, BackendError> {
        let response = self
            .send(self.client.post(self.url("user/login")).form(&[
                ("name", credentials.username.as_str()),
                ("pass", credentials.password.as_str()),
                ("form_id", "user_login"),
            ]))
            .await?;

        // Drupal answers a successful login with a redirect; a failed one
        // re-renders the form with 200.
        if response.status() != StatusCode::FOUND {
            debug!(status = %response.status(), "Login rejected");
            return Err(BackendError::Authentication(format!(
                "login failed for '{}'",
                credentials.username
            )));
        }

        let cookie = session_cookie(response.headers());
        if cookie.is_none() {
            return Err(BackendError::Authentication(
                "login did not set a session cookie".to_string(),
            ));
        }

        let mut session = Session {
            username: credentials.username.clone(),
            cookie,
            token: None,
        };

        let request = self.client.get(self.url("restws/session/token"));
        let response = self.send(self.authorized(request, &session)).await?;
        if response.status() != StatusCode::OK {
            return Err(BackendError::Authentication(format!(
                "session token request failed with {}",
                response.status()
            )));
        }
        let token = response
            .text()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        session.token = Some(token.trim().to_string());

        debug!("Authenticated with farmOS");
        Ok(session)
    }

    #[instrument(skip(self, session, filter))]
    async fn list_areas(
        &self,
        session: &Session,
        filter: &AreaFilter,
    ) -> Result<Vec<AreaRecord>, BackendError> {
        if filter.bbox.is_some() {
            debug!("farmOS cannot filter by bounding box; listing all areas");
        }

        let mut records = Vec::new();
        let mut page = 0;
        loop {
            let current = self.list_page(session, page).await?;
            for term in &current.list {
                records.push(term_to_record(term)?);
            }
            if page >= current.last_page() {
                break;
            }
            page += 1;
        }

        info!(count = records.len(), pages = page + 1, "Listed farm areas");
        Ok(records)
    }

    #[instrument(skip(self, session), fields(area_id = %id))]
    async fn get_area(&self, session: &Session, id: AreaId) -> Result<AreaRecord, BackendError> {
        let request = self
            .client
            .get(self.url(&format!("taxonomy_term/{}.json", id)));
        let response = self.send(self.authorized(request, session)).await?;
        let response = expect_status(response, StatusCode::OK, Some(id)).await?;
        let term: Value = Self::read_json(response).await?;

        let vid = self.area_vocabulary(session).await?;
        if term_vocabulary(&term) != Some(vid) {
            debug!("Taxonomy term is not a farm area");
            return Err(BackendError::NotFound(id));
        }
        term_to_record(&term)
    }

    #[instrument(skip(self, session, feature), fields(name = %feature.name))]
    async fn create_area(
        &self,
        session: &Session,
        feature: &AreaFeature,
    ) -> Result<AreaId, BackendError> {
        let vid = self.area_vocabulary(session).await?;
        let request = self
            .client
            .post(self.url("taxonomy_term"))
            .json(&feature_to_term(feature, Some(vid)));
        let response = self.send(self.authorized(request, session)).await?;
        let response = expect_status(response, StatusCode::CREATED, None).await?;
        let created: CreatedEntity = Self::read_json(response).await?;

        parse_id(&created.id)
            .map(AreaId)
            .ok_or_else(|| BackendError::InvalidResponse(format!("invalid created id {}", created.id)))
    }

    #[instrument(skip(self, session, feature), fields(area_id = %id))]
    async fn update_area(
        &self,
        session: &Session,
        id: AreaId,
        feature: &AreaFeature,
    ) -> Result<(), BackendError> {
        let request = self
            .client
            .put(self.url(&format!("taxonomy_term/{}", id)))
            .json(&feature_to_term(feature, None));
        let response = self.send(self.authorized(request, session)).await?;
        expect_status(response, StatusCode::OK, Some(id)).await?;
        Ok(())
    }

    #[instrument(skip(self, session), fields(area_id = %id))]
    async fn delete_area(&self, session: &Session, id: AreaId) -> Result<(), BackendError> {
        let request = self.client.delete(self.url(&format!("taxonomy_term/{}", id)));
        let response = self.send(self.authorized(request, session)).await?;
        expect_status(response, StatusCode::OK, Some(id)).await?;
        Ok(())
    }
}

/// Map an unexpected status to a [`BackendError`].
async fn expect_status(
    response: Response,
    expected: StatusCode,
    id: Option<AreaId>,
) -> Result<Response, BackendError> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }

    match (status, id) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => Err(
            BackendError::Authentication(format!("farmOS refused access ({})", status)),
        ),
        (StatusCode::NOT_FOUND, Some(id)) => Err(BackendError::NotFound(id)),
        _ => {
            let mut message = response.text().await.unwrap_or_default();
            message.truncate(200);
            Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// `name=value` pairs of every cookie set by a response, joined for a
/// `Cookie` header.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}
