//! WFS endpoint: request parsing, dispatch and response encoding.

use axum::{
    body::Bytes,
    extract::{Extension, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use wfs_common::{Credentials, WfsError, WfsResult};
use wfs_protocol::{
    describe_feature_types, encode_feature_collection, exception_report, parse_xml_request,
    GetFeatureRequest, TransactionRequest, WfsKvpParams, WfsRequest, XML_MIMETYPE,
};

use crate::auth;
use crate::metrics;
use crate::query::FeatureQueryEngine;
use crate::state::AppState;
use crate::transaction::TransactionEngine;

/// GET /wfs - KVP-encoded request
#[instrument(skip_all)]
pub async fn wfs_get_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let request = WfsKvpParams::from_query_pairs(pairs).into_request();
    dispatch(&state, auth::basic_credentials(&headers), request).await
}

/// POST /wfs - XML-encoded request
///
/// A POST without a body is treated as KVP, using its query string.
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn wfs_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let credentials = auth::basic_credentials(&headers);

    let body = match std::str::from_utf8(&body) {
        Ok(body) => body,
        Err(e) => {
            let err = WfsError::MalformedXml(format!("request body is not valid UTF-8: {}", e));
            return dispatch(&state, credentials, Err(err)).await;
        }
    };

    let request = if body.trim().is_empty() {
        let params = WfsKvpParams::from_query_pairs(pairs);
        if params.is_empty() {
            Err(WfsError::MalformedXml("empty request body".to_string()))
        } else {
            params.into_request()
        }
    } else {
        parse_xml_request(body, &state.schemas)
    };

    dispatch(&state, credentials, request).await
}

async fn dispatch(
    state: &AppState,
    credentials: Option<Credentials>,
    request: WfsResult<WfsRequest>,
) -> Response {
    let request = match request {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    let operation = request.operation();
    metrics::record_request(operation);
    debug!(operation, "Dispatching WFS request");

    let result = match request {
        WfsRequest::GetCapabilities => Ok(xml_response(state.capabilities.clone())),
        WfsRequest::DescribeFeatureType(describe) => Ok(xml_response(describe_feature_types(
            &state.schemas,
            &describe.type_names,
        ))),
        WfsRequest::GetFeature(query) => get_feature(state, credentials.as_ref(), &query).await,
        WfsRequest::Transaction(transaction) => {
            execute_transaction(state, credentials.as_ref(), transaction).await
        }
    };

    result.unwrap_or_else(|e| error_response(&e))
}

async fn get_feature(
    state: &AppState,
    credentials: Option<&Credentials>,
    request: &GetFeatureRequest,
) -> WfsResult<Response> {
    let schema = state.schemas.area();
    let engine = FeatureQueryEngine::new(state.backend.as_ref(), schema, state.fetch_concurrency);
    let result = engine.execute(credentials, request).await?;

    metrics::record_features(result.features.len(), result.skipped);
    info!(
        returned = result.features.len(),
        skipped = result.skipped,
        "GetFeature"
    );

    Ok(xml_response(encode_feature_collection(
        schema,
        &result.features,
        &state.public_url,
    )))
}

async fn execute_transaction(
    state: &AppState,
    credentials: Option<&Credentials>,
    request: TransactionRequest,
) -> WfsResult<Response> {
    let engine = TransactionEngine::new(state.backend.as_ref());
    let response = engine.execute(credentials, request).await?;
    Ok(xml_response(response.encode()))
}

fn xml_response(body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, XML_MIMETYPE)], body).into_response()
}

/// Exceptions are reported with HTTP 200, except for missing or rejected
/// credentials, which get a Basic challenge so clients prompt the user.
fn error_response(err: &WfsError) -> Response {
    if err.requires_authentication() {
        debug!(error = %err, "Requesting credentials");
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, auth::challenge())],
            "Authentication required",
        )
            .into_response();
    }

    let code = err.wfs_exception_code();
    warn!(code, error = %err, "WFS exception");
    metrics::record_exception(code);
    xml_response(exception_report(err))
}
