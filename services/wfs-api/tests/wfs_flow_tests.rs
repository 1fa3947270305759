//! End-to-end WFS request tests against the router with an in-memory
//! backend.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use tower::ServiceExt;

use test_utils::fixtures::{gml, wkt};
use test_utils::{BackendCall, InMemoryAreaBackend};
use wfs_api::config::WfsConfig;
use wfs_api::state::AppState;
use wfs_common::{AreaBackend, AreaId};

struct TestServer {
    app: Router,
    backend: Arc<InMemoryAreaBackend>,
}

impl TestServer {
    fn new() -> Self {
        let backend = Arc::new(InMemoryAreaBackend::new("farmer", "secret"));
        let shared: Arc<dyn AreaBackend> = backend.clone();
        let state = Arc::new(AppState::new(shared, &WfsConfig::default()));
        Self {
            app: wfs_api::router(state),
            backend,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Option<String>, String) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, challenge, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn get(&self, query: &str) -> (StatusCode, String) {
        let request = Request::get(format!("/wfs?{}", query))
            .header(header::AUTHORIZATION, basic("farmer", "secret"))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }

    async fn post(&self, body: String) -> (StatusCode, String) {
        let request = Request::post("/wfs")
            .header(header::AUTHORIZATION, basic("farmer", "secret"))
            .header(header::CONTENT_TYPE, "text/xml")
            .body(Body::from(body))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }
}

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

const GET_AREAS: &str = "SERVICE=WFS&VERSION=1.0.0&REQUEST=GetFeature&TYPENAME=area";

// ============================================================================
// GetCapabilities / DescribeFeatureType
// ============================================================================

#[tokio::test]
async fn test_capabilities_need_no_backend() {
    let server = TestServer::new();
    let request = Request::get("/wfs?service=wfs&request=GetCapabilities")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = server.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<WFS_Capabilities"));
    assert_eq!(body.matches("<FeatureType>").count(), 1);
    assert!(body.contains("<Name>ms:area</Name>"));
    for operation in ["GetCapabilities", "DescribeFeatureType", "GetFeature", "Transaction"] {
        assert!(body.contains(&format!("<{}>", operation)), "{}", operation);
    }
    assert!(server.backend.calls().await.is_empty());
}

#[tokio::test]
async fn test_describe_feature_type() {
    let server = TestServer::new();
    let (status, body) = server
        .get("SERVICE=WFS&VERSION=1.0.0&REQUEST=DescribeFeatureType&TYPENAME=ms:area")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"<element name="area" type="ms:areaType""#));
    assert!(body.contains(r#"<element name="areaType""#));
    assert!(server.backend.calls().await.is_empty());
}

// ============================================================================
// GetFeature
// ============================================================================

#[tokio::test]
async fn test_get_feature_north_field() {
    let server = TestServer::new();
    server
        .backend
        .seed("North Field", "field", Some(wkt::NORTH_FIELD))
        .await;

    let (status, body) = server.get(GET_AREAS).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.matches("<gml:featureMember>").count(), 1);
    assert!(body.contains(r#"<ms:area fid="area.1">"#));
    assert!(body.contains("<ms:name>North Field</ms:name>"));
    assert!(body.contains(r#"<gml:Polygon srsName="EPSG:4326">"#));
    assert!(body.contains(
        "-93.62,42.03 -93.6,42.03 -93.6,42.05 -93.62,42.05 -93.62,42.03</gml:coordinates>"
    ));
}

#[tokio::test]
async fn test_get_feature_skips_malformed_record() {
    let server = TestServer::new();
    server.backend.seed("North Field", "field", Some(wkt::NORTH_FIELD)).await;
    server.backend.seed("Broken", "field", Some(wkt::GARBAGE)).await;
    server.backend.seed("Barn", "building", Some(wkt::BARN)).await;

    let (status, body) = server.get(GET_AREAS).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.matches("<gml:featureMember>").count(), 2);
    assert!(!body.contains("Broken"));
}

#[tokio::test]
async fn test_get_feature_bbox() {
    let server = TestServer::new();
    server.backend.seed("North Field", "field", Some(wkt::NORTH_FIELD)).await;
    server.backend.seed("Pond", "water", Some(wkt::PADDOCK_WITH_POND)).await;

    let (_, body) = server
        .get(&format!("{}&BBOX=-93.7,41.9,-93.5,42.1", GET_AREAS))
        .await;
    assert!(body.contains("North Field"));
    assert!(!body.contains("Pond"));
}

#[tokio::test]
async fn test_get_feature_type_mismatch_is_empty() {
    let server = TestServer::new();
    server.backend.seed("North Field", "field", Some(wkt::NORTH_FIELD)).await;

    let request = Request::get("/wfs?SERVICE=WFS&REQUEST=GetFeature&TYPENAME=ms:roads")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = server.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<wfs:FeatureCollection"));
    assert!(!body.contains("<gml:featureMember>"));
    assert!(server.backend.calls().await.is_empty());
}

#[tokio::test]
async fn test_get_feature_requires_credentials() {
    let server = TestServer::new();
    let request = Request::get(format!("/wfs?{}", GET_AREAS))
        .body(Body::empty())
        .unwrap();
    let (status, challenge, _) = server.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(challenge.unwrap().starts_with("Basic realm="));
}

#[tokio::test]
async fn test_get_feature_wrong_password_is_challenged() {
    let server = TestServer::new();
    let request = Request::get(format!("/wfs?{}", GET_AREAS))
        .header(header::AUTHORIZATION, basic("farmer", "wrong"))
        .body(Body::empty())
        .unwrap();
    let (status, challenge, _) = server.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(challenge.is_some());
}

#[tokio::test]
async fn test_get_feature_xml_post() {
    let server = TestServer::new();
    server.backend.seed("North Field", "field", Some(wkt::NORTH_FIELD)).await;
    server.backend.seed("Barn", "building", Some(wkt::BARN)).await;

    let body = format!(
        r#"<wfs:GetFeature service="WFS" version="1.0.0" {}><wfs:Query typeName="ms:area"><ogc:Filter><ogc:FeatureId fid="area.2"/></ogc:Filter></wfs:Query></wfs:GetFeature>"#,
        gml::NAMESPACES
    );
    let (status, body) = server.post(body).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<ms:name>Barn</ms:name>"));
    assert!(!body.contains("North Field"));
    assert_eq!(
        server.backend.data_calls().await,
        vec![BackendCall::GetArea(AreaId(2))]
    );
}

// ============================================================================
// Transaction
// ============================================================================

#[tokio::test]
async fn test_insert_new_marker_then_get_feature() {
    let server = TestServer::new();

    let (status, body) = server
        .post(gml::transaction(&gml::insert("marker", "New Marker", gml::POINT)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"<wfs:InsertResult handle="marker"><ogc:FeatureId fid="area.1"/></wfs:InsertResult>"#));
    assert!(body.contains("<wfs:SUCCESS/>"));

    let (_, body) = server
        .get("SERVICE=WFS&VERSION=1.0.0&REQUEST=GetFeature&FEATUREID=area.1")
        .await;
    assert!(body.contains(r#"fid="area.1""#));
    assert!(body.contains("<ms:name>New Marker</ms:name>"));
    assert!(body.contains("-93.55,41.65</gml:coordinates>"));
}

#[tokio::test]
async fn test_delete_missing_area() {
    let server = TestServer::new();

    let (status, body) = server
        .post(gml::transaction(&gml::delete("gone", "area.99999")))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<wfs:FAILED/>"));
    assert!(body.contains("<wfs:Locator>gone</wfs:Locator>"));
    assert_eq!(body.matches("<wfs:Message>").count(), 1);
    assert!(body.contains("99999"));
}

#[tokio::test]
async fn test_update_sees_id_from_earlier_insert() {
    let server = TestServer::new();

    let actions = [
        gml::insert("first", "New Marker", gml::POINT),
        gml::update("rename", "area.1", "ms:name", "Renamed Marker"),
    ]
    .concat();
    let (_, body) = server.post(gml::transaction(&actions)).await;

    assert!(body.contains("<wfs:SUCCESS/>"));
    assert_eq!(
        server.backend.data_calls().await,
        vec![
            BackendCall::CreateArea("New Marker".to_string()),
            BackendCall::GetArea(AreaId(1)),
            BackendCall::UpdateArea(AreaId(1)),
        ]
    );
    let record = server.backend.record(AreaId(1)).await.unwrap();
    assert_eq!(record.name, "Renamed Marker");
}

#[tokio::test]
async fn test_one_failure_among_three() {
    let server = TestServer::new();
    let existing = server
        .backend
        .seed("North Field", "field", Some(wkt::NORTH_FIELD))
        .await;
    server.backend.fail_writes_named("Forbidden").await;

    let actions = [
        gml::insert("orchard", "Orchard", gml::POINT),
        gml::insert("forbidden", "Forbidden", gml::POINT),
        gml::delete("cleanup", &existing.to_fid()),
    ]
    .concat();
    let (status, body) = server.post(gml::transaction(&actions)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<wfs:FAILED/>"));
    assert_eq!(body.matches("<wfs:InsertResult").count(), 1);
    assert!(body.contains(r#"<wfs:InsertResult handle="orchard">"#));
    assert!(body.contains("<wfs:Locator>forbidden</wfs:Locator>"));
    assert_eq!(body.matches("<wfs:Message>").count(), 1);

    // The delete after the failure still ran.
    assert!(server.backend.record(existing).await.is_none());
    assert_eq!(server.backend.len().await, 1);
}

#[tokio::test]
async fn test_transaction_requires_credentials() {
    let server = TestServer::new();
    let request = Request::post("/wfs")
        .body(Body::from(gml::transaction(&gml::delete("d", "area.1"))))
        .unwrap();
    let (status, challenge, _) = server.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(challenge.is_some());
    assert!(server.backend.calls().await.is_empty());
}

// ============================================================================
// Exceptions
// ============================================================================

#[tokio::test]
async fn test_unknown_operation() {
    let server = TestServer::new();
    let (status, body) = server.get("SERVICE=WFS&VERSION=1.0.0&REQUEST=LockFeature").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<ServiceExceptionReport"));
    assert!(body.contains(r#"code="OperationNotSupported""#));
}

#[tokio::test]
async fn test_wrong_version() {
    let server = TestServer::new();
    let (status, body) = server.get("SERVICE=WFS&VERSION=2.0.0&REQUEST=GetCapabilities").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"code="VersionNegotiationFailed""#));
}

#[tokio::test]
async fn test_wrong_service() {
    let server = TestServer::new();
    let (status, body) = server.get("SERVICE=WMS&REQUEST=GetCapabilities").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"code="InvalidParameterValue""#));
    assert!(body.contains(r#"locator="SERVICE""#));
}

#[tokio::test]
async fn test_malformed_xml() {
    let server = TestServer::new();
    let (status, body) = server.post("<wfs:Transaction".to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<ServiceExceptionReport"));
    assert!(server.backend.calls().await.is_empty());
}

#[tokio::test]
async fn test_non_utf8_body_is_an_exception_report() {
    let server = TestServer::new();
    let request = Request::post("/wfs")
        .header(header::AUTHORIZATION, basic("farmer", "secret"))
        .header(header::CONTENT_TYPE, "text/xml")
        .body(Body::from(vec![0x3c, 0xff, 0xfe, 0x3e]))
        .unwrap();
    let (status, challenge, body) = server.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(challenge.is_none());
    assert!(body.contains("<ServiceExceptionReport"));
    assert!(body.contains(r#"code="InvalidParameterValue""#));
    assert!(body.contains("not valid UTF-8"));
    assert!(server.backend.calls().await.is_empty());
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::new();
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, _, body) = server.send(request).await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["service"], "wfs-api");
}
