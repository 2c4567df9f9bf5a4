//! Integration tests for the diagnostic HTTP API.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use blobcheck::binding::{self, Binding, PlatformEnv, ServiceDescriptor};
use blobcheck::checker::RoundTripChecker;
use blobcheck::config::{CheckConfig, Config};
use blobcheck::storage::backend::ObjectStore;
use blobcheck::storage::memory::MemoryObjectStore;
use blobcheck::AppState;
use tempfile::TempDir;
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

const VCAP_APPLICATION: &str = r#"{
    "name": "blob-tester",
    "application_uris": ["blob-tester.apps.example.com"]
}"#;

const VCAP_SERVICES: &str = r#"{
    "blobstore": [{
        "name": "my-blob",
        "label": "blobstore",
        "plan": "Tiered",
        "credentials": {
            "access_key_id": "AKID",
            "secret_access_key": "secret",
            "url": "http://10.0.0.5:9000/bucket-1",
            "bucket_name": "bucket-1",
            "host": "10.0.0.5:9000"
        }
    }]
}"#;

struct TestApp {
    router: Router,
    store: Arc<MemoryObjectStore>,
    check: CheckConfig,
    _dir: TempDir,
}

fn platform() -> PlatformEnv {
    PlatformEnv::from_lookup(|name| match name {
        "VCAP_APPLICATION" => Some(VCAP_APPLICATION.to_string()),
        "VCAP_SERVICES" => Some(VCAP_SERVICES.to_string()),
        _ => None,
    })
    .unwrap()
}

fn test_app(bound: bool) -> TestApp {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let fixture_path = dir.path().join("tasmanian_devil.png");
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.resize(2048, 7);
    std::fs::write(&fixture_path, data).unwrap();

    let mut config = Config::default();
    config.observability.metrics = false;
    config.binding.service_label = "blobstore".to_string();
    config.binding.service_plan = "Tiered".to_string();
    config.check = CheckConfig {
        fixture_path,
        scratch_path: dir.path().join("outfile.png"),
        unique_object_key: false,
    };

    let platform = platform();
    let resolved = binding::resolve(&platform, "blobstore", "us-east-1").unwrap();
    assert!(matches!(resolved, Binding::Bound(_)));

    let store = Arc::new(MemoryObjectStore::new());
    let handle: Option<Arc<dyn ObjectStore>> = if bound {
        let shared: Arc<dyn ObjectStore> = store.clone();
        Some(shared)
    } else {
        None
    };

    let state = Arc::new(AppState {
        descriptor: ServiceDescriptor::from_platform(&platform, &config.binding),
        checker: RoundTripChecker::new(handle, config.check.clone()),
        config: config.clone(),
    });

    TestApp {
        router: blobcheck::server::app(state),
        store,
        check: config.check,
        _dir: dir,
    }
}

async fn get(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = test_app(true);
    let (status, _, body) = get(app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn test_info_returns_descriptor_json() {
    let app = test_app(true);
    let (status, content_type, body) = get(app.router, "/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));

    let descriptor: ServiceDescriptor = serde_json::from_str(&body).unwrap();
    assert_eq!(
        descriptor,
        ServiceDescriptor {
            app_name: "blob-tester".to_string(),
            app_uri: "blob-tester.apps.example.com".to_string(),
            service_name: "blobstore".to_string(),
            plan_name: "Tiered".to_string(),
        }
    );

    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 4);
    for key in ["appName", "appUri", "serviceName", "planName"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_ping_round_trip() {
    let app = test_app(true);
    let (status, content_type, body) = get(app.router, "/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
    assert!(body.contains("I uploaded my file to the blobstore: tasmanian_devil.png"));
    assert!(body.contains("File sizes match: 2048 bytes in, and 2048 bytes out!!"));
    assert!(body.contains("Everything is fine"));
    assert!(app.store.is_empty().await);
    assert!(!app.check.scratch_path.exists());
}

#[tokio::test]
async fn test_ping_unbound_is_still_200() {
    let app = test_app(false);
    let (status, _, body) = get(app.router, "/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "Sorry, but I'm not bound to a Blob instance.  Please bind me!\n"
    );
}

#[tokio::test]
async fn test_ping_missing_fixture_is_still_200() {
    let app = test_app(true);
    std::fs::remove_file(&app.check.fixture_path).unwrap();
    let (status, _, body) = get(app.router, "/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Sorry, I could not open my test file to upload"));
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_openapi_document() {
    let app = test_app(true);
    let (status, _, body) = get(app.router, "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(doc["paths"].get("/ping").is_some());
    assert!(doc["paths"].get("/info").is_some());
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let app = test_app(true);
    let (status, _, _) = get(app.router, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = test_app(true);
    let (status, _, _) = get(app.router, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
