//! Axum router construction and route handlers.
//!
//! The [`app`] function wires the diagnostic endpoints and returns a
//! ready-to-serve [`axum::Router`].  `/ping` always answers 200: a failed
//! round trip is described in the body, never in the status code.

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

use crate::binding::ServiceDescriptor;
use crate::metrics::{metrics_handler, metrics_middleware, record_round_trip};
use crate::AppState;

// -- OpenAPI document ----------------------------------------------------------

/// OpenAPI documentation for the blobcheck endpoints.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "blobcheck",
        version = "0.1.0",
        description = "Blob service binding diagnostics"
    ),
    paths(health_check, service_info, ping),
    components(schemas(ServiceDescriptor)),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Diagnostics", description = "Binding diagnostics"),
    )
)]
struct ApiDoc;

/// Build the axum [`Router`] with all routes.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/info", get(service_info))
        .route("/ping", get(ping))
        .route("/openapi.json", get(openapi_json));

    if state.config.observability.metrics {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"status":"ok"}"#,
    )
}

// -- Diagnostics --------------------------------------------------------------

/// `GET /info` -- Describe the application and the service it looks for.
#[utoipa::path(
    get,
    path = "/info",
    tag = "Diagnostics",
    operation_id = "ServiceInfo",
    responses(
        (status = 200, description = "Service descriptor", body = ServiceDescriptor)
    )
)]
async fn service_info(State(state): State<Arc<AppState>>) -> Json<ServiceDescriptor> {
    info!(descriptor = ?state.descriptor, "Serving service descriptor");
    Json(state.descriptor.clone())
}

/// `GET /ping` -- Run the upload/download/delete round trip.
#[utoipa::path(
    get,
    path = "/ping",
    tag = "Diagnostics",
    operation_id = "Ping",
    responses(
        (status = 200, description = "Plain-text narrative of the round trip", content_type = "text/plain")
    )
)]
async fn ping(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.checker.check().await;
    record_round_trip(&report.result);
    info!(result = report.result.label(), "Round trip finished");
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        report.text(),
    )
}

/// `GET /openapi.json` -- The OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| *p == "/info"));
        assert!(paths.iter().any(|p| *p == "/ping"));
        assert!(paths.iter().any(|p| *p == "/health"));
    }
}
