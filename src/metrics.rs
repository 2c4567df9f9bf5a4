//! Prometheus metrics for blobcheck.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides an axum middleware for HTTP
//! RED metrics, and exposes the `/metrics` endpoint handler.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use crate::checker::RoundTripResult;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "blobcheck_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "blobcheck_http_request_duration_seconds";

/// Completed round-trip checks (counter). Labels: result.
pub const ROUND_TRIPS_TOTAL: &str = "blobcheck_round_trips_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder.  Idempotent.
pub fn init_metrics() -> anyhow::Result<&'static PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// Register metric descriptions with the global recorder.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(ROUND_TRIPS_TOTAL, "Round-trip checks by result");
}

/// Count one finished round trip.
pub fn record_round_trip(result: &RoundTripResult) {
    counter!(ROUND_TRIPS_TOTAL, "result" => result.label()).increment(1);
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path, "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

/// Map a request path to a bounded label value.
fn normalize_path(path: &str) -> &'static str {
    match path {
        "/info" => "/info",
        "/ping" => "/ping",
        "/health" => "/health",
        "/openapi.json" => "/openapi.json",
        _ => "other",
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> Response {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::SizeOutcome;
    use crate::errors::CheckError;

    #[test]
    fn test_normalize_known_routes() {
        assert_eq!(normalize_path("/info"), "/info");
        assert_eq!(normalize_path("/ping"), "/ping");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_normalize_unknown_routes() {
        assert_eq!(normalize_path("/"), "other");
        assert_eq!(normalize_path("/ping/extra"), "other");
        assert_eq!(normalize_path("/some/random/path"), "other");
    }

    #[test]
    fn test_record_round_trip_counts_by_result() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let matched = RoundTripResult {
            outcome: Some(SizeOutcome::Match),
            ..Default::default()
        };
        let unbound = RoundTripResult {
            error: Some(CheckError::Unbound),
            ..Default::default()
        };
        metrics::with_local_recorder(&recorder, || {
            record_round_trip(&matched);
            record_round_trip(&matched);
            record_round_trip(&unbound);
        });

        let rendered = handle.render();
        assert!(
            rendered.contains(r#"blobcheck_round_trips_total{result="match"} 2"#),
            "{rendered}"
        );
        assert!(
            rendered.contains(r#"blobcheck_round_trips_total{result="unbound"} 1"#),
            "{rendered}"
        );
    }
}
