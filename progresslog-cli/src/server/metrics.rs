use std::sync::OnceLock;
use std::time::Instant;

use axum::extract::MatchedPath;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry
static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// All application metrics
pub struct Metrics {
    // Entries
    pub entries_created: IntCounterVec,
    pub entries_deleted: IntCounter,
    pub delete_rejected: IntCounterVec,

    // Storage
    pub storage_backend: IntGaugeVec,

    // HTTP request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    fn new(registry: &Registry) -> Self {
        let entries_created = IntCounterVec::new(
            Opts::new("progresslog_entries_created_total", "Progress entries stored"),
            &["status"],
        )
        .expect("failed to create entries_created metric");

        let entries_deleted = IntCounter::new(
            "progresslog_entries_deleted_total",
            "Progress entries removed by bulk delete",
        )
        .expect("failed to create entries_deleted metric");

        let delete_rejected = IntCounterVec::new(
            Opts::new("progresslog_delete_rejected_total", "Bulk deletes refused by the key check"),
            &["reason"],
        )
        .expect("failed to create delete_rejected metric");

        let storage_backend = IntGaugeVec::new(
            Opts::new("progresslog_storage_backend", "Storage backend type (1=active)"),
            &["type"],
        )
        .expect("failed to create storage_backend metric");

        let http_requests_total = IntCounterVec::new(
            Opts::new("progresslog_http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("failed to create http_requests_total metric");

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "progresslog_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["method", "path"],
        )
        .expect("failed to create http_request_duration metric");

        registry.register(Box::new(entries_created.clone())).expect("register entries_created");
        registry.register(Box::new(entries_deleted.clone())).expect("register entries_deleted");
        registry.register(Box::new(delete_rejected.clone())).expect("register delete_rejected");
        registry.register(Box::new(storage_backend.clone())).expect("register storage_backend");
        registry.register(Box::new(http_requests_total.clone())).expect("register http_requests_total");
        registry.register(Box::new(http_request_duration.clone())).expect("register http_request_duration");

        Self {
            entries_created,
            entries_deleted,
            delete_rejected,
            storage_backend,
            http_requests_total,
            http_request_duration,
        }
    }
}

/// Get the global metrics instance, initializing on first call
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = REGISTRY.get_or_init(Registry::new);
        Metrics::new(registry)
    })
}

/// Axum handler for GET /metrics, in Prometheus text format
pub async fn handle_metrics() -> Response {
    let _ = metrics();
    let registry = REGISTRY.get_or_init(Registry::new);
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Axum middleware that records HTTP request count and duration.
pub async fn track_metrics(request: Request<axum::body::Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    let m = metrics();
    m.http_requests_total
        .with_label_values(&[&method, &path, &status])
        .inc();
    m.http_request_duration
        .with_label_values(&[&method, &path])
        .observe(elapsed);

    response
}
