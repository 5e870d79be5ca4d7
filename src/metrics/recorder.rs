//! Metrics recording implementation using Prometheus.

use prometheus::{
    CounterVec, Encoder, HistogramVec, Opts, Registry, TextEncoder,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
};
use std::sync::Arc;

/// Trait for recording application metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records a handled inbound request with its outcome status.
    fn record_http_request(&self, method: &str, path: &str, status: &str);

    /// Records how long an inbound request took to handle.
    fn record_http_duration(&self, method: &str, path: &str, duration_secs: f64);

    /// Records a call made to the upstream API.
    fn record_upstream_request(&self, operation: &str, result: &str);

    /// Records a token acquisition attempt and what prompted it.
    fn record_token_refresh(&self, trigger: &str, result: &str);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Inbound HTTP metrics
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,

    // Upstream API metrics
    upstream_requests_total: CounterVec,

    // Token lifecycle metrics
    token_refreshes_total: CounterVec,
}

impl Metrics {
    /// Creates a new metrics instance with a Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        // Inbound HTTP metrics
        let http_requests_total = register_counter_vec_with_registry!(
            Opts::new("http_requests_total", "Total number of handled requests"),
            &["method", "path", "status"],
            registry.clone()
        )
        .expect("Failed to register http_requests_total");

        let http_request_duration_seconds = register_histogram_vec_with_registry!(
            "http_request_duration_seconds",
            "Inbound request handling duration in seconds",
            &["method", "path"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )
        .expect("Failed to register http_request_duration_seconds");

        // Upstream API metrics
        let upstream_requests_total = register_counter_vec_with_registry!(
            Opts::new(
                "upstream_requests_total",
                "Total number of calls to the upstream API"
            ),
            &["operation", "result"],
            registry.clone()
        )
        .expect("Failed to register upstream_requests_total");

        // Token lifecycle metrics
        let token_refreshes_total = register_counter_vec_with_registry!(
            Opts::new(
                "token_refreshes_total",
                "Total number of upstream token acquisition attempts"
            ),
            &["trigger", "result"],
            registry.clone()
        )
        .expect("Failed to register token_refreshes_total");

        Metrics {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            upstream_requests_total,
            token_refreshes_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("Failed to encode metrics");
        String::from_utf8(buffer).expect("Metrics encoding produced invalid UTF-8")
    }
}

impl MetricsRecorder for Metrics {
    fn record_http_request(&self, method: &str, path: &str, status: &str) {
        self.http_requests_total
            .with_label_values(&[method, path, status])
            .inc();
    }

    fn record_http_duration(&self, method: &str, path: &str, duration_secs: f64) {
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    fn record_upstream_request(&self, operation: &str, result: &str) {
        self.upstream_requests_total
            .with_label_values(&[operation, result])
            .inc();
    }

    fn record_token_refresh(&self, trigger: &str, result: &str) {
        self.token_refreshes_total
            .with_label_values(&[trigger, result])
            .inc();
    }
}
