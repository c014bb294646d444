use crate::adapters::ServiceStatus;
use crate::circuit_breaker::CircuitState;
use crate::error::{IntegrationError, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Install the global Prometheus recorder. Only one recorder can exist per process.
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            IntegrationError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        // Backend call metrics
        describe_counter!(
            "integration_backend_calls_total",
            "Total number of backend calls by outcome"
        );
        describe_histogram!(
            "integration_backend_call_duration_seconds",
            "Backend call latencies in seconds, including retries"
        );
        describe_gauge!(
            "integration_backend_health",
            "Backend health (0 = healthy, 1 = degraded, 2 = unavailable)"
        );

        // Cache metrics
        describe_counter!(
            "integration_cache_lookups_total",
            "Response cache lookups by result"
        );

        // Circuit breaker metrics
        describe_gauge!(
            "integration_circuit_breaker_state",
            "Circuit breaker state (0 = closed, 1 = open, 2 = half-open)"
        );
        describe_counter!(
            "integration_circuit_breaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );

        // Orchestrator metrics
        describe_counter!(
            "integration_requests_total",
            "Chatbot requests processed by intent and outcome"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl std::fmt::Debug for MetricsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsService").finish_non_exhaustive()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<Option<MetricsService>>) -> Response {
    match service {
        Some(service) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            service.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Record a completed backend call
pub fn record_backend_call(service: &str, method: &str, outcome: &str, duration: f64) {
    let labels = [
        ("service", service.to_string()),
        ("method", method.to_string()),
        ("outcome", outcome.to_string()),
    ];

    counter!("integration_backend_calls_total", &labels).increment(1);
    histogram!("integration_backend_call_duration_seconds", &labels).record(duration);
}

/// Record backend health status
pub fn record_backend_health(service: &str, status: ServiceStatus) {
    let labels = [("service", service.to_string())];
    let value = match status {
        ServiceStatus::Healthy => 0.0,
        ServiceStatus::Degraded => 1.0,
        ServiceStatus::Unavailable => 2.0,
    };
    gauge!("integration_backend_health", &labels).set(value);
}

/// Record a cache lookup
pub fn record_cache_lookup(service: &str, hit: bool) {
    let labels = [
        ("service", service.to_string()),
        ("result", if hit { "hit" } else { "miss" }.to_string()),
    ];
    counter!("integration_cache_lookups_total", &labels).increment(1);
}

/// Record circuit breaker transition and the resulting state gauge
pub fn record_circuit_breaker_transition(service: &str, from: CircuitState, to: CircuitState) {
    let labels = [
        ("service", service.to_string()),
        ("from", from.to_string()),
        ("to", to.to_string()),
    ];
    counter!("integration_circuit_breaker_transitions_total", &labels).increment(1);

    let labels = [("service", service.to_string())];
    gauge!("integration_circuit_breaker_state", &labels).set(to.as_gauge());
}

/// Record a processed chatbot request
pub fn record_request(intent: &str, outcome: &str) {
    let labels = [
        ("intent", intent.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!("integration_requests_total", &labels).increment(1);
}

/// Timer for measuring backend call duration
pub struct CallTimer {
    start: Instant,
    service: String,
    method: String,
}

impl CallTimer {
    /// Start a new timer for a backend call
    pub fn start(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            service: service.into(),
            method: method.into(),
        }
    }

    /// Record the call with the given outcome and return the elapsed time
    pub fn finish(self, outcome: &str) -> Duration {
        let elapsed = self.start.elapsed();
        record_backend_call(&self.service, &self.method, outcome, elapsed.as_secs_f64());
        elapsed
    }
}
