use crate::adapters::ServiceKind;
use crate::cache::{CacheConfig, CacheKey, ResponseCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryExecutor};
use crate::error::{IntegrationError, Result};
use crate::metrics::CallTimer;
use crate::transport::{ServiceRequest, Transport, TransportResponse};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of one adapter call. Failures are values, never panics or raised errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallResult<T = Value> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<Duration>,
    pub served_from_cache: bool,
}

impl<T> CallResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status_code: None,
            latency: None,
            served_from_cache: false,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status_code: None,
            latency: None,
            served_from_cache: false,
        }
    }

    pub fn with_status(mut self, status_code: Option<u16>) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn from_cache(mut self) -> Self {
        self.served_from_cache = true;
        self
    }

    /// The backend answered 404 for the requested entity
    pub fn is_not_found(&self) -> bool {
        !self.success && self.status_code == Some(404)
    }

    /// Replace the payload, keeping success, status and timing metadata
    pub fn with_data<U>(self, data: Option<U>) -> CallResult<U> {
        CallResult {
            success: self.success,
            data,
            error: self.error,
            status_code: self.status_code,
            latency: self.latency,
            served_from_cache: self.served_from_cache,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallResult<U> {
        let CallResult {
            success,
            data,
            error,
            status_code,
            latency,
            served_from_cache,
        } = self;
        CallResult {
            success,
            data: data.map(f),
            error,
            status_code,
            latency,
            served_from_cache,
        }
    }
}

/// Per-service call policy resolved from configuration
#[derive(Debug, Clone)]
pub struct ClientPolicy {
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub health_path: String,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            health_path: "/health".to_string(),
        }
    }
}

enum Delivery {
    Success { status: u16, body: Value },
    NotFound { body: String },
}

/// Resilient client for a single backend service.
///
/// Owns exactly one breaker and one cache namespace. Reads go cache first,
/// then through the breaker with retries; mutations skip the cache and are
/// sent once.
#[derive(Debug)]
pub struct ServiceClient {
    service: ServiceKind,
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
    cache: ResponseCache,
    retry: RetryExecutor,
    timeout: Duration,
    health_path: String,
}

impl ServiceClient {
    pub fn new(service: ServiceKind, transport: Arc<dyn Transport>, policy: ClientPolicy) -> Self {
        Self {
            breaker: CircuitBreaker::new(service.as_str(), policy.circuit_breaker),
            cache: ResponseCache::new(service.as_str(), &policy.cache),
            retry: RetryExecutor::new(policy.retry),
            timeout: policy.timeout,
            health_path: policy.health_path,
            transport,
            service,
        }
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Perform one logical call and describe the outcome.
    ///
    /// A 404 is reported with `success: false` and `status_code: 404` but is
    /// not counted against the breaker; adapters treat it as domain absence.
    pub async fn execute(&self, request: ServiceRequest) -> CallResult<Value> {
        let timer = CallTimer::start(self.service.as_str(), request.method.as_str());
        if let Err(e) = request.validate() {
            let latency = timer.finish("invalid");
            warn!(service = %self.service, error = %e, "Refusing to send request");
            return CallResult::failure(e.to_string()).with_latency(latency);
        }

        let cacheable = request.is_cacheable();
        let key = (cacheable && self.cache.is_enabled()).then(|| {
            CacheKey::new(self.transport.base(), &request.endpoint, request.params.iter())
        });

        if let Some(key) = &key {
            if let Some(value) = self.cache.get(key).await {
                let latency = timer.finish("cache_hit");
                return CallResult::ok(value).from_cache().with_latency(latency);
            }
        }

        let outcome = self
            .breaker
            .call(|| self.dispatch(&request, cacheable))
            .await;

        match outcome {
            Ok(Delivery::Success { status, body }) => {
                if let Some(key) = key {
                    self.cache.put(key, body.clone()).await;
                }
                let latency = timer.finish("success");
                CallResult::ok(body)
                    .with_status(Some(status))
                    .with_latency(latency)
            }
            Ok(Delivery::NotFound { body }) => {
                let latency = timer.finish("not_found");
                debug!(
                    service = %self.service,
                    endpoint = %request.endpoint,
                    "Backend reported entity not found"
                );
                CallResult::failure(format!("HTTP 404: {}", body))
                    .with_status(Some(404))
                    .with_latency(latency)
            }
            Err(e) => {
                let outcome = match e {
                    IntegrationError::CircuitOpen(_) => "rejected",
                    IntegrationError::Timeout(_) => "timeout",
                    _ => "error",
                };
                let latency = timer.finish(outcome);
                warn!(
                    service = %self.service,
                    method = %request.method,
                    endpoint = %request.endpoint,
                    error = %e,
                    "Backend call failed"
                );
                CallResult::failure(e.to_string())
                    .with_status(e.status_code())
                    .with_latency(latency)
            }
        }
    }

    /// Send the health probe, bypassing cache and breaker
    pub async fn probe(&self) -> Result<TransportResponse> {
        self.send_once(&ServiceRequest::get(self.health_path.as_str()))
            .await
    }

    async fn dispatch(&self, request: &ServiceRequest, retryable: bool) -> Result<Delivery> {
        if !retryable {
            return self.deliver(request).await;
        }

        self.retry
            .execute(move || self.deliver(request), IntegrationError::is_retryable)
            .await
    }

    async fn deliver(&self, request: &ServiceRequest) -> Result<Delivery> {
        let response = self.send_once(request).await?;

        match response.status {
            200..=299 => Ok(Delivery::Success {
                status: response.status,
                body: response.parse_body()?,
            }),
            404 => Ok(Delivery::NotFound {
                body: response.body,
            }),
            status => Err(IntegrationError::Http {
                status,
                body: response.body,
            }),
        }
    }

    async fn send_once(&self, request: &ServiceRequest) -> Result<TransportResponse> {
        match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(Err(IntegrationError::Timeout(_))) | Err(_) => {
                Err(IntegrationError::Timeout(self.timeout))
            }
            Ok(result) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;
    use crate::transport::{MockDataset, MockTransport};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport that answers every call with a fixed status and counts calls
    #[derive(Debug)]
    struct ScriptedTransport {
        status: u16,
        body: Value,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(status: u16, body: Value) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn base(&self) -> &str {
            "scripted://backend"
        }

        async fn send(&self, _request: &ServiceRequest) -> Result<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse::json(self.status, &self.body))
        }
    }

    fn fast_policy() -> ClientPolicy {
        ClientPolicy {
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
                backoff_multiplier: 2.0,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 2,
                cool_down_secs: 60,
            },
            ..Default::default()
        }
    }

    fn mock_client(service: ServiceKind) -> ServiceClient {
        let transport = MockTransport::new(
            service.as_str(),
            Arc::new(MockDataset::default()),
            Duration::ZERO,
        );
        ServiceClient::new(service, Arc::new(transport), fast_policy())
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let transport = ScriptedTransport::new(200, json!({"status": "shipped"}));
        let client = ServiceClient::new(ServiceKind::Order, transport.clone(), fast_policy());

        let first = client.execute(ServiceRequest::get("/orders/1")).await;
        assert!(first.success);
        assert!(!first.served_from_cache);
        assert_eq!(first.status_code, Some(200));

        let second = client.execute(ServiceRequest::get("/orders/1")).await;
        assert!(second.served_from_cache);
        assert_eq!(second.data, Some(json!({"status": "shipped"})));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_still_retries_reads() {
        let transport = ScriptedTransport::new(503, json!({"error": "maintenance"}));
        let mut policy = fast_policy();
        policy.cache.enabled = false;
        let client = ServiceClient::new(ServiceKind::Product, transport.clone(), policy);

        let result = client.execute(ServiceRequest::get("/products/x")).await;
        assert!(!result.success);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_refused_before_breaker() {
        let transport = ScriptedTransport::new(200, json!({}));
        let client = ServiceClient::new(ServiceKind::Order, transport.clone(), fast_policy());

        let result = client
            .execute(ServiceRequest::get(crate::transport::endpoint(["orders", ".."])))
            .await;
        assert!(!result.success);
        assert_eq!(transport.calls(), 0);
        assert_eq!(client.breaker().metrics().total_requests, 0);
    }

    #[tokio::test]
    async fn test_mutations_bypass_cache() {
        let transport = ScriptedTransport::new(200, json!({"status": "cancelled"}));
        let client = ServiceClient::new(ServiceKind::Order, transport.clone(), fast_policy());

        for _ in 0..2 {
            let result = client
                .execute(ServiceRequest::put(
                    "/orders/1/status",
                    json!({"status": "cancelled"}),
                ))
                .await;
            assert!(result.success);
            assert!(!result.served_from_cache);
        }

        assert_eq!(transport.calls(), 2);
        assert_eq!(client.cache().stats().entry_count, 0);
    }

    #[tokio::test]
    async fn test_not_found_is_not_a_breaker_failure() {
        let client = mock_client(ServiceKind::Order);

        for _ in 0..3 {
            let result = client.execute(ServiceRequest::get("/orders/missing")).await;
            assert!(result.is_not_found());
        }

        assert_eq!(client.breaker().state(), CircuitState::Closed);
        assert_eq!(client.breaker().snapshot().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_open_circuit() {
        let transport = ScriptedTransport::new(503, json!({"error": "maintenance"}));
        let client = ServiceClient::new(ServiceKind::Inventory, transport.clone(), fast_policy());

        let result = client.execute(ServiceRequest::get("/inventory/x")).await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(503));
        // Initial attempt plus two retries, one breaker failure
        assert_eq!(transport.calls(), 3);
        assert_eq!(client.breaker().snapshot().consecutive_failures, 1);

        client.execute(ServiceRequest::get("/inventory/x")).await;
        assert_eq!(client.breaker().state(), CircuitState::Open);

        let rejected = client.execute(ServiceRequest::get("/inventory/x")).await;
        assert!(!rejected.success);
        assert!(rejected
            .error
            .as_deref()
            .is_some_and(|e| e.contains("Circuit breaker is open")));
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let transport = ScriptedTransport::new(400, json!({"error": "bad request"}));
        let client = ServiceClient::new(ServiceKind::Product, transport.clone(), fast_policy());

        let result = client.execute(ServiceRequest::get("/products/x")).await;
        assert_eq!(result.status_code, Some(400));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_probe_skips_breaker_and_cache() {
        let transport = ScriptedTransport::new(200, json!({"status": "healthy"}));
        let client = ServiceClient::new(ServiceKind::Store, transport.clone(), fast_policy());

        for _ in 0..2 {
            let admission = client.breaker().try_admit().unwrap();
            client.breaker().record_failure(admission);
        }
        assert_eq!(client.breaker().state(), CircuitState::Open);

        let response = client.probe().await.unwrap();
        assert!(response.is_success());
        client.probe().await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn test_call_result_map_keeps_metadata() {
        let result = CallResult::ok(2)
            .with_status(Some(200))
            .with_latency(Duration::from_millis(5))
            .map(|n| n * 10);

        assert_eq!(result.data, Some(20));
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.latency, Some(Duration::from_millis(5)));

        let failed: CallResult<u32> = CallResult::failure("boom").with_status(Some(404));
        assert!(failed.is_not_found());
        assert_eq!(failed.map(|n| n + 1).data, None);
    }
}
