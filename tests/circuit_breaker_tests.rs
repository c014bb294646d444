use retail_integration::adapters::{OrderService, ServiceKind, StoreService};
use retail_integration::circuit_breaker::{CircuitBreakerConfig, CircuitState, RetryConfig};
use retail_integration::client::{ClientPolicy, ServiceClient};
use retail_integration::transport::HttpTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn policy(failure_threshold: u32, cool_down_secs: u64) -> ClientPolicy {
    ClientPolicy {
        timeout: Duration::from_millis(500),
        retry: RetryConfig::default().with_max_retries(0),
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold,
            cool_down_secs,
        },
        ..Default::default()
    }
}

fn client(kind: ServiceKind, server: &MockServer, policy: ClientPolicy) -> ServiceClient {
    let transport = HttpTransport::new(server.uri(), None, policy.timeout).unwrap();
    ServiceClient::new(kind, Arc::new(transport), policy)
}

#[tokio::test]
async fn test_open_circuit_makes_no_network_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/AB12345678"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .expect(3)
        .mount(&server)
        .await;

    let orders = OrderService::new(client(ServiceKind::Order, &server, policy(3, 60)));

    // Record failures
    for _ in 0..3 {
        let result = orders.get_order("AB12345678", None).await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(500));
    }
    assert_eq!(orders.client().breaker().state(), CircuitState::Open);

    // Rejected without reaching the backend; wiremock verifies the count on drop
    let result = orders.get_order("AB12345678", None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Circuit breaker is open"));
    assert_eq!(orders.client().breaker().metrics().rejected_requests, 1);
}

#[tokio::test]
async fn test_half_open_trial_closes_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stores/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stores/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "stores": [{"name": "Airport Kiosk", "address": "Terminal 2"}]
        })))
        .mount(&server)
        .await;

    let stores = StoreService::new(client(ServiceKind::Store, &server, policy(2, 1)));

    for _ in 0..2 {
        assert!(!stores.find_stores("Seattle", 25).await.success);
    }
    assert_eq!(stores.client().breaker().state(), CircuitState::Open);

    // Wait for the cool-down to elapse
    sleep(Duration::from_millis(1100)).await;

    let result = stores.find_stores("Seattle", 25).await;
    assert!(result.success);
    assert_eq!(result.data.unwrap()[0].name, "Airport Kiosk");

    let snapshot = stores.client().breaker().snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.consecutive_failures, 0);
}

#[tokio::test]
async fn test_half_open_failure_reopens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let orders = OrderService::new(client(ServiceKind::Order, &server, policy(1, 1)));

    orders.get_order("X1", None).await;
    assert_eq!(orders.client().breaker().state(), CircuitState::Open);
    let first_failure = orders.client().breaker().snapshot().last_failure_at.unwrap();

    sleep(Duration::from_millis(1100)).await;
    orders.get_order("X1", None).await;

    let snapshot = orders.client().breaker().snapshot();
    assert_eq!(snapshot.state, CircuitState::Open);
    assert!(snapshot.last_failure_at.unwrap() > first_failure);
}

#[tokio::test]
async fn test_services_do_not_share_breakers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/X1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stores/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"stores": []})))
        .mount(&server)
        .await;

    let orders = OrderService::new(client(ServiceKind::Order, &server, policy(2, 60)));
    let stores = StoreService::new(client(ServiceKind::Store, &server, policy(2, 60)));

    for _ in 0..2 {
        orders.get_order("X1", None).await;
    }

    assert_eq!(orders.client().breaker().state(), CircuitState::Open);
    assert_eq!(stores.client().breaker().state(), CircuitState::Closed);
    assert!(stores.find_stores("Seattle", 25).await.success);
}

#[tokio::test]
async fn test_timeouts_count_toward_threshold() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let mut slow_policy = policy(2, 60);
    slow_policy.timeout = Duration::from_millis(100);
    let orders = OrderService::new(client(ServiceKind::Order, &server, slow_policy));

    for _ in 0..2 {
        let result = orders.get_order("X1", None).await;
        assert!(result.error.unwrap().contains("timeout"));
    }

    let metrics = orders.client().breaker().metrics();
    assert_eq!(metrics.timeout_count, 2);
    assert_eq!(metrics.failed_requests, 2);
    assert_eq!(metrics.circuit_opened_count, 1);
}
