use super::{ServiceRequest, Transport, TransportResponse};
use crate::error::{IntegrationError, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

const CLIENT_USER_AGENT: &str = concat!("retail-integration/", env!("CARGO_PKG_VERSION"));

/// HTTP transport for a live backend service
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for `base_url`. The bearer credential is attached to every call.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(IntegrationError::Config(
                "Backend base URL cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntegrationError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn base(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: &ServiceRequest) -> Result<TransportResponse> {
        let url = self.url(&request.endpoint);
        debug!(method = %request.method, url = %url, "Sending backend request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT);

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_empty_base_url_rejected() {
        let result = HttpTransport::new("", None, Duration::from_secs(1));
        assert!(matches!(result, Err(IntegrationError::Config(_))));
    }

    #[tokio::test]
    async fn test_sends_credentials_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/AB12345678"))
            .and(query_param("customer_id", "c-42"))
            .and(header("authorization", "Bearer s3cret"))
            .and(header("content-type", "application/json"))
            .and(header("user-agent", CLIENT_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "shipped"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(
            format!("{}/", server.uri()),
            Some(Secret::new("s3cret".to_string())),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(transport.base(), server.uri());

        let request = ServiceRequest::get("/orders/AB12345678").with_param("customer_id", "c-42");
        let response = transport.send(&request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.parse_body().unwrap()["status"], "shipped");
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/orders/X1/status"))
            .and(body_json(json!({"status": "cancelled"})))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), None, Duration::from_secs(5)).unwrap();
        let request = ServiceRequest::put("/orders/X1/status", json!({"status": "cancelled"}));
        let response = transport.send(&request).await.unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(response.body, "maintenance");
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        // Nothing listens on port 9 on loopback
        let transport =
            HttpTransport::new("http://127.0.0.1:9", None, Duration::from_secs(2)).unwrap();
        let result = transport.send(&ServiceRequest::get("/health")).await;

        assert!(result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let transport =
            HttpTransport::new(server.uri(), None, Duration::from_millis(50)).unwrap();
        let result = transport.send(&ServiceRequest::get("/health")).await;

        assert!(result.unwrap_err().is_timeout());
    }
}
