pub mod http;
pub mod mock;

pub use self::http::HttpTransport;
pub use mock::{MockDataset, MockTransport};

use crate::error::{IntegrationError, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;

/// Build an endpoint path from raw segments, escaping each one.
///
/// `endpoint(["orders", "AB/1?x"])` yields `/orders/AB%2F1%3Fx`. Only
/// unreserved characters pass through unescaped.
pub fn endpoint<'a, I>(segments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    segments
        .into_iter()
        .map(|segment| format!("/{}", urlencoding::encode(segment)))
        .collect()
}

/// A single outbound call to a backend service
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub method: Method,
    pub endpoint: String,
    pub params: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl ServiceRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint, None)
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, endpoint, Some(body))
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, endpoint, Some(body))
    }

    fn new(method: Method, endpoint: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
            body,
        }
    }

    /// Add a query parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Reject paths that URL normalization would rewrite. Empty and dot
    /// segments never name a resource.
    pub fn validate(&self) -> Result<()> {
        let Some(path) = self.endpoint.strip_prefix('/') else {
            return Err(IntegrationError::InvalidRequest(format!(
                "endpoint must start with '/': {}",
                self.endpoint
            )));
        };

        let dot_segment = |s: &str| {
            let lowered = s.to_ascii_lowercase().replace("%2e", ".");
            lowered == "." || lowered == ".."
        };
        if path.split('/').any(|s| s.is_empty() || dot_segment(s)) {
            return Err(IntegrationError::InvalidRequest(format!(
                "unusable path segment in {}",
                self.endpoint
            )));
        }
        Ok(())
    }

    /// Only idempotent reads may be served from or written to the cache
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }
}

/// Raw response as received from the wire
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Parse the body as JSON. An empty body is `null`.
    pub fn parse_body(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Wire-level access to one backend service.
///
/// `send` returns `Ok` for every response that arrived, whatever its status;
/// `Err` means nothing usable came back (connection failure, timeout).
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Base identity of the remote, used as the cache namespace prefix
    fn base(&self) -> &str;

    async fn send(&self, request: &ServiceRequest) -> Result<TransportResponse>;
}
