use super::{join_details, normalize, probe_status, text_field, BackendService, ServiceKind, ServiceStatus};
use crate::client::{CallResult, ServiceClient};
use crate::error::Result;
use crate::transport::{endpoint, ServiceRequest};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Normalized product lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductInfo {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Raw price as displayed, kept for pricing answers
    #[serde(skip)]
    pub price: Option<String>,
}

impl ProductInfo {
    pub fn not_found() -> Self {
        Self {
            found: false,
            name: None,
            details: None,
            price: None,
        }
    }

    fn from_wire(product_id: &str, data: &Value) -> Self {
        let price = text_field(data, "price");

        let mut details = Vec::new();
        if let Some(description) = text_field(data, "description") {
            details.push(description);
        }
        if let Some(price) = &price {
            details.push(format!("Price: ${}", price));
        }
        if let Some(Value::Object(specs)) = data.get("specifications") {
            if !specs.is_empty() {
                // Specifications render in key order
                let sorted: BTreeMap<&String, &Value> = specs.iter().collect();
                let specs: Vec<String> = sorted
                    .into_iter()
                    .map(|(k, v)| match v {
                        Value::String(s) => format!("{}: {}", k, s),
                        other => format!("{}: {}", k, other),
                    })
                    .collect();
                details.push(format!("Specifications: {}", specs.join(", ")));
            }
        }

        Self {
            found: true,
            name: Some(text_field(data, "name").unwrap_or_else(|| product_id.to_string())),
            details: Some(join_details(details, "No details available.")),
            price,
        }
    }
}

/// Product information system adapter
#[derive(Debug)]
pub struct ProductService {
    client: ServiceClient,
}

impl ProductService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub async fn get_product_info(&self, product_id: &str) -> CallResult<ProductInfo> {
        let request = ServiceRequest::get(endpoint(["products", product_id]));
        let result = self.client.execute(request).await;
        normalize(
            result,
            |data| ProductInfo::from_wire(product_id, data),
            ProductInfo::not_found,
        )
    }

    /// Free-text product search, returned as the backend shaped it
    pub async fn search_products(&self, query: &str, limit: u32) -> CallResult<Value> {
        let request = ServiceRequest::get("/products/search")
            .with_param("query", query)
            .with_param("limit", limit);
        self.client.execute(request).await
    }
}

#[async_trait]
impl BackendService for ProductService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Product
    }

    async fn health_check(&self) -> Result<ServiceStatus> {
        probe_status(&self.client).await
    }
}
