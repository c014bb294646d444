use super::{join_details, normalize, probe_status, text_field, BackendService, ServiceKind, ServiceStatus};
use crate::client::{CallResult, ServiceClient};
use crate::error::Result;
use crate::transport::{endpoint, ServiceRequest};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

/// Normalized order lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderInfo {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
}

impl OrderInfo {
    pub fn not_found() -> Self {
        Self {
            found: false,
            order_number: None,
            status: None,
            additional_info: None,
        }
    }

    fn from_wire(order_number: &str, data: &Value) -> Self {
        let mut details = Vec::new();
        if let Some(delivery) = text_field(data, "estimated_delivery") {
            details.push(format!("Estimated delivery: {}", delivery));
        }
        if let Some(tracking) = text_field(data, "tracking_number") {
            details.push(format!("Tracking: {}", tracking));
        }
        if let Some(address) = text_field(data, "shipping_address") {
            details.push(format!("Shipping to: {}", address));
        }

        Self {
            found: true,
            order_number: Some(
                text_field(data, "order_number").unwrap_or_else(|| order_number.to_string()),
            ),
            status: Some(text_field(data, "status").unwrap_or_else(|| "unknown".to_string())),
            additional_info: Some(join_details(details, "No additional details available.")),
        }
    }
}

/// Order management system adapter
#[derive(Debug)]
pub struct OrderService {
    client: ServiceClient,
}

impl OrderService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    /// Look up an order, optionally scoped to a customer
    pub async fn get_order(
        &self,
        order_number: &str,
        customer_id: Option<&str>,
    ) -> CallResult<OrderInfo> {
        let mut request = ServiceRequest::get(endpoint(["orders", order_number]));
        if let Some(customer_id) = customer_id {
            request = request.with_param("customer_id", customer_id);
        }

        let result = self.client.execute(request).await;
        normalize(
            result,
            |data| OrderInfo::from_wire(order_number, data),
            OrderInfo::not_found,
        )
    }

    /// Change an order's status. Never cached.
    pub async fn update_order_status(&self, order_number: &str, status: &str) -> CallResult<Value> {
        let request = ServiceRequest::put(
            endpoint(["orders", order_number, "status"]),
            json!({ "status": status }),
        );
        self.client.execute(request).await
    }
}

#[async_trait]
impl BackendService for OrderService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Order
    }

    async fn health_check(&self) -> Result<ServiceStatus> {
        probe_status(&self.client).await
    }
}
