use super::{normalize, probe_status, text_field, BackendService, ServiceKind, ServiceStatus};
use crate::client::{CallResult, ServiceClient};
use crate::error::Result;
use crate::transport::{endpoint, ServiceRequest};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

/// Normalized stock record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryInfo {
    pub product_name: String,
    pub in_stock: bool,
    pub quantity: u64,
    pub restock_date: Option<String>,
}

impl InventoryInfo {
    /// Zero-stock record for a product the backend does not know
    pub fn unknown(product_id: &str) -> Self {
        Self {
            product_name: product_id.to_string(),
            in_stock: false,
            quantity: 0,
            restock_date: Some("Unknown".to_string()),
        }
    }

    fn from_wire(product_id: &str, data: &Value) -> Self {
        // Negative or non-numeric quantities are treated as none on hand
        let quantity = data
            .get("available_quantity")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        Self {
            product_name: text_field(data, "product_name")
                .unwrap_or_else(|| product_id.to_string()),
            in_stock: quantity > 0,
            quantity,
            restock_date: text_field(data, "restock_date"),
        }
    }
}

/// Inventory management system adapter
#[derive(Debug)]
pub struct InventoryService {
    client: ServiceClient,
}

impl InventoryService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub async fn check_availability(
        &self,
        product_id: &str,
        location: Option<&str>,
    ) -> CallResult<InventoryInfo> {
        let mut request = ServiceRequest::get(endpoint(["inventory", product_id]));
        if let Some(location) = location {
            request = request.with_param("location", location);
        }

        let result = self.client.execute(request).await;
        normalize(
            result,
            |data| InventoryInfo::from_wire(product_id, data),
            || InventoryInfo::unknown(product_id),
        )
    }

    /// Hold stock for an order. Never cached or retried.
    pub async fn reserve_inventory(&self, product_id: &str, quantity: u32) -> CallResult<Value> {
        let request = ServiceRequest::post(
            endpoint(["inventory", product_id, "reserve"]),
            json!({ "quantity": quantity }),
        );
        self.client.execute(request).await
    }
}

#[async_trait]
impl BackendService for InventoryService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Inventory
    }

    async fn health_check(&self) -> Result<ServiceStatus> {
        probe_status(&self.client).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_stock_follows_quantity() {
        let info = InventoryInfo::from_wire(
            "pixel7",
            &json!({"available_quantity": 0, "restock_date": "2024-02-01"}),
        );
        assert_eq!(info.product_name, "pixel7");
        assert!(!info.in_stock);
        assert_eq!(info.restock_date.as_deref(), Some("2024-02-01"));

        let info = InventoryInfo::from_wire("pixel7", &json!({"available_quantity": 3}));
        assert!(info.in_stock);
        assert_eq!(info.quantity, 3);
        assert_eq!(info.restock_date, None);
    }

    #[test]
    fn test_negative_quantity_is_out_of_stock() {
        let info = InventoryInfo::from_wire("x", &json!({"available_quantity": -2}));
        assert_eq!(info.quantity, 0);
        assert!(!info.in_stock);
    }

    #[test]
    fn test_unknown_product() {
        let value = serde_json::to_value(InventoryInfo::unknown("galaxys22")).unwrap();
        assert_eq!(
            value,
            json!({
                "product_name": "galaxys22",
                "in_stock": false,
                "quantity": 0,
                "restock_date": "Unknown"
            })
        );
    }
}
