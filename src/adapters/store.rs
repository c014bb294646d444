use super::{normalize, probe_status, text_field, BackendService, ServiceKind, ServiceStatus};
use crate::client::{CallResult, ServiceClient};
use crate::error::Result;
use crate::transport::{endpoint, ServiceRequest};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Default search radius in miles
pub const DEFAULT_RADIUS: u32 = 25;

/// One store as presented to the chatbot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSummary {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub hours: Option<String>,
    pub distance: Option<String>,
}

impl StoreSummary {
    fn from_wire(data: &Value) -> Self {
        Self {
            name: text_field(data, "name").unwrap_or_else(|| "Store".to_string()),
            address: text_field(data, "address")
                .unwrap_or_else(|| "Address not available".to_string()),
            phone: text_field(data, "phone"),
            hours: text_field(data, "hours"),
            distance: text_field(data, "distance"),
        }
    }
}

/// Store locator adapter
#[derive(Debug)]
pub struct StoreService {
    client: ServiceClient,
}

impl StoreService {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    /// Stores near `location`, in the order the backend ranked them
    pub async fn find_stores(&self, location: &str, radius: u32) -> CallResult<Vec<StoreSummary>> {
        let request = ServiceRequest::get("/stores/search")
            .with_param("location", location)
            .with_param("radius", radius);

        let result = self.client.execute(request).await;
        normalize(
            result,
            |data| {
                data.get("stores")
                    .and_then(Value::as_array)
                    .map(|stores| stores.iter().map(StoreSummary::from_wire).collect())
                    .unwrap_or_default()
            },
            Vec::new,
        )
    }

    pub async fn get_store_details(&self, store_id: &str) -> CallResult<Option<StoreSummary>> {
        let request = ServiceRequest::get(endpoint(["stores", store_id]));
        let result = self.client.execute(request).await;
        normalize(result, |data| Some(StoreSummary::from_wire(data)), || None)
    }
}

#[async_trait]
impl BackendService for StoreService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Store
    }

    async fn health_check(&self) -> Result<ServiceStatus> {
        probe_status(&self.client).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_defaults() {
        let store = StoreSummary::from_wire(&json!({"phone": "(555) 000-0000"}));
        assert_eq!(store.name, "Store");
        assert_eq!(store.address, "Address not available");
        assert_eq!(store.phone.as_deref(), Some("(555) 000-0000"));
        assert_eq!(store.hours, None);
    }
}
