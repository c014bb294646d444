use super::{ServiceRequest, Transport, TransportResponse};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// In-memory retail dataset shared by the mock transports
#[derive(Debug)]
pub struct MockDataset {
    orders: Mutex<BTreeMap<String, Value>>,
    products: BTreeMap<String, Value>,
    inventory: Mutex<BTreeMap<String, Value>>,
    stores: Vec<Value>,
}

impl Default for MockDataset {
    fn default() -> Self {
        let orders = BTreeMap::from([(
            "AB12345678".to_string(),
            json!({
                "order_number": "AB12345678",
                "status": "shipped",
                "estimated_delivery": "Tomorrow",
                "tracking_number": "TRK123456789",
                "shipping_address": "123 Main St, Anytown, USA"
            }),
        )]);

        let products = BTreeMap::from([(
            "iphone13".to_string(),
            json!({
                "name": "iPhone 13",
                "description": "Latest Apple smartphone with A15 Bionic chip",
                "price": 799.99,
                "specifications": {
                    "screen_size": "6.1 inches",
                    "storage": "128GB",
                    "color": "Blue"
                }
            }),
        )]);

        let inventory = BTreeMap::from([(
            "iphone13".to_string(),
            json!({
                "product_name": "iPhone 13",
                "available_quantity": 15,
                "restock_date": "2024-01-15"
            }),
        )]);

        let stores = vec![
            json!({
                "store_id": "downtown",
                "name": "Downtown Store",
                "address": "123 Main Street, Downtown",
                "phone": "(555) 123-4567",
                "hours": "Mon-Sat 9AM-9PM, Sun 10AM-6PM",
                "distance": "0.5 miles"
            }),
            json!({
                "store_id": "mall",
                "name": "Mall Location",
                "address": "456 Shopping Center Dr",
                "phone": "(555) 987-6543",
                "hours": "Mon-Sat 10AM-10PM, Sun 11AM-7PM",
                "distance": "2.3 miles"
            }),
        ];

        Self {
            orders: Mutex::new(orders),
            products,
            inventory: Mutex::new(inventory),
            stores,
        }
    }
}

impl MockDataset {
    fn orders(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inventory(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.inventory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer a request the way the real backends would
    fn route(&self, request: &ServiceRequest) -> TransportResponse {
        let decoded: Vec<Cow<'_, str>> = request
            .endpoint
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::decode(s).unwrap_or(Cow::Borrowed(s)))
            .collect();
        let segments: Vec<&str> = decoded.iter().map(|s| s.as_ref()).collect();

        match (&request.method, segments.as_slice()) {
            (&Method::GET, ["health"]) => ok(json!({"status": "healthy"})),

            (&Method::GET, ["orders", order_number]) => match self.orders().get(*order_number) {
                Some(order) => ok(order.clone()),
                None => not_found("Order not found"),
            },
            (&Method::PUT, ["orders", order_number, "status"]) => {
                self.update_order_status(order_number, request.body.as_ref())
            }

            (&Method::GET, ["inventory", product_id]) => match self.inventory().get(*product_id) {
                Some(item) => ok(item.clone()),
                None => ok(json!({"available_quantity": 0})),
            },
            (&Method::POST, ["inventory", product_id, "reserve"]) => {
                self.reserve(product_id, request.body.as_ref())
            }

            (&Method::GET, ["products", "search"]) => self.search_products(&request.params),
            (&Method::GET, ["products", product_id]) => match self.products.get(*product_id) {
                Some(product) => ok(product.clone()),
                None => not_found("Product not found"),
            },

            (&Method::GET, ["stores", "search"]) => ok(json!({"stores": self.stores})),
            (&Method::GET, ["stores", store_id]) => {
                match self.stores.iter().find(|s| s["store_id"] == *store_id) {
                    Some(store) => ok(store.clone()),
                    None => not_found("Store not found"),
                }
            }

            _ => not_found("Endpoint not found"),
        }
    }

    fn update_order_status(&self, order_number: &str, body: Option<&Value>) -> TransportResponse {
        let Some(status) = body.and_then(|b| b.get("status")).and_then(Value::as_str) else {
            return error(400, "status is required");
        };

        let mut orders = self.orders();
        match orders.get_mut(order_number) {
            Some(order) => {
                order["status"] = Value::String(status.to_string());
                ok(json!({"order_number": order_number, "status": status}))
            }
            None => not_found("Order not found"),
        }
    }

    fn reserve(&self, product_id: &str, body: Option<&Value>) -> TransportResponse {
        let Some(quantity) = body.and_then(|b| b.get("quantity")).and_then(Value::as_u64) else {
            return error(400, "quantity must be a non-negative integer");
        };

        let mut inventory = self.inventory();
        let Some(item) = inventory.get_mut(product_id) else {
            return not_found("Product not found");
        };

        let available = item["available_quantity"].as_u64().unwrap_or(0);
        if quantity > available {
            return error(409, "Insufficient stock");
        }

        let remaining = available - quantity;
        item["available_quantity"] = json!(remaining);
        ok(json!({
            "product_id": product_id,
            "reserved": quantity,
            "remaining": remaining
        }))
    }

    fn search_products(&self, params: &BTreeMap<String, String>) -> TransportResponse {
        let query = params
            .get("query")
            .map(|q| q.to_lowercase())
            .unwrap_or_default();
        let limit = params
            .get("limit")
            .and_then(|l| l.parse::<usize>().ok())
            .unwrap_or(10);

        let matches: Vec<Value> = self
            .products
            .iter()
            .filter(|(id, product)| {
                let name = product["name"].as_str().unwrap_or_default().to_lowercase();
                let description = product["description"]
                    .as_str()
                    .unwrap_or_default()
                    .to_lowercase();
                id.contains(&query) || name.contains(&query) || description.contains(&query)
            })
            .take(limit)
            .map(|(id, product)| {
                let mut product = product.clone();
                product["product_id"] = json!(id);
                product
            })
            .collect();

        ok(json!({"products": matches}))
    }
}

fn ok(body: Value) -> TransportResponse {
    TransportResponse::json(200, &body)
}

fn not_found(message: &str) -> TransportResponse {
    error(404, message)
}

fn error(status: u16, message: &str) -> TransportResponse {
    TransportResponse::json(status, &json!({"error": message}))
}

/// Deterministic stand-in for one backend service
#[derive(Debug, Clone)]
pub struct MockTransport {
    base: String,
    dataset: std::sync::Arc<MockDataset>,
    latency: Duration,
}

impl MockTransport {
    pub fn new(service: &str, dataset: std::sync::Arc<MockDataset>, latency: Duration) -> Self {
        Self {
            base: format!("mock://{}", service),
            dataset,
            latency,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn base(&self) -> &str {
        &self.base
    }

    async fn send(&self, request: &ServiceRequest) -> Result<TransportResponse> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let response = self.dataset.route(request);
        debug!(
            base = %self.base,
            method = %request.method,
            endpoint = %request.endpoint,
            status = response.status,
            "Mock backend responded"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn transport() -> MockTransport {
        MockTransport::new("order", Arc::new(MockDataset::default()), Duration::ZERO)
    }

    async fn send(transport: &MockTransport, request: ServiceRequest) -> TransportResponse {
        transport.send(&request).await.unwrap()
    }

    #[tokio::test]
    async fn test_known_order() {
        let response = send(&transport(), ServiceRequest::get("/orders/AB12345678")).await;
        assert_eq!(response.status, 200);

        let body = response.parse_body().unwrap();
        assert_eq!(body["status"], "shipped");
        assert_eq!(body["tracking_number"], "TRK123456789");
    }

    #[tokio::test]
    async fn test_escaped_segment_stays_one_identifier() {
        let transport = transport();

        let response = send(&transport, ServiceRequest::get("/orders/AB12345678%2Fstatus")).await;
        assert_eq!(response.status, 404);

        let response = send(&transport, ServiceRequest::get("/orders/AB12345678%3Fx%3D1")).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_unknown_order_is_404() {
        let response = send(&transport(), ServiceRequest::get("/orders/ZZ00000000")).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_unknown_inventory_reports_zero() {
        let response = send(&transport(), ServiceRequest::get("/inventory/pixel7")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.parse_body().unwrap()["available_quantity"], 0);
    }

    #[tokio::test]
    async fn test_search_is_not_treated_as_id() {
        let transport = transport();

        let response = send(
            &transport,
            ServiceRequest::get("/products/search").with_param("query", "Apple"),
        )
        .await;
        let body = response.parse_body().unwrap();
        assert_eq!(body["products"][0]["product_id"], "iphone13");

        let response = send(&transport, ServiceRequest::get("/stores/search")).await;
        let stores = response.parse_body().unwrap()["stores"].clone();
        assert_eq!(stores.as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_reservation_decrements_stock() {
        let transport = transport();

        let response = send(
            &transport,
            ServiceRequest::post("/inventory/iphone13/reserve", json!({"quantity": 5})),
        )
        .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.parse_body().unwrap()["remaining"], 10);

        let response = send(
            &transport,
            ServiceRequest::post("/inventory/iphone13/reserve", json!({"quantity": 11})),
        )
        .await;
        assert_eq!(response.status, 409);

        let response = send(&transport, ServiceRequest::get("/inventory/iphone13")).await;
        assert_eq!(response.parse_body().unwrap()["available_quantity"], 10);
    }

    #[tokio::test]
    async fn test_status_update_is_persisted() {
        let transport = transport();

        let response = send(
            &transport,
            ServiceRequest::put("/orders/AB12345678/status", json!({"status": "cancelled"})),
        )
        .await;
        assert_eq!(response.status, 200);

        let response = send(&transport, ServiceRequest::get("/orders/AB12345678")).await;
        assert_eq!(response.parse_body().unwrap()["status"], "cancelled");

        let response = send(
            &transport,
            ServiceRequest::put("/orders/AB12345678/status", json!({})),
        )
        .await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_store_details_and_health() {
        let transport = transport();

        let response = send(&transport, ServiceRequest::get("/stores/mall")).await;
        assert_eq!(response.parse_body().unwrap()["name"], "Mall Location");

        let response = send(&transport, ServiceRequest::get("/health")).await;
        assert!(response.is_success());

        let response = send(&transport, ServiceRequest::get("/unknown")).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_synthetic_latency() {
        let transport =
            MockTransport::new("store", Arc::new(MockDataset::default()), Duration::from_millis(50));

        let start = std::time::Instant::now();
        send(&transport, ServiceRequest::get("/health")).await;
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(transport.base(), "mock://store");
    }
}
