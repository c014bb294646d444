pub mod backends;
pub mod intent;
pub mod response;

pub use backends::Backends;
pub use intent::{Context, Entities, Intent};
pub use response::{BackendResponse, PricingInfo};

use crate::adapters::{ServiceKind, ServiceStatus};
use crate::adapters::store::DEFAULT_RADIUS;
use crate::client::CallResult;
use crate::config::{BackendMode, IntegrationConfig};
use crate::error::Result;
use crate::healthcheck::{HealthAggregator, HealthReport};
use crate::metrics;
use futures::FutureExt;
use intent::{first_entity, product_id, DEFAULT_LOCATION, LOCATION_KEYS, ORDER_KEYS, PRODUCT_KEYS};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

const PROMOTION_NOTE: &str = "Check our website for current promotions";

/// Routes classified intents to the domain adapters.
///
/// `process` never fails: every adapter failure, missing entity and unknown
/// intent comes back as a structured [`BackendResponse`].
#[derive(Debug)]
pub struct BackendIntegrator {
    backends: Backends,
    health: Arc<HealthAggregator>,
    mode: BackendMode,
}

impl BackendIntegrator {
    pub fn new(backends: Backends, health: Arc<HealthAggregator>, mode: BackendMode) -> Self {
        Self {
            backends,
            health,
            mode,
        }
    }

    /// Build adapters and the health aggregator for the configured mode
    pub fn from_config(config: &IntegrationConfig) -> Result<Self> {
        let backends = Backends::from_config(config)?;
        let health = Arc::new(HealthAggregator::new(
            backends.services(),
            config.health_check.timeout(),
        ));

        info!(mode = ?config.backend_mode, "Backend integrator initialized");
        Ok(Self::new(backends, health, config.backend_mode))
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub fn health(&self) -> &Arc<HealthAggregator> {
        &self.health
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    /// Serve one chatbot request
    pub async fn process(
        &self,
        intent: &str,
        entities: &Entities,
        context: &Context,
        customer_id: Option<&str>,
    ) -> BackendResponse {
        let request_id = Uuid::new_v4();
        let span = info_span!("backend_request", request_id = %request_id, intent = %intent);

        async move {
            // Context is only logged
            let context_keys: Vec<&str> = context.keys().map(String::as_str).collect();
            debug!(
                ?context_keys,
                entity_types = entities.len(),
                has_customer = customer_id.is_some(),
                "Processing backend request"
            );

            let parsed = Intent::parse(intent);
            let response = match parsed {
                Some(parsed) => {
                    let routed = AssertUnwindSafe(self.route(parsed, entities, customer_id))
                        .catch_unwind()
                        .await;
                    routed.unwrap_or_else(|_| {
                        error!("Backend request handler panicked");
                        BackendResponse::NotAvailable {
                            error: "Internal error while contacting backend services".to_string(),
                        }
                    })
                }
                None => {
                    warn!("Unsupported intent");
                    BackendResponse::unsupported(intent)
                }
            };

            let label = parsed.map(|i| i.as_str()).unwrap_or("unsupported");
            metrics::record_request(label, response.outcome());
            info!(outcome = response.outcome(), "Backend request completed");
            response
        }
        .instrument(span)
        .await
    }

    /// Current health of every backend, probed now
    pub async fn health_status(&self) -> BTreeMap<ServiceKind, ServiceStatus> {
        self.health.status().await
    }

    pub async fn health_report(&self) -> HealthReport {
        self.health.report().await
    }

    async fn route(
        &self,
        intent: Intent,
        entities: &Entities,
        customer_id: Option<&str>,
    ) -> BackendResponse {
        match intent {
            Intent::TrackOrder => self.track_order(entities, customer_id).await,
            Intent::InventoryCheck => self.check_inventory(entities).await,
            Intent::ProductInfo => self.product_info(entities).await,
            Intent::StoreLocator => self.locate_stores(entities).await,
            Intent::Pricing => self.pricing(entities).await,
        }
    }

    async fn track_order(&self, entities: &Entities, customer_id: Option<&str>) -> BackendResponse {
        let Some(order_number) = first_entity(entities, ORDER_KEYS) else {
            return BackendResponse::missing("order_number");
        };

        let result = self.backends.orders.get_order(order_number, customer_id).await;
        settle(ServiceKind::Order, result, |order_info| {
            BackendResponse::Order { order_info }
        })
    }

    async fn check_inventory(&self, entities: &Entities) -> BackendResponse {
        let Some(mention) = first_entity(entities, PRODUCT_KEYS) else {
            return BackendResponse::missing("product");
        };
        let location = first_entity(entities, LOCATION_KEYS);

        let result = self
            .backends
            .inventory
            .check_availability(&product_id(mention), location)
            .await;
        settle(ServiceKind::Inventory, result, |inventory_info| {
            BackendResponse::Inventory { inventory_info }
        })
    }

    async fn product_info(&self, entities: &Entities) -> BackendResponse {
        let Some(mention) = first_entity(entities, PRODUCT_KEYS) else {
            return BackendResponse::missing("product");
        };

        let result = self.backends.products.get_product_info(&product_id(mention)).await;
        settle(ServiceKind::Product, result, |product_info| {
            BackendResponse::Product { product_info }
        })
    }

    async fn locate_stores(&self, entities: &Entities) -> BackendResponse {
        let location = first_entity(entities, LOCATION_KEYS).unwrap_or(DEFAULT_LOCATION);

        let result = self.backends.stores.find_stores(location, DEFAULT_RADIUS).await;
        settle(ServiceKind::Store, result, |stores| BackendResponse::Stores { stores })
    }

    async fn pricing(&self, entities: &Entities) -> BackendResponse {
        let Some(mention) = first_entity(entities, PRODUCT_KEYS) else {
            return BackendResponse::missing("product");
        };

        let result = self.backends.products.get_product_info(&product_id(mention)).await;
        settle(ServiceKind::Product, result, |product| {
            match (product.found, product.price) {
                (true, Some(price)) => BackendResponse::Pricing {
                    pricing_info: PricingInfo {
                        product_name: product.name.unwrap_or_else(|| mention.to_string()),
                        price: format!("${}", price),
                        promotion: PROMOTION_NOTE.to_string(),
                    },
                },
                _ => BackendResponse::NotAvailable {
                    error: "Pricing information not available".to_string(),
                },
            }
        })
    }
}

/// Map a normalized adapter result onto the response, or a failure
fn settle<T>(
    service: ServiceKind,
    result: CallResult<T>,
    wrap: impl FnOnce(T) -> BackendResponse,
) -> BackendResponse {
    match result.data {
        Some(data) if result.success => wrap(data),
        _ => BackendResponse::failed(service, result.error),
    }
}
