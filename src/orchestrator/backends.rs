use crate::adapters::{
    BackendService, InventoryService, OrderService, ProductService, ServiceKind, StoreService,
};
use crate::client::ServiceClient;
use crate::config::{BackendMode, IntegrationConfig};
use crate::error::Result;
use crate::transport::{HttpTransport, MockDataset, MockTransport, Transport};
use std::sync::Arc;
use tracing::{info, warn};

/// The four domain adapters, each owning its own client
#[derive(Debug, Clone)]
pub struct Backends {
    pub orders: Arc<OrderService>,
    pub inventory: Arc<InventoryService>,
    pub products: Arc<ProductService>,
    pub stores: Arc<StoreService>,
}

impl Backends {
    /// Build adapters for the configured backend mode
    pub fn from_config(config: &IntegrationConfig) -> Result<Self> {
        match config.backend_mode {
            BackendMode::Mock => {
                warn!(
                    latency_ms = config.mock.latency_ms,
                    "Using in-memory mock backends"
                );
                let dataset = Arc::new(MockDataset::default());
                Self::build(config, |kind| {
                    let transport: Arc<dyn Transport> = Arc::new(MockTransport::new(
                        kind.as_str(),
                        dataset.clone(),
                        config.mock.latency(),
                    ));
                    Ok(transport)
                })
            }
            BackendMode::Live => Self::build(config, |kind| {
                let adapter = config.services.get(kind);
                let transport = HttpTransport::new(
                    config.base_url(kind)?,
                    adapter.api_key.clone(),
                    config.client_policy(kind).timeout,
                )?;
                info!(service = %kind, base_url = %transport.base(), "Configured live backend");
                let transport: Arc<dyn Transport> = Arc::new(transport);
                Ok(transport)
            }),
        }
    }

    /// Build adapters over caller-supplied transports
    pub fn build<F>(config: &IntegrationConfig, mut transport_for: F) -> Result<Self>
    where
        F: FnMut(ServiceKind) -> Result<Arc<dyn Transport>>,
    {
        let mut client = |kind: ServiceKind| -> Result<ServiceClient> {
            Ok(ServiceClient::new(
                kind,
                transport_for(kind)?,
                config.client_policy(kind),
            ))
        };

        Ok(Self {
            orders: Arc::new(OrderService::new(client(ServiceKind::Order)?)),
            inventory: Arc::new(InventoryService::new(client(ServiceKind::Inventory)?)),
            products: Arc::new(ProductService::new(client(ServiceKind::Product)?)),
            stores: Arc::new(StoreService::new(client(ServiceKind::Store)?)),
        })
    }

    /// Every adapter as a health-checkable service
    pub fn services(&self) -> Vec<Arc<dyn BackendService>> {
        vec![
            self.orders.clone() as Arc<dyn BackendService>,
            self.inventory.clone() as Arc<dyn BackendService>,
            self.products.clone() as Arc<dyn BackendService>,
            self.stores.clone() as Arc<dyn BackendService>,
        ]
    }

    pub fn client(&self, kind: ServiceKind) -> &ServiceClient {
        match kind {
            ServiceKind::Order => self.orders.client(),
            ServiceKind::Inventory => self.inventory.client(),
            ServiceKind::Product => self.products.client(),
            ServiceKind::Store => self.stores.client(),
        }
    }
}
