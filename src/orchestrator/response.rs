use crate::adapters::{InventoryInfo, OrderInfo, ProductInfo, ServiceKind, StoreSummary};
use serde::Serialize;
use serde_json::{json, Value};

/// Pricing answer derived from a product lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingInfo {
    pub product_name: String,
    pub price: String,
    pub promotion: String,
}

/// The structured map handed back to the chatbot.
///
/// Serialized untagged: each variant's field names are the map's keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BackendResponse {
    Order {
        order_info: OrderInfo,
    },
    Inventory {
        inventory_info: InventoryInfo,
    },
    Product {
        product_info: ProductInfo,
    },
    Stores {
        stores: Vec<StoreSummary>,
    },
    Pricing {
        pricing_info: PricingInfo,
    },
    /// A required entity was not extracted; no backend was called
    MissingEntity {
        error: String,
        missing: String,
    },
    /// The intent is not one this layer serves
    Unsupported {
        error: String,
        unsupported_intent: String,
    },
    /// The backend answered but had nothing usable
    NotAvailable {
        error: String,
    },
    /// The backend call failed
    Failed {
        error: String,
        service: ServiceKind,
    },
}

impl BackendResponse {
    pub fn missing(entity: &str) -> Self {
        BackendResponse::MissingEntity {
            error: format!("Missing required information: {}", entity),
            missing: entity.to_string(),
        }
    }

    pub fn unsupported(intent: &str) -> Self {
        BackendResponse::Unsupported {
            error: format!("Unsupported intent: {}", intent),
            unsupported_intent: intent.to_string(),
        }
    }

    pub fn failed(service: ServiceKind, error: Option<String>) -> Self {
        BackendResponse::Failed {
            error: error.unwrap_or_else(|| format!("{} service request failed", service)),
            service,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            BackendResponse::MissingEntity { .. }
                | BackendResponse::Unsupported { .. }
                | BackendResponse::NotAvailable { .. }
                | BackendResponse::Failed { .. }
        )
    }

    /// Short label for logs and metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            BackendResponse::MissingEntity { .. } => "missing_entity",
            BackendResponse::Unsupported { .. } => "unsupported",
            BackendResponse::NotAvailable { .. } => "not_available",
            BackendResponse::Failed { .. } => "failed",
            _ => "ok",
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| json!({ "error": e.to_string() }))
    }
}
