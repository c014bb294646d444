pub mod inventory;
pub mod order;
pub mod product;
pub mod store;

pub use inventory::{InventoryInfo, InventoryService};
pub use order::{OrderInfo, OrderService};
pub use product::{ProductInfo, ProductService};
pub use store::{StoreService, StoreSummary};

use crate::client::{CallResult, ServiceClient};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Separator between formatted detail fragments
pub const DETAIL_SEPARATOR: &str = " | ";

/// The external retail domains this layer talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Order,
    Inventory,
    Product,
    Store,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Order,
        ServiceKind::Inventory,
        ServiceKind::Product,
        ServiceKind::Store,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Order => "order",
            ServiceKind::Inventory => "inventory",
            ServiceKind::Product => "product",
            ServiceKind::Store => "store",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of one backend service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unavailable,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Healthy => write!(f, "healthy"),
            ServiceStatus::Degraded => write!(f, "degraded"),
            ServiceStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Common surface of every domain adapter
#[async_trait]
pub trait BackendService: Send + Sync {
    fn kind(&self) -> ServiceKind;

    /// Probe the backend. `Err` means the probe itself failed.
    async fn health_check(&self) -> Result<ServiceStatus>;
}

/// Probe through the client and classify a completed response
pub(crate) async fn probe_status(client: &ServiceClient) -> Result<ServiceStatus> {
    let response = client.probe().await?;
    Ok(if response.is_success() {
        ServiceStatus::Healthy
    } else {
        ServiceStatus::Degraded
    })
}

/// Turn a raw call into a domain result.
///
/// A 404 or an empty body is domain absence and becomes a successful
/// `absent()` value; other failures pass through without data.
pub(crate) fn normalize<T>(
    result: CallResult<Value>,
    present: impl FnOnce(&Value) -> T,
    absent: impl FnOnce() -> T,
) -> CallResult<T> {
    if result.is_not_found() {
        let mut normalized = result.with_data(Some(absent()));
        normalized.success = true;
        normalized.error = None;
        return normalized;
    }

    if !result.success {
        return result.with_data(None);
    }

    let value = match result.data.as_ref() {
        Some(data) if !is_empty(data) => present(data),
        _ => absent(),
    };
    result.with_data(Some(value))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Render a field for display. Missing, null, empty and `false` values are absent.
pub(crate) fn text_field(data: &Value, key: &str) -> Option<String> {
    display_value(data.get(key)?)
}

pub(crate) fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Join detail fragments, or fall back when there are none
pub(crate) fn join_details(parts: Vec<String>, fallback: &str) -> String {
    if parts.is_empty() {
        fallback.to_string()
    } else {
        parts.join(DETAIL_SEPARATOR)
    }
}
