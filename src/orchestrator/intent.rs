use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Entities extracted from a user message, by entity type
pub type Entities = HashMap<String, Vec<String>>;

/// Conversation context supplied by the session layer
pub type Context = Map<String, Value>;

/// Intents this layer can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TrackOrder,
    InventoryCheck,
    ProductInfo,
    StoreLocator,
    Pricing,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::TrackOrder,
        Intent::InventoryCheck,
        Intent::ProductInfo,
        Intent::StoreLocator,
        Intent::Pricing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::TrackOrder => "track_order",
            Intent::InventoryCheck => "inventory_check",
            Intent::ProductInfo => "product_info",
            Intent::StoreLocator => "store_locator",
            Intent::Pricing => "pricing",
        }
    }

    /// Parse an intent label from the classifier. Unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|intent| intent.as_str() == label)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity keys that carry an order number
pub const ORDER_KEYS: &[&str] = &["order_number"];
/// Entity keys that carry a product mention, in priority order
pub const PRODUCT_KEYS: &[&str] = &["products", "product_mention"];
/// Entity keys that carry a location, in priority order
pub const LOCATION_KEYS: &[&str] = &["locations", "store_location"];

/// Location used when the user did not name one
pub const DEFAULT_LOCATION: &str = "current location";

/// First value of the first non-empty entity list among `keys`
pub fn first_entity<'a>(entities: &'a Entities, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| entities.get(*key))
        .find(|values| !values.is_empty())
        .and_then(|values| values.first())
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Product ids are mentions lowercased with spaces removed
pub fn product_id(mention: &str) -> String {
    mention.to_lowercase().replace(' ', "")
}
