use crate::metrics;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching of idempotent reads
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum number of entries per service
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Time-to-live for cache entries in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_ttl_secs() -> u64 {
    300 // 5 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_capacity: default_max_capacity(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Cache key derived from the service base, endpoint path and sorted query parameters
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a new cache key. Parameter order does not affect the key.
    pub fn new<I, K, V>(base: &str, endpoint: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let sorted: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut key = format!("{}{}", base.trim_end_matches('/'), endpoint);
        if !sorted.is_empty() {
            // JSON encoding keeps every key and value distinct
            let params: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            key.push('?');
            key.push_str(&Value::Object(params).to_string());
        }

        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cached response body
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub value: Value,
    pub stored_at: Instant,
}

/// An entry stored at `stored_at` is served while `now - stored_at < ttl`
pub fn is_fresh(stored_at: Instant, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(stored_at) < ttl
}

/// Per-service response cache
#[derive(Debug, Clone)]
pub struct ResponseCache {
    namespace: String,
    enabled: bool,
    ttl: Duration,
    cache: Cache<CacheKey, CacheEntry>,
}

impl ResponseCache {
    /// Create a new response cache for one service
    pub fn new(namespace: impl Into<String>, config: &CacheConfig) -> Self {
        let mut cache = Self::with_ttl(namespace, config.ttl(), config.max_capacity);
        cache.enabled = config.enabled;
        cache
    }

    /// Create an enabled cache with an explicit TTL
    pub fn with_ttl(namespace: impl Into<String>, ttl: Duration, max_capacity: u64) -> Self {
        let namespace = namespace.into();

        // Entries past their TTL are also evicted by the store to bound memory
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        info!(
            service = %namespace,
            max_capacity,
            ttl_secs = ttl.as_secs(),
            "Initialized response cache"
        );

        Self {
            namespace,
            enabled: true,
            ttl,
            cache,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get a fresh cached value
    pub async fn get(&self, key: &CacheKey) -> Option<Value> {
        if !self.enabled {
            return None;
        }

        let fresh = self
            .cache
            .get(key)
            .await
            .filter(|entry| is_fresh(entry.stored_at, Instant::now(), self.ttl));

        metrics::record_cache_lookup(&self.namespace, fresh.is_some());
        if fresh.is_some() {
            debug!(service = %self.namespace, key = %key, "Cache hit");
        }

        fresh.map(|entry| entry.value)
    }

    /// Store a value, overwriting any previous entry for the key
    pub async fn put(&self, key: CacheKey, value: Value) {
        if !self.enabled {
            return;
        }

        debug!(service = %self.namespace, key = %key, "Cached response");
        self.cache
            .insert(
                key,
                CacheEntry {
                    value,
                    stored_at: Instant::now(),
                },
            )
            .await;
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.cache.entry_count(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_cache_config() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_capacity, 10_000);
        assert_eq!(config.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_cache_key_ignores_param_order() {
        let key1 = CacheKey::new(
            "https://oms.local/",
            "/orders/AB1",
            [("customer_id", "c1"), ("region", "us")],
        );
        let key2 = CacheKey::new(
            "https://oms.local",
            "/orders/AB1",
            [("region", "us"), ("customer_id", "c1")],
        );

        assert_eq!(key1, key2);
        assert_eq!(
            key1.as_str(),
            r#"https://oms.local/orders/AB1?{"customer_id":"c1","region":"us"}"#
        );
    }

    #[test]
    fn test_cache_key_distinguishes_params() {
        let bare = CacheKey::new("http://inv", "/inventory/x", Vec::<(String, String)>::new());
        let located = CacheKey::new("http://inv", "/inventory/x", [("location", "nyc")]);
        assert_ne!(bare, located);
        assert_eq!(bare.as_str(), "http://inv/inventory/x");

        let forged = CacheKey::new(
            "http://s",
            "/stores/search",
            [("location", "a&radius=5"), ("radius", "25")],
        );
        let plain = CacheKey::new(
            "http://s",
            "/stores/search",
            [("location", "a"), ("radius", "5&radius=25")],
        );
        assert_ne!(forged, plain);

        let quoted = CacheKey::new("http://s", "/stores/search", [("location", r#"a","radius":"5"#)]);
        let split = CacheKey::new("http://s", "/stores/search", [("location", "a"), ("radius", "5")]);
        assert_ne!(quoted, split);
    }

    #[test]
    fn test_freshness_window() {
        let stored_at = Instant::now();
        let ttl = Duration::from_secs(300);

        assert!(is_fresh(stored_at, stored_at, ttl));
        assert!(is_fresh(stored_at, stored_at + Duration::from_secs(299), ttl));
        assert!(!is_fresh(stored_at, stored_at + Duration::from_secs(300), ttl));
        assert!(!is_fresh(stored_at, stored_at + Duration::from_secs(301), ttl));
    }

    #[tokio::test]
    async fn test_cache_put_and_get() {
        let cache = ResponseCache::new("product", &CacheConfig::default());
        let key = CacheKey::new("http://pim", "/products/iphone13", Vec::<(String, String)>::new());

        assert!(cache.get(&key).await.is_none());
        cache.put(key.clone(), json!({"name": "iPhone 13"})).await;

        assert_eq!(cache.get(&key).await, Some(json!({"name": "iPhone 13"})));
    }

    #[tokio::test]
    async fn test_stale_entry_is_not_served_and_is_overwritten() {
        let cache = ResponseCache::with_ttl("order", Duration::from_millis(100), 100);
        let key = CacheKey::new("http://oms", "/orders/1", Vec::<(String, String)>::new());

        cache.put(key.clone(), json!({"status": "processing"})).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get(&key).await.is_none());

        cache.put(key.clone(), json!({"status": "shipped"})).await;
        assert_eq!(cache.get(&key).await, Some(json!({"status": "shipped"})));
    }

    #[tokio::test]
    async fn test_disabled_cache_never_stores() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let cache = ResponseCache::new("store", &config);
        let key = CacheKey::new("http://stores", "/stores/search", [("location", "nyc")]);

        cache.put(key.clone(), json!({"stores": []})).await;
        assert!(!cache.is_enabled());
        assert!(cache.get(&key).await.is_none());
    }
}
