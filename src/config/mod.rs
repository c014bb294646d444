use crate::adapters::ServiceKind;
use crate::cache::CacheConfig;
use crate::circuit_breaker::{CircuitBreakerConfig, RetryConfig};
use crate::client::ClientPolicy;
use crate::error::{IntegrationError, Result};
use crate::healthcheck::HealthCheckConfig;
use secrecy::{Secret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "CHATBOT_";

/// Main integration configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationConfig {
    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,
    /// Whether adapters talk to real backends or the in-memory mock
    #[serde(default)]
    pub backend_mode: BackendMode,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Per-service backend settings
    #[serde(default)]
    pub services: ServicesConfig,
    /// Response cache settings, applied to every service
    #[serde(default)]
    pub cache: CacheConfig,
    /// Circuit breaker settings, applied to every service
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Retry settings for idempotent reads
    #[serde(default)]
    pub retry: RetryConfig,
    /// Health probe settings
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    /// Mock backend settings
    #[serde(default)]
    pub mock: MockConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(IntegrationError::Config(format!(
                "Unknown environment '{}'",
                other
            ))),
        }
    }
}

/// Which backend implementation the adapters use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Mock,
    #[default]
    Live,
}

impl FromStr for BackendMode {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(BackendMode::Mock),
            "live" => Ok(BackendMode::Live),
            other => Err(IntegrationError::Config(format!(
                "Unknown backend mode '{}', expected 'mock' or 'live'",
                other
            ))),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(IntegrationError::Config(format!(
                "Unknown log format '{}', expected 'compact' or 'json'",
                other
            ))),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Settings for one backend service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdapterConfig {
    /// Base URL, required in live mode
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer credential sent with every call
    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub api_key: Option<SecretString>,
    /// Overrides the global call timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Overrides the global retry count
    #[serde(default)]
    pub retry_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicesConfig {
    #[serde(default)]
    pub order: AdapterConfig,
    #[serde(default)]
    pub inventory: AdapterConfig,
    #[serde(default)]
    pub product: AdapterConfig,
    #[serde(default)]
    pub store: AdapterConfig,
}

impl ServicesConfig {
    pub fn get(&self, kind: ServiceKind) -> &AdapterConfig {
        match kind {
            ServiceKind::Order => &self.order,
            ServiceKind::Inventory => &self.inventory,
            ServiceKind::Product => &self.product,
            ServiceKind::Store => &self.store,
        }
    }

    fn get_mut(&mut self, kind: ServiceKind) -> &mut AdapterConfig {
        match kind {
            ServiceKind::Order => &mut self.order,
            ServiceKind::Inventory => &mut self.inventory,
            ServiceKind::Product => &mut self.product,
            ServiceKind::Store => &mut self.store,
        }
    }
}

/// Mock backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Synthetic latency added to every mock call in milliseconds
    #[serde(default = "default_mock_latency_ms")]
    pub latency_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_mock_latency_ms(),
        }
    }
}

impl MockConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_mock_latency_ms() -> u64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            backend_mode: BackendMode::default(),
            log_format: LogFormat::default(),
            server: ServerConfig::default(),
            timeout_secs: default_timeout_secs(),
            services: ServicesConfig::default(),
            cache: CacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            health_check: HealthCheckConfig::default(),
            mock: MockConfig::default(),
        }
    }
}

impl IntegrationConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IntegrationError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| IntegrationError::Config(format!("Failed to parse config: {}", e)))
    }

    /// File (if any), then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CHATBOT_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(&key)
                .filter(|value| !value.trim().is_empty())
                .map(|value| (key, value))
        };

        if let Some((_, value)) = read("ENVIRONMENT") {
            self.environment = value.parse()?;
        }
        if let Some((_, value)) = read("BACKEND_MODE") {
            self.backend_mode = value.parse()?;
        }
        if let Some((_, value)) = read("LOG_FORMAT") {
            self.log_format = value.parse()?;
        }
        if let Some((_, value)) = read("HOST") {
            self.server.host = value;
        }
        if let Some((key, value)) = read("PORT") {
            self.server.port = parse_number(&key, &value)?;
        }
        if let Some((key, value)) = read("API_TIMEOUT_SECONDS") {
            self.timeout_secs = parse_number(&key, &value)?;
        }
        if let Some((key, value)) = read("API_RETRY_COUNT") {
            self.retry.max_retries = parse_number(&key, &value)?;
        }
        if let Some((key, value)) = read("CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_number(&key, &value)?;
        }
        if let Some((key, value)) = read("CIRCUIT_FAILURE_THRESHOLD") {
            self.circuit_breaker.failure_threshold = parse_number(&key, &value)?;
        }
        if let Some((key, value)) = read("CIRCUIT_COOL_DOWN_SECS") {
            self.circuit_breaker.cool_down_secs = parse_number(&key, &value)?;
        }

        for kind in ServiceKind::ALL {
            let name = kind.as_str().to_uppercase();
            let adapter = self.services.get_mut(kind);

            if let Some((_, value)) = read(&format!("{}_API_BASE_URL", name)) {
                adapter.base_url = Some(value);
            }
            if let Some((_, value)) = read(&format!("{}_API_KEY", name)) {
                adapter.api_key = Some(Secret::new(value));
            }
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(IntegrationError::Config(
                "Call timeout must be > 0".to_string(),
            ));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(IntegrationError::Config(
                "Circuit breaker failure threshold must be > 0".to_string(),
            ));
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(IntegrationError::Config(
                "Cache TTL must be > 0 when caching is enabled".to_string(),
            ));
        }

        if self.health_check.timeout_secs == 0 {
            return Err(IntegrationError::Config(
                "Health probe timeout must be > 0".to_string(),
            ));
        }

        if self.health_check.monitor_enabled && self.health_check.interval_secs == 0 {
            return Err(IntegrationError::Config(
                "Health monitor interval must be > 0".to_string(),
            ));
        }

        for kind in ServiceKind::ALL {
            if self.services.get(kind).timeout_secs == Some(0) {
                return Err(IntegrationError::Config(format!(
                    "Timeout for {} service must be > 0",
                    kind
                )));
            }
        }

        match self.backend_mode {
            BackendMode::Mock if self.environment == Environment::Production => {
                Err(IntegrationError::Config(
                    "Mock backends cannot be used in production".to_string(),
                ))
            }
            BackendMode::Mock => Ok(()),
            BackendMode::Live => {
                for kind in ServiceKind::ALL {
                    self.base_url(kind)?;
                }
                Ok(())
            }
        }
    }

    /// Base URL of a live backend. Missing or malformed URLs are configuration errors.
    pub fn base_url(&self, kind: ServiceKind) -> Result<&str> {
        let base_url = self
            .services
            .get(kind)
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                IntegrationError::Config(format!(
                    "Base URL for {} service is required in live mode (set {}{}_API_BASE_URL)",
                    kind,
                    ENV_PREFIX,
                    kind.as_str().to_uppercase()
                ))
            })?;

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(IntegrationError::Config(format!(
                "Base URL for {} service must start with http:// or https://",
                kind
            )));
        }

        Ok(base_url)
    }

    /// Call policy for one service, with per-service overrides applied
    pub fn client_policy(&self, kind: ServiceKind) -> ClientPolicy {
        let adapter = self.services.get(kind);
        let max_retries = adapter.retry_count.unwrap_or(self.retry.max_retries);

        ClientPolicy {
            timeout: Duration::from_secs(adapter.timeout_secs.unwrap_or(self.timeout_secs)),
            retry: self.retry.with_max_retries(max_retries),
            cache: self.cache.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
            health_path: self.health_check.path.clone(),
        }
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        IntegrationError::Config(format!("Invalid value '{}' for {}", value, key))
    })
}

/// Deserialize an optional secret without keeping a plain copy around
fn deserialize_optional_secret<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()).map(Secret::new))
}
