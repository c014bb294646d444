use crate::adapters::{BackendService, ServiceKind, ServiceStatus};
use crate::metrics;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Health check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Run the periodic health monitor
    #[serde(default)]
    pub monitor_enabled: bool,
    /// Interval between monitor rounds in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Per-probe timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// HTTP path to probe (e.g., "/health")
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    5
}

fn default_path() -> String {
    "/health".to_string()
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            monitor_enabled: false,
            interval_secs: default_interval(),
            timeout_secs: default_timeout(),
            path: default_path(),
        }
    }
}

impl HealthCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Point-in-time health of every backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: ServiceStatus,
    pub services: BTreeMap<ServiceKind, ServiceStatus>,
    pub checked_at: DateTime<Utc>,
}

/// Healthy only when every service is, unavailable when every service is or
/// when nothing is registered
pub fn overall_status(statuses: &BTreeMap<ServiceKind, ServiceStatus>) -> ServiceStatus {
    if statuses.is_empty() {
        ServiceStatus::Unavailable
    } else if statuses.values().all(|s| *s == ServiceStatus::Healthy) {
        ServiceStatus::Healthy
    } else if statuses.values().all(|s| *s == ServiceStatus::Unavailable) {
        ServiceStatus::Unavailable
    } else {
        ServiceStatus::Degraded
    }
}

/// Polls every adapter's probe concurrently
pub struct HealthAggregator {
    services: Vec<Arc<dyn BackendService>>,
    probe_timeout: Duration,
}

impl std::fmt::Debug for HealthAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<ServiceKind> = self.services.iter().map(|s| s.kind()).collect();
        f.debug_struct("HealthAggregator")
            .field("services", &kinds)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl HealthAggregator {
    pub fn new(services: Vec<Arc<dyn BackendService>>, probe_timeout: Duration) -> Self {
        Self {
            services,
            probe_timeout,
        }
    }

    /// Probe all services. Never cached; every call reaches the backends.
    pub async fn status(&self) -> BTreeMap<ServiceKind, ServiceStatus> {
        let probes = self.services.iter().map(|service| self.probe(service.as_ref()));
        join_all(probes).await.into_iter().collect()
    }

    /// Probe all services and roll the result up
    pub async fn report(&self) -> HealthReport {
        let services = self.status().await;
        HealthReport {
            status: overall_status(&services),
            services,
            checked_at: Utc::now(),
        }
    }

    async fn probe(&self, service: &dyn BackendService) -> (ServiceKind, ServiceStatus) {
        let kind = service.kind();
        let status = match tokio::time::timeout(self.probe_timeout, service.health_check()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!(service = %kind, error = %e, "Health probe failed");
                ServiceStatus::Unavailable
            }
            Err(_) => {
                warn!(
                    service = %kind,
                    timeout = ?self.probe_timeout,
                    "Health probe timed out"
                );
                ServiceStatus::Unavailable
            }
        };

        debug!(service = %kind, status = %status, "Health probe completed");
        (kind, status)
    }

    /// Start the periodic monitor. It records health gauges and logs changes.
    pub fn spawn_monitor(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut check_interval = interval(every);
            let mut previous: BTreeMap<ServiceKind, ServiceStatus> = BTreeMap::new();

            info!(interval_secs = every.as_secs(), "Started backend health monitor");

            loop {
                check_interval.tick().await;

                let current = self.status().await;
                for (kind, status) in &current {
                    metrics::record_backend_health(kind.as_str(), *status);

                    match previous.get(kind) {
                        Some(before) if before != status => {
                            warn!(
                                service = %kind,
                                from = %before,
                                to = %status,
                                "Backend health changed"
                            );
                        }
                        None if *status != ServiceStatus::Healthy => {
                            warn!(service = %kind, status = %status, "Backend not healthy");
                        }
                        _ => {}
                    }
                }
                previous = current;
            }
        })
    }
}
