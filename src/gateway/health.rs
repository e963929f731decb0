//! Background health monitor maintaining the live-address set

use dashmap::DashSet;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::HealthCheckConfig;
use crate::error::{AppError, Result};

/// Set of backend addresses currently believed reachable.
///
/// The health monitor is the sole writer; the selector only reads. Readers
/// may observe data from the previous probe cycle, which selection
/// tolerates.
pub struct LivenessSet {
    inner: DashSet<String>,
}

impl LivenessSet {
    pub fn new() -> Self {
        Self {
            inner: DashSet::new(),
        }
    }

    /// Seed the set with every configured address. Backends are assumed
    /// reachable until the first probe says otherwise.
    pub fn seeded(addresses: &[String]) -> Self {
        let set = Self::new();
        for address in addresses {
            set.inner.insert(address.clone());
        }
        set
    }

    pub fn contains(&self, address: &str) -> bool {
        self.inner.contains(address)
    }

    pub fn mark_live(&self, address: &str) {
        self.inner.insert(address.to_string());
    }

    pub fn mark_dead(&self, address: &str) {
        self.inner.remove(address);
    }

    pub fn live_count(&self) -> usize {
        self.inner.len()
    }
}

impl Default for LivenessSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task probing every configured backend on a fixed period.
///
/// A completed exchange of any status is evidence of liveness; only a
/// transport-level failure (refused connection, timeout, no response)
/// removes an address from the set.
pub struct HealthMonitor {
    addresses: Vec<String>,
    liveness: Arc<LivenessSet>,
    client: Client,
    interval: Duration,
    probe_task: RwLock<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Create a monitor over the flattened list of all backend addresses
    pub fn new(
        addresses: Vec<String>,
        liveness: Arc<LivenessSet>,
        config: &HealthCheckConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.probe_timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create probe client: {}", e)))?;

        Ok(Self {
            addresses,
            liveness,
            client,
            interval: Duration::from_secs(config.interval_secs),
            probe_task: RwLock::new(None),
        })
    }

    /// Start the probe background task
    pub async fn start(&self) {
        let addresses = self.addresses.clone();
        let liveness = self.liveness.clone();
        let client = self.client.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            loop {
                scan(&addresses, &client, &liveness).await;
                tokio::time::sleep(interval).await;
            }
        });

        *self.probe_task.write().await = Some(handle);
        info!(
            interval_secs = self.interval.as_secs(),
            backends = self.addresses.len(),
            "Started health monitor background task"
        );
    }

    /// Stop the probe background task
    pub async fn stop(&self) {
        if let Some(handle) = self.probe_task.write().await.take() {
            handle.abort();
            info!("Stopped health monitor background task");
        }
    }

    /// Run a single probe cycle over every address
    pub async fn scan_once(&self) {
        scan(&self.addresses, &self.client, &self.liveness).await;
    }

    pub fn liveness(&self) -> Arc<LivenessSet> {
        self.liveness.clone()
    }
}

/// One full probe cycle. Each address is probed independently; a failure on
/// one never aborts the rest of the scan.
async fn scan(addresses: &[String], client: &Client, liveness: &LivenessSet) {
    for address in addresses {
        let url = format!("http://{}/", address);

        match client.get(&url).send().await {
            // Any completed exchange counts as alive, application errors
            // included
            Ok(response) => {
                liveness.mark_live(address);
                debug!(
                    backend = %address,
                    status = %response.status(),
                    "Probe completed"
                );
            }
            Err(e) => {
                liveness.mark_dead(address);
                warn!(backend = %address, error = %e, "Probe transport failure");
            }
        }
    }

    let live = addresses.iter().filter(|a| liveness.contains(a)).count();
    let dead = addresses.len() - live;
    info!(live, dead, "Health scan complete");
}
