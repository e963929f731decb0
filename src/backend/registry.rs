//! Immutable registry of backend pools keyed by API group

use std::collections::HashMap;

use crate::backend::pool::{ApiGroup, BackendDescriptor, BackendPool};
use crate::config::PoolConfig;
use crate::error::{AppError, Result};

/// Process-lifetime table of backend pools.
///
/// Constructed once at startup and never mutated, so concurrent reads need
/// no synchronization.
pub struct BackendRegistry {
    pools: HashMap<ApiGroup, BackendPool>,
}

impl BackendRegistry {
    /// Build the registry from validated pool configuration
    pub fn from_settings(pools: &[PoolConfig]) -> Result<Self> {
        let mut table = HashMap::new();

        for pool_config in pools {
            let servers: Vec<BackendDescriptor> = pool_config
                .servers
                .iter()
                .map(|entry| {
                    BackendDescriptor::new(entry.address.clone(), entry.weight, pool_config.group)
                })
                .collect();

            if servers.is_empty() {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "Pool {} has no servers",
                    pool_config.group
                ))));
            }

            table.insert(pool_config.group, BackendPool::new(pool_config.group, servers));
        }

        Ok(Self { pools: table })
    }

    /// Look up the pool for an API group
    pub fn pool(&self, group: ApiGroup) -> Result<&BackendPool> {
        self.pools
            .get(&group)
            .ok_or_else(|| AppError::UnknownGroup(group.to_string()))
    }

    /// Every configured group, in no particular order
    pub fn groups(&self) -> Vec<ApiGroup> {
        self.pools.keys().copied().collect()
    }

    /// Flattened list of every backend address across all groups,
    /// consumed by the health monitor
    pub fn all_addresses(&self) -> Vec<String> {
        self.pools
            .values()
            .flat_map(|pool| pool.servers().iter().map(|s| s.address.clone()))
            .collect()
    }

    pub fn backend_count(&self) -> usize {
        self.pools.values().map(BackendPool::len).sum()
    }
}
