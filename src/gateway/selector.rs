//! Backend selection across pools

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::backend::pool::{ApiGroup, BackendDescriptor, BackendPool};
use crate::backend::registry::BackendRegistry;
use crate::config::RoutingAlgorithm;
use crate::error::{AppError, Result};
use crate::gateway::health::LivenessSet;

/// Chooses one backend from a pool per request.
///
/// Weighted rotation draws a backend with probability proportional to its
/// weight; the rotating start index only affects tie-break order over short
/// windows, not long-run frequency. Queue discipline draws uniformly and
/// ignores weight. An explicit `X-Server-Preference` token bypasses both,
/// liveness included: an operator override is honored even when the chosen
/// backend is currently marked dead.
pub struct ServerSelector {
    registry: Arc<BackendRegistry>,
    liveness: Arc<LivenessSet>,
    algorithm: RoutingAlgorithm,
    cursors: HashMap<ApiGroup, Mutex<usize>>,
}

impl ServerSelector {
    pub fn new(
        registry: Arc<BackendRegistry>,
        liveness: Arc<LivenessSet>,
        algorithm: RoutingAlgorithm,
    ) -> Self {
        let cursors = registry
            .groups()
            .into_iter()
            .map(|group| (group, Mutex::new(0)))
            .collect();

        Self {
            registry,
            liveness,
            algorithm,
            cursors,
        }
    }

    pub fn algorithm(&self) -> RoutingAlgorithm {
        self.algorithm
    }

    /// Select a backend for a request classified into `group`
    pub fn select(
        &self,
        group: ApiGroup,
        preference: Option<&str>,
    ) -> Result<BackendDescriptor> {
        let pool = self.registry.pool(group)?;
        if pool.is_empty() {
            return Err(AppError::NoHealthyBackend(group.to_string()));
        }

        if let Some(token) = preference {
            return select_preferred(pool, token);
        }

        let working = self.working_set(pool);

        let selected = match self.algorithm {
            RoutingAlgorithm::WeightedRotation => self.select_weighted(group, &working)?,
            RoutingAlgorithm::QueueDiscipline => select_uniform(&working),
        };

        debug!(
            backend = %selected.address,
            group = %group,
            algorithm = ?self.algorithm,
            "Selected backend for request"
        );

        Ok(selected)
    }

    /// Restrict the pool to live addresses. An empty result falls back to
    /// the full pool: degrade rather than fail when health data is stale or
    /// every probe is currently failing.
    fn working_set<'a>(&self, pool: &'a BackendPool) -> Vec<&'a BackendDescriptor> {
        let live: Vec<&BackendDescriptor> = pool
            .servers()
            .iter()
            .filter(|s| self.liveness.contains(&s.address))
            .collect();

        if live.is_empty() {
            debug!(group = %pool.group(), "No live backends; falling back to full pool");
            pool.servers().iter().collect()
        } else {
            live
        }
    }

    /// Weighted-random draw walked from the per-pool rotation cursor.
    ///
    /// The cursor is read and advanced under one lock so two concurrent
    /// requests never compute from the same stale position.
    fn select_weighted(
        &self,
        group: ApiGroup,
        working: &[&BackendDescriptor],
    ) -> Result<BackendDescriptor> {
        let cursor_lock = self
            .cursors
            .get(&group)
            .ok_or_else(|| AppError::UnknownGroup(group.to_string()))?;

        let total_weight: u32 = working.iter().map(|s| s.weight).sum();
        let roll = rand::thread_rng().gen_range(0..total_weight);

        let mut cursor = cursor_lock.lock();
        let len = working.len();
        let start = *cursor % len;
        let mut cumulative = 0u32;

        for step in 0..len {
            let index = (start + step) % len;
            cumulative += working[index].weight;
            if roll < cumulative {
                *cursor = (index + 1) % len;
                return Ok(working[index].clone());
            }
        }

        // roll < total_weight, so the walk above always selects
        Err(AppError::NoHealthyBackend(group.to_string()))
    }
}

/// Positional preference tokens carried by `X-Server-Preference`
fn select_preferred(pool: &BackendPool, token: &str) -> Result<BackendDescriptor> {
    let index = match token {
        "server1" => 0,
        "server2" => 1,
        "server3" => 2,
        _ => return Err(AppError::InvalidPreference(token.to_string())),
    };

    pool.get(index)
        .cloned()
        .ok_or_else(|| AppError::InvalidPreference(token.to_string()))
}

/// Uniform draw for the queue discipline; weight is not meaningful there
fn select_uniform(working: &[&BackendDescriptor]) -> BackendDescriptor {
    let index = rand::thread_rng().gen_range(0..working.len());
    working[index].clone()
}
