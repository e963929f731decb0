//! Protocol-Aware Pool Balancer
//!
//! Routes inbound HTTP requests across pools of backend servers grouped by
//! API style (REST, GraphQL, gRPC-tagged-but-HTTP), selecting a backend per
//! request via a configurable algorithm, monitoring backend liveness in the
//! background, and forwarding while preserving per-group protocol
//! semantics.

pub mod api;
pub mod audit;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod proxy;

pub use error::{AppError, Result};

use std::sync::Arc;

use audit::AuditLog;
use backend::registry::BackendRegistry;
use dispatch::Admission;
use gateway::{health::LivenessSet, HealthMonitor, ServerSelector};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub registry: Arc<BackendRegistry>,
    pub liveness: Arc<LivenessSet>,
    pub selector: Arc<ServerSelector>,
    pub health_monitor: Arc<HealthMonitor>,
    pub admission: Admission,
    pub audit: AuditLog,
}
