//! Configuration module

pub mod settings;

pub use settings::{
    AuditConfig, ForwardConfig, HealthCheckConfig, LoggingConfig, PoolConfig, RoutingAlgorithm,
    RoutingConfig, ServerConfig, ServerEntry, Settings,
};
