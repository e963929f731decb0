//! Application settings and configuration management

use crate::backend::pool::ApiGroup;
use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub routing: RoutingConfig,
    pub health_check: HealthCheckConfig,
    pub forward: ForwardConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Routing algorithm selected for the whole process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingAlgorithm {
    WeightedRotation,
    QueueDiscipline,
}

impl Default for RoutingAlgorithm {
    fn default() -> Self {
        Self::WeightedRotation
    }
}

/// Routing and admission configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub algorithm: RoutingAlgorithm,
    /// Delay before each queued forward is issued
    #[serde(default = "default_queue_pacing_ms")]
    pub queue_pacing_ms: u64,
    /// Submissions beyond this depth are rejected with 503
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            algorithm: RoutingAlgorithm::default(),
            queue_pacing_ms: default_queue_pacing_ms(),
            max_queue_depth: default_max_queue_depth(),
        }
    }
}

fn default_queue_pacing_ms() -> u64 {
    100
}

fn default_max_queue_depth() -> usize {
    1024
}

/// Health monitor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_health_interval(),
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}

fn default_health_interval() -> u64 {
    5
}

fn default_probe_timeout() -> u64 {
    2000
}

/// Outbound forwarding configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwardConfig {
    #[serde(default = "default_forward_timeout")]
    pub timeout_ms: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_forward_timeout(),
        }
    }
}

fn default_forward_timeout() -> u64 {
    30000
}

/// Audit emission configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuditConfig {
    /// JSON-lines file for routing decisions; tracing-only when unset
    #[serde(default)]
    pub path: Option<String>,
}

/// One backend pool: a group plus its ordered servers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    pub group: ApiGroup,
    pub servers: Vec<ServerEntry>,
}

/// A configured backend address with its selection weight
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerEntry {
    pub address: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("routing.algorithm", "WEIGHTED_ROTATION")?
            .set_default("routing.queue_pacing_ms", 100)?
            .set_default("routing.max_queue_depth", 1024)?
            .set_default("health_check.interval_secs", 5)?
            .set_default("health_check.probe_timeout_ms", 2000)?
            .set_default("forward.timeout_ms", 30000)?
            // Load from configuration file
            .add_source(
                File::with_name(path.as_ref().to_str().unwrap_or("config/default"))
                    .required(false),
            )
            // Override with environment variables (prefixed with POOL_BALANCER__)
            .add_source(
                Environment::with_prefix("POOL_BALANCER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.pools.is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "At least one backend pool must be configured".to_string(),
            )));
        }

        let mut seen_groups = HashSet::new();
        for pool in &self.pools {
            if !seen_groups.insert(pool.group) {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "Duplicate pool section for API group {}",
                    pool.group
                ))));
            }
            if pool.servers.is_empty() {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "Pool {} must have at least one server",
                    pool.group
                ))));
            }
            for server in &pool.servers {
                if server.weight == 0 {
                    return Err(AppError::Config(config::ConfigError::Message(format!(
                        "Server '{}' in pool {} must have weight >= 1",
                        server.address, pool.group
                    ))));
                }
                if !server.address.contains(':') {
                    return Err(AppError::Config(config::ConfigError::Message(format!(
                        "Server address '{}' in pool {} must be host:port",
                        server.address, pool.group
                    ))));
                }
            }
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            routing: RoutingConfig::default(),
            health_check: HealthCheckConfig::default(),
            forward: ForwardConfig::default(),
            audit: AuditConfig::default(),
            pools: vec![],
        }
    }
}
