//! Gateway module - classification, health monitoring, and selection

pub mod classifier;
pub mod health;
pub mod selector;

pub use classifier::classify;
pub use health::{HealthMonitor, LivenessSet};
pub use selector::ServerSelector;
