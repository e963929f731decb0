//! Backend descriptors and per-group pools

use serde::{Deserialize, Serialize};
use std::fmt;

/// API style a backend pool serves.
///
/// `Grpc` is a pool tag only: those backends are addressed over plain HTTP
/// and forwarded exactly like REST. No protobuf or streaming framing is
/// implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiGroup {
    Rest,
    Graphql,
    Grpc,
}

impl fmt::Display for ApiGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiGroup::Rest => "REST",
            ApiGroup::Graphql => "GRAPHQL",
            ApiGroup::Grpc => "GRPC",
        };
        f.write_str(name)
    }
}

/// A single backend server within a pool. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// `host:port` of the backend
    pub address: String,
    /// Relative selection weight, always >= 1
    pub weight: u32,
    pub group: ApiGroup,
}

impl BackendDescriptor {
    pub fn new(address: impl Into<String>, weight: u32, group: ApiGroup) -> Self {
        Self {
            address: address.into(),
            weight,
            group,
        }
    }

    /// Base URL for forwarding and probing
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }
}

/// Ordered set of backends sharing one API group.
///
/// Invariant (enforced at configuration load): non-empty, every weight >= 1.
#[derive(Debug, Clone)]
pub struct BackendPool {
    group: ApiGroup,
    servers: Vec<BackendDescriptor>,
}

impl BackendPool {
    pub fn new(group: ApiGroup, servers: Vec<BackendDescriptor>) -> Self {
        Self { group, servers }
    }

    pub fn group(&self) -> ApiGroup {
        self.group
    }

    pub fn servers(&self) -> &[BackendDescriptor] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Positional lookup, used by the preference override
    pub fn get(&self, index: usize) -> Option<&BackendDescriptor> {
        self.servers.get(index)
    }

    pub fn total_weight(&self) -> u32 {
        self.servers.iter().map(|s| s.weight).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> BackendPool {
        BackendPool::new(
            ApiGroup::Rest,
            vec![
                BackendDescriptor::new("127.0.0.1:5073", 2, ApiGroup::Rest),
                BackendDescriptor::new("127.0.0.1:5173", 1, ApiGroup::Rest),
            ],
        )
    }

    #[test]
    fn test_total_weight() {
        assert_eq!(pool().total_weight(), 3);
    }

    #[test]
    fn test_positional_lookup() {
        let pool = pool();
        assert_eq!(pool.get(1).unwrap().address, "127.0.0.1:5173");
        assert!(pool.get(2).is_none());
    }

    #[test]
    fn test_group_display_matches_config_spelling() {
        assert_eq!(ApiGroup::Rest.to_string(), "REST");
        assert_eq!(ApiGroup::Graphql.to_string(), "GRAPHQL");
        assert_eq!(ApiGroup::Grpc.to_string(), "GRPC");
    }

    #[test]
    fn test_group_deserializes_from_config_spelling() {
        let group: ApiGroup = serde_json::from_str("\"GRAPHQL\"").unwrap();
        assert_eq!(group, ApiGroup::Graphql);
    }

    #[test]
    fn test_base_url() {
        let backend = BackendDescriptor::new("127.0.0.1:5073", 2, ApiGroup::Rest);
        assert_eq!(backend.base_url(), "http://127.0.0.1:5073");
    }
}
