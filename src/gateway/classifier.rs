//! Request path classification into API groups

use crate::backend::pool::ApiGroup;

/// Map an inbound request path to the API group that serves it.
///
/// Pure prefix match, checked in order: `/graphql` wins over `/api/grpc`,
/// everything else is REST.
pub fn classify(path: &str) -> ApiGroup {
    if path.starts_with("/graphql") {
        ApiGroup::Graphql
    } else if path.starts_with("/api/grpc") {
        ApiGroup::Grpc
    } else {
        ApiGroup::Rest
    }
}
