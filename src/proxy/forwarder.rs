//! Protocol-aware request forwarding to a chosen backend

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, Method, Response};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::pool::{ApiGroup, BackendDescriptor};
use crate::config::ForwardConfig;
use crate::error::{AppError, Result};

/// Headers that describe a single hop and must not be relayed
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// The inbound request, captured for dispatch to a backend
#[derive(Debug)]
pub struct ForwardRequest {
    pub method: Method,
    /// Original path plus query string, preserved verbatim
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub group: ApiGroup,
}

/// Builds the outbound call to the chosen backend and relays the result.
///
/// REST and GRPC-tagged pools are forwarded as plain HTTP with the original
/// method, headers and body (body omitted for GET). GraphQL accepts only
/// POST and sends the body with a fixed JSON content type. Transport
/// failures are terminal for the request; nothing is retried.
pub struct Forwarder {
    client: Client,
}

impl Forwarder {
    pub fn new(config: &ForwardConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create forward client: {}", e)))?;

        Ok(Self { client })
    }

    /// Forward `request` to `backend` and relay status, headers and body
    pub async fn forward(
        &self,
        backend: &BackendDescriptor,
        request: ForwardRequest,
    ) -> Result<Response<Body>> {
        let url = format!("{}{}", backend.base_url(), request.path_and_query);

        let outbound = match request.group {
            ApiGroup::Graphql => {
                // Rejected before any network call is attempted
                if request.method != Method::POST {
                    return Err(AppError::MethodNotAllowed(request.method.to_string()));
                }
                self.client
                    .post(&url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(request.body)
            }
            ApiGroup::Rest | ApiGroup::Grpc => {
                let mut builder = self
                    .client
                    .request(request.method.clone(), &url)
                    .headers(relay_headers(&request.headers));
                if request.method != Method::GET {
                    builder = builder.body(request.body);
                }
                builder
            }
        };

        debug!(backend = %backend.address, url = %url, group = %request.group, "Forwarding request");

        let upstream = outbound.send().await.map_err(|source| {
            warn!(backend = %backend.address, error = %source, "Forward transport failure");
            AppError::ForwardFailure {
                address: backend.address.clone(),
                source,
            }
        })?;

        relay_response(backend, upstream).await
    }
}

/// Copy the backend's status, headers and body into the client response
async fn relay_response(
    backend: &BackendDescriptor,
    upstream: reqwest::Response,
) -> Result<Response<Body>> {
    let status = upstream.status();
    let headers = upstream.headers().clone();
    let body = upstream.bytes().await.map_err(|source| AppError::ForwardFailure {
        address: backend.address.clone(),
        source,
    })?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    for (name, value) in headers.iter() {
        // content-length is recomputed for the buffered body
        if !is_hop_by_hop(name) && name != header::CONTENT_LENGTH {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }

    Ok(response)
}

/// Request headers minus hop-by-hop entries and Host, which reqwest sets
/// for the rewritten target
fn relay_headers(headers: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::new();
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name) || name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        relayed.append(name.clone(), value.clone());
    }
    relayed
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}
