//! Per-request logging middleware

use axum::{body::Body, http::Request, response::Response};
use futures::future::BoxFuture;
use std::{
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::info;
use uuid::Uuid;

/// Request logging layer
#[derive(Clone, Default)]
pub struct RequestLogLayer;

impl RequestLogLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogMiddleware { inner }
    }
}

/// Logs one line per handled request: id, method, path, status, elapsed
#[derive(Clone)]
pub struct RequestLogMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestLogMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let request_id = Uuid::new_v4();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let start = Instant::now();

        let future = self.inner.call(request);
        Box::pin(async move {
            let response = future.await?;
            info!(
                %request_id,
                %method,
                %path,
                status = response.status().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request handled"
            );
            Ok(response)
        })
    }
}
