//! Paced FIFO queue draining dispatches through a single worker

use axum::body::Body;
use axum::http::Response;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::backend::pool::BackendDescriptor;
use crate::error::{AppError, Result};
use crate::proxy::{ForwardRequest, Forwarder};

/// A dispatch waiting in the queue, destroyed once forwarded or abandoned
struct QueuedDispatch {
    backend: BackendDescriptor,
    request: ForwardRequest,
    response_tx: oneshot::Sender<Result<Response<Body>>>,
}

/// FIFO admission queue.
///
/// Push is safe from any request task; a lone worker drains the queue,
/// sleeping the pacing delay before each forward and awaiting its
/// completion before taking the next item, so forwards are issued in strict
/// arrival order. Depth policy: submissions beyond `max_depth` are rejected
/// with `QueueFull` (503); there are no priority tiers.
pub struct DispatchQueue {
    dispatch_tx: mpsc::Sender<QueuedDispatch>,
    depth: Arc<AtomicUsize>,
    max_depth: usize,
}

impl DispatchQueue {
    pub fn new(forwarder: Arc<Forwarder>, pacing: Duration, max_depth: usize) -> Self {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(max_depth.max(1));
        let depth = Arc::new(AtomicUsize::new(0));

        let worker_depth = depth.clone();
        tokio::spawn(async move {
            drain(dispatch_rx, forwarder, pacing, worker_depth).await;
        });
        info!(pacing_ms = pacing.as_millis() as u64, max_depth, "Started dispatch queue worker");

        Self {
            dispatch_tx,
            depth,
            max_depth,
        }
    }

    /// Enqueue a dispatch and wait for its outcome
    pub async fn submit(
        &self,
        backend: BackendDescriptor,
        request: ForwardRequest,
    ) -> Result<Response<Body>> {
        if self.depth.load(Ordering::Relaxed) >= self.max_depth {
            return Err(AppError::QueueFull);
        }

        let (response_tx, response_rx) = oneshot::channel();
        let queued = QueuedDispatch {
            backend,
            request,
            response_tx,
        };

        self.depth.fetch_add(1, Ordering::Relaxed);
        if self.dispatch_tx.send(queued).await.is_err() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            return Err(AppError::Internal("Dispatch worker is gone".to_string()));
        }

        debug!(depth = self.depth(), "Request queued");

        match response_rx.await {
            Ok(result) => result,
            Err(_) => Err(AppError::Internal(
                "Dispatch worker dropped the request".to_string(),
            )),
        }
    }

    /// Current number of queued dispatches
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

/// The lone sequential worker
async fn drain(
    mut dispatch_rx: mpsc::Receiver<QueuedDispatch>,
    forwarder: Arc<Forwarder>,
    pacing: Duration,
    depth: Arc<AtomicUsize>,
) {
    while let Some(queued) = dispatch_rx.recv().await {
        tokio::time::sleep(pacing).await;

        let QueuedDispatch {
            backend,
            request,
            mut response_tx,
        } = queued;

        // Slot released without an outbound call when the client is gone
        if response_tx.is_closed() {
            depth.fetch_sub(1, Ordering::Relaxed);
            debug!(backend = %backend.address, "Client gone before dispatch; slot released");
            continue;
        }

        tokio::select! {
            _ = response_tx.closed() => {
                debug!(
                    backend = %backend.address,
                    "Client disconnected mid-forward; abandoning outbound call"
                );
            }
            result = forwarder.forward(&backend, request) => {
                let _ = response_tx.send(result);
            }
        }

        depth.fetch_sub(1, Ordering::Relaxed);
    }
}
