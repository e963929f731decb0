//! Dispatch admission - direct concurrent forwarding or the paced queue

pub mod queue;

pub use queue::DispatchQueue;

use axum::body::Body;
use axum::http::Response;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::pool::BackendDescriptor;
use crate::config::{RoutingAlgorithm, Settings};
use crate::error::Result;
use crate::proxy::{ForwardRequest, Forwarder};

/// Admission discipline, fixed for the process lifetime by the configured
/// routing algorithm.
pub enum Admission {
    /// Each request forwarded immediately on its own task
    Direct { forwarder: Arc<Forwarder> },
    /// Requests drained by the paced FIFO worker
    Queued { queue: DispatchQueue },
}

impl Admission {
    pub fn from_settings(settings: &Settings, forwarder: Arc<Forwarder>) -> Self {
        match settings.routing.algorithm {
            RoutingAlgorithm::WeightedRotation => Self::Direct { forwarder },
            RoutingAlgorithm::QueueDiscipline => Self::Queued {
                queue: DispatchQueue::new(
                    forwarder,
                    Duration::from_millis(settings.routing.queue_pacing_ms),
                    settings.routing.max_queue_depth,
                ),
            },
        }
    }

    /// Hand a selected dispatch to the configured discipline
    pub async fn dispatch(
        &self,
        backend: BackendDescriptor,
        request: ForwardRequest,
    ) -> Result<Response<Body>> {
        match self {
            Self::Direct { forwarder } => forwarder.forward(&backend, request).await,
            Self::Queued { queue } => queue.submit(backend, request).await,
        }
    }

    /// Queued dispatches awaiting the worker; zero under direct admission
    pub fn queue_depth(&self) -> usize {
        match self {
            Self::Direct { .. } => 0,
            Self::Queued { queue } => queue.depth(),
        }
    }
}
