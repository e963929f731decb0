//! Asynchronous emission of per-request routing decisions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::backend::pool::ApiGroup;
use crate::error::Result;

/// The recorded outcome of one request's classification and selection
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub timestamp: DateTime<Utc>,
    pub client_addr: SocketAddr,
    pub group: ApiGroup,
    /// `host:port` of the chosen backend
    pub backend: String,
    pub selection_latency_us: u64,
}

impl RoutingDecision {
    pub fn new(
        client_addr: SocketAddr,
        group: ApiGroup,
        backend: String,
        selection_latency: Duration,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            client_addr,
            group,
            backend,
            selection_latency_us: selection_latency.as_micros() as u64,
        }
    }
}

/// Destination for routing decisions; the medium is a collaborator
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, decision: &RoutingDecision) -> Result<()>;
}

/// Default sink: structured log records
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, decision: &RoutingDecision) -> Result<()> {
        info!(
            target: "audit",
            timestamp = %decision.timestamp,
            client = %decision.client_addr,
            group = %decision.group,
            backend = %decision.backend,
            selection_latency_us = decision.selection_latency_us,
            "Routing decision"
        );
        Ok(())
    }
}

/// JSON-lines file sink
pub struct JsonFileAuditSink {
    file: Mutex<tokio::fs::File>,
    path: PathBuf,
}

impl JsonFileAuditSink {
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonFileAuditSink {
    async fn record(&self, decision: &RoutingDecision) -> Result<()> {
        let mut line = serde_json::to_vec(decision)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        Ok(())
    }
}

/// Handle the request path uses to emit decisions.
///
/// Emission is a channel send; a background task drains the channel into
/// the sink, so selection and forwarding never wait on persistence.
pub struct AuditLog {
    audit_tx: mpsc::UnboundedSender<RoutingDecision>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        let (audit_tx, mut audit_rx) = mpsc::unbounded_channel::<RoutingDecision>();

        tokio::spawn(async move {
            while let Some(decision) = audit_rx.recv().await {
                if let Err(e) = sink.record(&decision).await {
                    warn!(error = %e, "Audit sink write failed");
                }
            }
        });

        Self { audit_tx }
    }

    /// Non-blocking emission; a closed drain task drops the record
    pub fn emit(&self, decision: RoutingDecision) {
        let _ = self.audit_tx.send(decision);
    }
}
