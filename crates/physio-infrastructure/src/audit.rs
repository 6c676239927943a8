//! Audit sink implementations.

use async_trait::async_trait;
use physio_core::audit::{AuditEvent, AuditSink};
use physio_core::error::{PhysioError, Result};
use tokio::sync::mpsc;

/// Writes every event as a structured `info` record on the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, event: AuditEvent) -> Result<()> {
        let payload = serde_json::to_string(&event.payload)?;
        tracing::info!(
            target: "audit",
            event_type = ?event.event_type,
            entity_id = %event.entity_id,
            actor_id = %event.actor_id,
            timestamp = %event.timestamp,
            payload = %payload,
            "audit event"
        );
        Ok(())
    }
}

/// Forwards events to a bounded channel (dashboard or notification fan-out).
///
/// A full or closed channel is reported as a storage error, which the
/// coordinator downgrades to a warning.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AuditSink for ChannelAuditSink {
    async fn emit(&self, event: AuditEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PhysioError::storage("audit channel is full"),
            mpsc::error::TrySendError::Closed(_) => {
                PhysioError::storage("audit channel is closed")
            }
        })
    }
}

/// Delivers each event to every inner sink; the first failure is returned
/// after all sinks have been tried.
pub struct FanoutAuditSink {
    sinks: Vec<std::sync::Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AuditSink for FanoutAuditSink {
    async fn emit(&self, event: AuditEvent) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
