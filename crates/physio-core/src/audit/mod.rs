//! Audit/notification event contract.
//!
//! Lifecycle events are delivered to an [`AuditSink`] on a fire-and-forget
//! basis: a failing sink is logged and never fails the operation that
//! produced the event.

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventType {
    SessionCreated,
    SessionStatusChanged,
    TransferRequested,
    TransferResolved,
    /// A committed reassignment, direct or through an approved request.
    PatientTransferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub entity_id: String,
    pub actor_id: String,
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub payload: Value,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        entity_id: impl Into<String>,
        actor_id: impl Into<String>,
        timestamp: NaiveDateTime,
        payload: Value,
    ) -> Self {
        Self {
            event_type,
            entity_id: entity_id.into(),
            actor_id: actor_id.into(),
            timestamp,
            payload,
        }
    }
}

/// Receiver of lifecycle events (dashboards, notification fan-out).
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, event: AuditEvent) -> Result<()>;
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn emit(&self, _event: AuditEvent) -> Result<()> {
        Ok(())
    }
}

/// Emits `event`, downgrading any sink failure to a warning.
pub async fn emit_quietly(sink: &dyn AuditSink, event: AuditEvent) {
    let event_type = event.event_type;
    let entity_id = event.entity_id.clone();
    if let Err(e) = sink.emit(event).await {
        tracing::warn!(
            ?event_type,
            entity_id = %entity_id,
            error = %e,
            "Audit sink rejected event; continuing"
        );
    }
}
