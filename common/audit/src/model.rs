use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Who caused an audited change. Services acting on their own behalf only carry a name.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AuditActor {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuditActor {
    pub fn system(name: impl Into<String>) -> Self {
        Self { id: None, name: Some(name.into()), email: None }
    }
}

pub const AUDIT_EVENT_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    #[default]
    Info,
    Warning,
    /// Money moved.
    Financial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub event_version: i32,
    pub actor: AuditActor,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub action: String,
    pub occurred_at: DateTime<Utc>,
    pub source_service: String,
    pub severity: AuditSeverity,
    pub trace_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub meta: serde_json::Value,
}

impl AuditEvent {
    /// Partition key: the entity when there is one, so its events stay ordered.
    pub fn partition_key(&self) -> String {
        self.entity_id.unwrap_or(self.event_id).to_string()
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit serialization failed: {0}")]
    Serialization(String),
    #[error("audit sink unavailable: {0}")]
    Kafka(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
