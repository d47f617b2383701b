use crate::{AuditActor, AuditEvent, AuditError, AuditResult, AUDIT_EVENT_VERSION, AuditSeverity};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Destination for serialized audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, event: &AuditEvent) -> AuditResult<()>;
}

/// Accepts and drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn publish(&self, _topic: &str, _key: &str, _event: &AuditEvent) -> AuditResult<()> { Ok(()) }
}

/// Keeps events in memory; used by tests and local tooling.
#[derive(Debug, Clone, Default)]
pub struct CapturingAuditSink {
    events: Arc<Mutex<Vec<(String, AuditEvent)>>>,
}

impl CapturingAuditSink {
    pub fn new() -> Self { Self::default() }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|g| g.iter().map(|(_, e)| e.clone()).collect()).unwrap_or_default()
    }

    pub fn topics(&self) -> Vec<String> {
        self.events.lock().map(|g| g.iter().map(|(t, _)| t.clone()).collect()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for CapturingAuditSink {
    async fn publish(&self, topic: &str, _key: &str, event: &AuditEvent) -> AuditResult<()> {
        let mut guard = self.events.lock().map_err(|e| AuditError::Serialization(e.to_string()))?;
        guard.push((topic.to_string(), event.clone()));
        Ok(())
    }
}

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
pub struct KafkaAuditSink {
    producer: rdkafka::producer::FutureProducer,
}

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
impl KafkaAuditSink {
    pub fn new(producer: rdkafka::producer::FutureProducer) -> Self { Self { producer } }

    pub fn from_bootstrap(bootstrap: &str) -> AuditResult<Self> {
        let producer = rdkafka::ClientConfig::new()
            .set("bootstrap.servers", bootstrap)
            .create()
            .map_err(|e: rdkafka::error::KafkaError| AuditError::Kafka(e.to_string()))?;
        Ok(Self { producer })
    }
}

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
#[async_trait]
impl AuditSink for KafkaAuditSink {
    async fn publish(&self, topic: &str, key: &str, event: &AuditEvent) -> AuditResult<()> {
        use rdkafka::producer::FutureRecord;
        use std::time::Duration;
        let serialized = serde_json::to_vec(event).map_err(|e| AuditError::Serialization(e.to_string()))?;
        let record = FutureRecord::to(topic).key(key).payload(&serialized);
        if let Err((e, _)) = self.producer.send(record, Duration::from_secs(5)).await {
            return Err(AuditError::Kafka(e.to_string()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AuditProducerConfig {
    pub topic: String,
    pub source_service: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub emitted: u64,
    pub failed: u64,
}

/// Builds versioned events and hands them to a sink, counting outcomes.
pub struct AuditProducer<S: AuditSink> {
    sink: S,
    config: AuditProducerConfig,
    emitted: AtomicU64,
    failed: AtomicU64,
}

impl<S: AuditSink> AuditProducer<S> {
    pub fn new(sink: S, config: AuditProducerConfig) -> Self {
        Self { sink, config, emitted: AtomicU64::new(0), failed: AtomicU64::new(0) }
    }

    pub fn sink(&self) -> &S { &self.sink }

    #[allow(clippy::too_many_arguments)]
    pub async fn emit(
        &self,
        actor: AuditActor,
        entity_type: impl Into<String>,
        entity_id: Option<Uuid>,
        action: impl Into<String>,
        severity: AuditSeverity,
        trace_id: Option<Uuid>,
        payload: serde_json::Value,
        meta: serde_json::Value,
    ) -> AuditResult<AuditEvent> {
        let event = AuditEvent {
            event_id: Uuid::new_v4(),
            event_version: AUDIT_EVENT_VERSION,
            actor,
            entity_type: entity_type.into(),
            entity_id,
            action: action.into(),
            occurred_at: Utc::now(),
            source_service: self.config.source_service.clone(),
            severity,
            trace_id,
            payload,
            meta,
        };
        let key = event.partition_key();
        match self.sink.publish(&self.config.topic, &key, &event).await {
            Ok(()) => {
                self.emitted.fetch_add(1, Ordering::Relaxed);
                Ok(event)
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %err, action = %event.action, "Audit event emission failed");
                Err(err)
            }
        }
    }

    pub fn snapshot(&self) -> AuditStats {
        AuditStats { emitted: self.emitted.load(Ordering::Relaxed), failed: self.failed.load(Ordering::Relaxed) }
    }
}
