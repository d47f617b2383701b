pub mod model;
pub mod producer;

pub use model::{AuditEvent, AuditActor, AuditError, AuditResult, AUDIT_EVENT_VERSION, AuditSeverity};
pub use producer::{AuditSink, AuditProducer, AuditProducerConfig, AuditStats, CapturingAuditSink, NoopAuditSink};
#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
pub use producer::KafkaAuditSink;
