use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use common_audit::{AuditActor, AuditError, AuditProducer, AuditProducerConfig, AuditSeverity, AuditSink};

use crate::model::Reimbursement;

pub const PERFORMED_ACTION: &str = "reimbursement.performed";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Told once about every reimbursement that has been committed.
#[async_trait]
pub trait ReimbursementNotifier: Send + Sync {
    async fn reimbursement_performed(&self, reimbursement: &Reimbursement) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl ReimbursementNotifier for NoopNotifier {
    async fn reimbursement_performed(&self, _reimbursement: &Reimbursement) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Publishes a `reimbursement.performed` audit event per committed reimbursement.
pub struct AuditNotifier<S: AuditSink> {
    producer: AuditProducer<S>,
    actor: String,
}

impl<S: AuditSink> AuditNotifier<S> {
    pub fn new(sink: S, topic: impl Into<String>, source_service: impl Into<String>) -> Self {
        let config = AuditProducerConfig { topic: topic.into(), source_service: source_service.into() };
        let actor = config.source_service.clone();
        Self { producer: AuditProducer::new(sink, config), actor }
    }

    pub fn producer(&self) -> &AuditProducer<S> {
        &self.producer
    }
}

#[async_trait]
impl<S: AuditSink + 'static> ReimbursementNotifier for AuditNotifier<S> {
    async fn reimbursement_performed(&self, reimbursement: &Reimbursement) -> Result<(), NotifyError> {
        let refunds: Vec<_> = reimbursement
            .refunds
            .iter()
            .map(|r| json!({ "refund_id": r.id, "payment_id": r.payment_id, "amount": r.amount.to_string() }))
            .collect();
        let payload = json!({
            "number": reimbursement.number,
            "order_id": reimbursement.order_id,
            "customer_return_id": reimbursement.customer_return_id,
            "total": reimbursement.total.to_string(),
            "return_item_ids": reimbursement.return_items.iter().map(|i| i.id).collect::<Vec<_>>(),
            "refunds": refunds,
        });
        let meta = json!({ "performed_at": reimbursement.performed_at });
        self.producer
            .emit(
                AuditActor::system(self.actor.clone()),
                "reimbursement",
                Some(reimbursement.id),
                PERFORMED_ACTION,
                AuditSeverity::Financial,
                None,
                payload,
                meta,
            )
            .await?;
        Ok(())
    }
}
