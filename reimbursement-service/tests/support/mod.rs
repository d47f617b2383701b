#![allow(dead_code)]

use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use common_audit::CapturingAuditSink;
use common_observability::ReimbursementMetrics;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reimbursement_service::{
    AcceptanceStatus, AuditNotifier, CustomerReturn, InMemoryStore, Order, Payment, ReimbursementConfig,
    ReimbursementService, ReimbursementStore, ReturnItem,
};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub const RNG_SEED: u64 = 11;

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).expect("decimal literal")
}

/// Accepted item with no tax; attach it with `Fixture::add_return`.
pub fn accepted(pre_tax: &str) -> ReturnItem {
    ReturnItem::new(Uuid::nil(), dec(pre_tax)).with_status(AcceptanceStatus::Accepted)
}

pub struct Fixture {
    pub store: InMemoryStore,
    pub sink: CapturingAuditSink,
    pub metrics: Arc<ReimbursementMetrics>,
    pub order: Order,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_currency("USD")
    }

    pub fn with_currency(currency: &str) -> Self {
        let store = InMemoryStore::new();
        let order = Order { id: Uuid::new_v4(), number: "R100200300".into(), currency: currency.into() };
        store.insert_order(order.clone());
        Self { store, sink: CapturingAuditSink::new(), metrics: Arc::new(ReimbursementMetrics::new()), order }
    }

    /// Completed payment created `offset_secs` after a fixed base so ordering is deterministic.
    pub fn add_payment(&self, amount: &str, offset_secs: i64) -> Payment {
        let mut payment = Payment::completed(self.order.id, dec(amount));
        payment.created_at = Utc::now() - Duration::hours(1) + Duration::seconds(offset_secs);
        self.store.insert_payment(payment.clone());
        payment
    }

    pub fn add_return(&self, items: Vec<ReturnItem>) -> CustomerReturn {
        let id = Uuid::new_v4();
        let return_items = items
            .into_iter()
            .map(|mut item| {
                item.customer_return_id = id;
                item
            })
            .collect();
        let customer_return = CustomerReturn {
            id,
            number: format!("CR{}", &id.simple().to_string()[..8]),
            order_id: self.order.id,
            return_items,
        };
        self.store.insert_customer_return(customer_return.clone());
        customer_return
    }

    pub fn service(&self) -> ReimbursementService {
        self.service_with(ReimbursementConfig::default())
    }

    pub fn service_with(&self, config: ReimbursementConfig) -> ReimbursementService {
        self.service_over(Arc::new(self.store.clone()), config)
    }

    pub fn service_over(&self, store: Arc<dyn ReimbursementStore>, config: ReimbursementConfig) -> ReimbursementService {
        let notifier = Arc::new(AuditNotifier::new(self.sink.clone(), config.audit_topic.clone(), config.source_service.clone()));
        ReimbursementService::new(store, notifier, config, self.metrics.clone())
            .with_rng(StdRng::seed_from_u64(RNG_SEED))
    }
}
