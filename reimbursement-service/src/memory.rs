use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::model::{CustomerReturn, ExchangeShipment, Order, Payment, Refund, Reimbursement, ReimbursementStatus};
use crate::repo::{ReimbursementStore, StoreError};
use crate::unit_of_work::UnitOfWork;

#[derive(Default)]
struct MemoryState {
    orders: HashMap<Uuid, Order>,
    payments: Vec<Payment>,
    customer_returns: HashMap<Uuid, CustomerReturn>,
    reimbursements: HashMap<Uuid, Reimbursement>,
    refunds: Vec<Refund>,
    shipments: HashMap<Uuid, ExchangeShipment>,
}

/// Process-local store. One mutex guards everything, so every call is serialized
/// and a commit is all-or-nothing.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_order(&self, order: Order) {
        self.lock().orders.insert(order.id, order);
    }

    pub fn insert_payment(&self, payment: Payment) {
        self.lock().payments.push(payment);
    }

    pub fn insert_customer_return(&self, customer_return: CustomerReturn) {
        self.lock().customer_returns.insert(customer_return.id, customer_return);
    }

    pub fn payment(&self, id: Uuid) -> Option<Payment> {
        self.lock().payments.iter().find(|p| p.id == id).cloned()
    }

    pub fn refunds(&self) -> Vec<Refund> {
        self.lock().refunds.clone()
    }

    pub fn refunds_for_payment(&self, payment_id: Uuid) -> Vec<Refund> {
        self.lock().refunds.iter().filter(|r| r.payment_id == payment_id).cloned().collect()
    }

    /// Refund recorded outside any reimbursement, e.g. a manual refund at the till.
    pub fn record_external_refund(&self, payment_id: Uuid, amount: &BigDecimal) -> Result<(), StoreError> {
        let mut state = self.lock();
        let payment = state
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or(StoreError::NotFound { entity: "payment", id: payment_id })?;
        payment.refunded = &payment.refunded + amount;
        Ok(())
    }

    fn hydrate(state: &MemoryState, stored: &Reimbursement) -> Reimbursement {
        let mut reimbursement = stored.clone();
        reimbursement.return_items = state
            .customer_returns
            .get(&stored.customer_return_id)
            .map(|cr| {
                cr.return_items
                    .iter()
                    .filter(|item| item.reimbursement_id == Some(stored.id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        reimbursement.refunds = state
            .refunds
            .iter()
            .filter(|r| r.reimbursement_id == stored.id)
            .cloned()
            .collect();
        reimbursement
    }
}

#[async_trait]
impl ReimbursementStore for InMemoryStore {
    async fn customer_return(&self, id: Uuid) -> Result<Option<CustomerReturn>, StoreError> {
        Ok(self.lock().customer_returns.get(&id).cloned())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        Ok(self.lock().payments.iter().filter(|p| p.order_id == order_id).cloned().collect())
    }

    async fn reimbursement(&self, id: Uuid) -> Result<Option<Reimbursement>, StoreError> {
        let state = self.lock();
        Ok(state.reimbursements.get(&id).map(|stored| Self::hydrate(&state, stored)))
    }

    async fn number_exists(&self, number: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .reimbursements
            .values()
            .any(|r| r.number.as_deref() == Some(number)))
    }

    async fn insert_reimbursement(&self, reimbursement: &Reimbursement) -> Result<(), StoreError> {
        let mut state = self.lock();
        let number = reimbursement.number.as_deref().ok_or(StoreError::MissingNumber)?;
        if state.reimbursements.values().any(|r| r.number.as_deref() == Some(number)) {
            return Err(StoreError::DuplicateNumber(number.to_string()));
        }
        let customer_return = state
            .customer_returns
            .get_mut(&reimbursement.customer_return_id)
            .ok_or(StoreError::NotFound { entity: "customer_return", id: reimbursement.customer_return_id })?;

        // validate every claim before touching any item
        for wanted in &reimbursement.return_items {
            let item = customer_return
                .return_items
                .iter()
                .find(|i| i.id == wanted.id)
                .ok_or(StoreError::NotFound { entity: "return_item", id: wanted.id })?;
            if item.reimbursement_id.is_some() {
                return Err(StoreError::ReturnItemTaken(item.id));
            }
        }
        for item in customer_return.return_items.iter_mut() {
            if reimbursement.return_items.iter().any(|wanted| wanted.id == item.id) {
                item.reimbursement_id = Some(reimbursement.id);
            }
        }

        let mut stored = reimbursement.clone();
        stored.refunds.clear();
        state.reimbursements.insert(stored.id, stored);
        Ok(())
    }

    async fn commit(&self, work: UnitOfWork) -> Result<(), StoreError> {
        let mut state = self.lock();
        let status = state
            .reimbursements
            .get(&work.reimbursement_id)
            .map(|r| r.status)
            .ok_or(StoreError::NotFound { entity: "reimbursement", id: work.reimbursement_id })?;
        if status != ReimbursementStatus::Pending {
            return Err(StoreError::Conflict { entity: "reimbursement", id: work.reimbursement_id });
        }
        for check in &work.capacity_checks {
            let payment = state
                .payments
                .iter()
                .find(|p| p.id == check.payment_id)
                .ok_or(StoreError::NotFound { entity: "payment", id: check.payment_id })?;
            if payment.refunded != check.expected_refunded {
                return Err(StoreError::Conflict { entity: "payment", id: check.payment_id });
            }
        }

        for check in &work.capacity_checks {
            if let Some(payment) = state.payments.iter_mut().find(|p| p.id == check.payment_id) {
                payment.refunded = check.new_refunded.clone();
            }
        }
        state.refunds.extend(work.refunds.iter().cloned());
        if !work.exchange_units.is_empty() {
            let shipment = state.shipments.entry(work.order_id).or_insert_with(|| ExchangeShipment {
                id: Uuid::new_v4(),
                order_id: work.order_id,
                units: Vec::new(),
                created_at: Utc::now(),
            });
            shipment.units.extend(work.exchange_units.iter().cloned());
        }
        if let Some(reimbursement) = state.reimbursements.get_mut(&work.reimbursement_id) {
            reimbursement.status = ReimbursementStatus::Reimbursed;
            reimbursement.total = work.total.clone();
            reimbursement.performed_at = Some(work.performed_at);
        }
        Ok(())
    }

    async fn exchange_shipment(&self, order_id: Uuid) -> Result<Option<ExchangeShipment>, StoreError> {
        Ok(self.lock().shipments.get(&order_id).cloned())
    }
}
