use bigdecimal::BigDecimal;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use common_observability::ReimbursementMetrics;

use crate::allocation::{allocate, Allocation};
use crate::config::ReimbursementConfig;
use crate::error::ReimbursementError;
use crate::exchange::{plan_exchanges, ExchangeRequest};
use crate::model::{CustomerReturn, Reimbursement, ReimbursementStatus};
use crate::notify::ReimbursementNotifier;
use crate::number::generate_number;
use crate::repo::{ReimbursementStore, StoreError};
use crate::totals::{calculated_total, ExchangeTotalPolicy};
use crate::unit_of_work::UnitOfWork;

/// A perform computed against current payment capacity but not committed.
#[derive(Debug, Clone, Serialize)]
pub struct ReimbursementPlan {
    pub reimbursement_id: Uuid,
    pub total: BigDecimal,
    /// Part of `total` no payment can absorb; zero when the plan is complete.
    pub shortfall: BigDecimal,
    pub allocation: Allocation,
    pub exchanges: Vec<ExchangeRequest>,
}

impl ReimbursementPlan {
    pub fn is_complete(&self) -> bool {
        self.allocation.is_complete()
    }
}

/// Unsaved reimbursement over the customer return's accepted items that no
/// reimbursement has claimed yet.
pub fn build_from_customer_return(customer_return: &CustomerReturn, policy: ExchangeTotalPolicy) -> Reimbursement {
    let return_items: Vec<_> = customer_return
        .return_items
        .iter()
        .filter(|item| item.is_accepted() && !item.is_reimbursed())
        .cloned()
        .collect();
    let total = calculated_total(&return_items, policy);
    Reimbursement {
        id: Uuid::new_v4(),
        number: None,
        order_id: customer_return.order_id,
        customer_return_id: customer_return.id,
        return_items,
        total,
        status: ReimbursementStatus::Pending,
        performed_at: None,
        refunds: Vec::new(),
        created_at: Utc::now(),
    }
}

fn from_store(err: StoreError) -> ReimbursementError {
    match err {
        StoreError::ReturnItemTaken(id) => ReimbursementError::ReturnItemAlreadyReimbursed(id),
        StoreError::NotFound { entity, id } => ReimbursementError::NotFound { entity, id },
        other => ReimbursementError::Store(other),
    }
}

pub struct ReimbursementService {
    store: Arc<dyn ReimbursementStore>,
    notifier: Arc<dyn ReimbursementNotifier>,
    config: ReimbursementConfig,
    metrics: Arc<ReimbursementMetrics>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ReimbursementService {
    pub fn new(
        store: Arc<dyn ReimbursementStore>,
        notifier: Arc<dyn ReimbursementNotifier>,
        config: ReimbursementConfig,
        metrics: Arc<ReimbursementMetrics>,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            metrics,
            rng: Mutex::new(Box::new(StdRng::from_entropy())),
        }
    }

    /// Replaces the number source, e.g. with a seeded generator in tests.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    pub fn config(&self) -> &ReimbursementConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ReimbursementMetrics {
        &self.metrics
    }

    pub fn build_from_customer_return(&self, customer_return: &CustomerReturn) -> Reimbursement {
        build_from_customer_return(customer_return, self.config.exchange_policy)
    }

    pub fn calculated_total(&self, reimbursement: &Reimbursement) -> BigDecimal {
        calculated_total(&reimbursement.return_items, self.config.exchange_policy)
    }

    /// Total formatted in the currency of the reimbursement's order.
    pub async fn display_total(&self, reimbursement: &Reimbursement) -> Result<String, ReimbursementError> {
        let order = self
            .store
            .order(reimbursement.order_id)
            .await?
            .ok_or(ReimbursementError::NotFound { entity: "order", id: reimbursement.order_id })?;
        Ok(reimbursement.display_total(&order.currency))
    }

    fn draw_number(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        generate_number(&mut **rng)
    }

    async fn next_number(&self, attempts: &mut u32) -> Result<String, ReimbursementError> {
        let max = self.config.number_max_attempts.max(1);
        while *attempts < max {
            *attempts += 1;
            let candidate = self.draw_number();
            if !self.store.number_exists(&candidate).await? {
                return Ok(candidate);
            }
            warn!(number = %candidate, attempt = *attempts, "Reimbursement number collision");
        }
        Err(ReimbursementError::NumberExhausted { attempts: max })
    }

    /// Numbers the reimbursement unless it already carries one, stores it and
    /// attaches its return items.
    pub async fn create(&self, mut reimbursement: Reimbursement) -> Result<Reimbursement, ReimbursementError> {
        let supplied = reimbursement.number.is_some();
        let mut attempts = 0;
        loop {
            if !supplied {
                reimbursement.number = Some(self.next_number(&mut attempts).await?);
            }
            match self.store.insert_reimbursement(&reimbursement).await {
                Ok(()) => break,
                // lost a race for a number we generated; draw again
                Err(StoreError::DuplicateNumber(number)) if !supplied => {
                    warn!(number = %number, "Reimbursement number taken at insert");
                }
                Err(err) => return Err(from_store(err)),
            }
        }
        for item in reimbursement.return_items.iter_mut() {
            item.reimbursement_id = Some(reimbursement.id);
        }
        info!(
            reimbursement_id = %reimbursement.id,
            number = reimbursement.number.as_deref().unwrap_or_default(),
            order_id = %reimbursement.order_id,
            items = reimbursement.return_items.len(),
            total = %reimbursement.total,
            "Reimbursement created"
        );
        Ok(reimbursement)
    }

    pub async fn create_from_customer_return(&self, customer_return_id: Uuid) -> Result<Reimbursement, ReimbursementError> {
        let customer_return = self
            .store
            .customer_return(customer_return_id)
            .await?
            .ok_or(ReimbursementError::NotFound { entity: "customer_return", id: customer_return_id })?;
        let reimbursement = self.build_from_customer_return(&customer_return);
        self.create(reimbursement).await
    }

    async fn load_pending(&self, id: Uuid) -> Result<Reimbursement, ReimbursementError> {
        let reimbursement = self
            .store
            .reimbursement(id)
            .await?
            .ok_or(ReimbursementError::NotFound { entity: "reimbursement", id })?;
        if reimbursement.is_performed() {
            return Err(ReimbursementError::AlreadyPerformed(id));
        }
        Ok(reimbursement)
    }

    async fn plan(&self, reimbursement: &Reimbursement) -> Result<ReimbursementPlan, ReimbursementError> {
        let total = self.calculated_total(reimbursement);
        let mut payments = self.store.payments_for_order(reimbursement.order_id).await?;
        let allocation = allocate(&total, &mut payments);
        let exchanges = plan_exchanges(reimbursement.order_id, &reimbursement.return_items);
        Ok(ReimbursementPlan {
            reimbursement_id: reimbursement.id,
            shortfall: allocation.remaining.clone(),
            total,
            allocation,
            exchanges,
        })
    }

    /// Computes what `perform` would do right now without writing anything.
    pub async fn simulate(&self, id: Uuid) -> Result<ReimbursementPlan, ReimbursementError> {
        let reimbursement = self.load_pending(id).await?;
        self.plan(&reimbursement).await
    }

    /// Refunds the reimbursement total across the order's payments and ships any
    /// exchanges, all in one commit. A shortfall commits nothing.
    pub async fn perform(&self, id: Uuid) -> Result<Reimbursement, ReimbursementError> {
        let _timer = self.metrics.perform_duration_seconds.start_timer();
        let span = info_span!("perform_reimbursement", reimbursement_id = %id);
        self.perform_inner(id).instrument(span).await
    }

    async fn perform_inner(&self, id: Uuid) -> Result<Reimbursement, ReimbursementError> {
        let max_attempts = self.config.commit_max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let reimbursement = self.load_pending(id).await?;
            let plan = self.plan(&reimbursement).await?;

            if !plan.is_complete() {
                self.metrics.incomplete_total.inc();
                warn!(
                    order_id = %reimbursement.order_id,
                    total = %plan.total,
                    shortfall = %plan.shortfall,
                    "Payments cannot cover reimbursement"
                );
                let mut reimbursement = reimbursement;
                reimbursement.total = plan.total.clone();
                return Err(ReimbursementError::IncompleteReimbursement {
                    reimbursement: Box::new(reimbursement),
                    total: plan.total,
                    shortfall: plan.shortfall,
                });
            }

            let mut work = UnitOfWork::new(id, reimbursement.order_id, plan.total.clone());
            work.record_allocation(&plan.allocation);
            work.record_exchanges(&plan.exchanges);
            let refund_count = work.refunds.len() as u64;
            let unit_count = work.exchange_units.len() as u64;

            match self.store.commit(work).await {
                Ok(()) => {
                    self.metrics.performed_total.inc();
                    self.metrics.refunds_created_total.inc_by(refund_count);
                    self.metrics.exchange_units_total.inc_by(unit_count);
                    return self.finish(id).await;
                }
                Err(StoreError::Conflict { entity, id: conflicted }) => {
                    self.metrics.commit_conflicts_total.inc();
                    warn!(entity, conflicted = %conflicted, attempt, "Reimbursement commit conflicted");
                    // another perform may have won; the reload at the top reports it
                }
                Err(err) => return Err(from_store(err)),
            }
        }
        // a concurrent perform that won the last round surfaces as already performed
        self.load_pending(id).await?;
        Err(ReimbursementError::ConcurrentModification(id))
    }

    async fn finish(&self, id: Uuid) -> Result<Reimbursement, ReimbursementError> {
        let performed = self
            .store
            .reimbursement(id)
            .await?
            .ok_or(ReimbursementError::NotFound { entity: "reimbursement", id })?;
        info!(
            number = performed.number.as_deref().unwrap_or_default(),
            order_id = %performed.order_id,
            total = %performed.total,
            refunds = performed.refunds.len(),
            "Reimbursement performed"
        );
        if let Err(err) = self.notifier.reimbursement_performed(&performed).await {
            self.metrics.notify_failures_total.inc();
            error!(error = %err, "Reimbursement notification failed");
        }
        Ok(performed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AcceptanceStatus, ReturnItem};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn build_takes_only_accepted_unclaimed_items() {
        let cr_id = Uuid::new_v4();
        let accepted = ReturnItem::new(cr_id, dec("10.00")).with_status(AcceptanceStatus::Accepted);
        let rejected = ReturnItem::new(cr_id, dec("5.00")).with_status(AcceptanceStatus::Rejected);
        let pending = ReturnItem::new(cr_id, dec("5.00"));
        let mut claimed = ReturnItem::new(cr_id, dec("7.00")).with_status(AcceptanceStatus::Accepted);
        claimed.reimbursement_id = Some(Uuid::new_v4());
        let customer_return = CustomerReturn {
            id: cr_id,
            number: "CR0001".into(),
            order_id: Uuid::new_v4(),
            return_items: vec![accepted.clone(), rejected, pending, claimed],
        };

        let reimbursement = build_from_customer_return(&customer_return, ExchangeTotalPolicy::Exclude);
        assert_eq!(reimbursement.return_items, vec![accepted]);
        assert_eq!(reimbursement.order_id, customer_return.order_id);
        assert_eq!(reimbursement.customer_return_id, cr_id);
        assert_eq!(reimbursement.total, dec("10.00"));
        assert!(reimbursement.number.is_none());
        assert_eq!(reimbursement.status, ReimbursementStatus::Pending);
    }

    #[test]
    fn store_errors_map_to_domain_errors() {
        let item = Uuid::new_v4();
        assert!(matches!(
            from_store(StoreError::ReturnItemTaken(item)),
            ReimbursementError::ReturnItemAlreadyReimbursed(id) if id == item
        ));
        assert!(matches!(
            from_store(StoreError::MissingNumber),
            ReimbursementError::Store(StoreError::MissingNumber)
        ));
    }
}
