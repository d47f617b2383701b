use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::allocation::Allocation;
use crate::exchange::ExchangeRequest;
use crate::model::{ExchangeUnit, Refund};

/// Compare-and-set guard on a payment's refunded amount.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityCheck {
    pub payment_id: Uuid,
    pub expected_refunded: BigDecimal,
    pub new_refunded: BigDecimal,
}

/// Every write a perform produces. A store applies all of it or none of it.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    pub reimbursement_id: Uuid,
    pub order_id: Uuid,
    pub total: BigDecimal,
    pub performed_at: DateTime<Utc>,
    pub refunds: Vec<Refund>,
    pub capacity_checks: Vec<CapacityCheck>,
    pub exchange_units: Vec<ExchangeUnit>,
}

impl UnitOfWork {
    pub fn new(reimbursement_id: Uuid, order_id: Uuid, total: BigDecimal) -> Self {
        Self {
            reimbursement_id,
            order_id,
            total,
            performed_at: Utc::now(),
            refunds: Vec::new(),
            capacity_checks: Vec::new(),
            exchange_units: Vec::new(),
        }
    }

    pub fn record_allocation(&mut self, allocation: &Allocation) {
        for planned in &allocation.refunds {
            self.refunds.push(Refund {
                id: Uuid::new_v4(),
                payment_id: planned.payment_id,
                reimbursement_id: self.reimbursement_id,
                amount: planned.amount.clone(),
                created_at: self.performed_at,
            });
            self.capacity_checks.push(CapacityCheck {
                payment_id: planned.payment_id,
                expected_refunded: planned.observed_refunded.clone(),
                new_refunded: &planned.observed_refunded + &planned.amount,
            });
        }
    }

    pub fn record_exchanges(&mut self, requests: &[ExchangeRequest]) {
        for request in requests {
            self.exchange_units.push(ExchangeUnit {
                id: Uuid::new_v4(),
                variant_id: request.variant_id,
                return_item_id: request.return_item_id,
                reimbursement_id: self.reimbursement_id,
            });
        }
    }

    pub fn refund_total(&self) -> BigDecimal {
        self.refunds.iter().fold(BigDecimal::from(0), |acc, r| acc + &r.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::PlannedRefund;
    use std::str::FromStr;

    #[test]
    fn records_refunds_with_cas_guards() {
        let payment_id = Uuid::new_v4();
        let allocation = Allocation {
            refunds: vec![PlannedRefund {
                payment_id,
                amount: BigDecimal::from_str("7.50").unwrap(),
                observed_refunded: BigDecimal::from_str("2.50").unwrap(),
            }],
            remaining: BigDecimal::from(0),
        };
        let mut work = UnitOfWork::new(Uuid::new_v4(), Uuid::new_v4(), BigDecimal::from_str("7.50").unwrap());
        work.record_allocation(&allocation);
        assert_eq!(work.refunds.len(), 1);
        assert_eq!(work.refunds[0].reimbursement_id, work.reimbursement_id);
        assert_eq!(work.capacity_checks[0].new_refunded, BigDecimal::from(10));
        assert_eq!(work.refund_total(), work.total);
    }
}
