use bigdecimal::BigDecimal;
use serde::Serialize;
use uuid::Uuid;

use crate::model::Payment;

/// One refund the engine wants to record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedRefund {
    pub payment_id: Uuid,
    pub amount: BigDecimal,
    /// `Payment::refunded` as seen when the refund was planned; the commit compares against it.
    pub observed_refunded: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub refunds: Vec<PlannedRefund>,
    /// Amount no payment could absorb. Zero when the allocation is complete.
    pub remaining: BigDecimal,
}

impl Allocation {
    pub fn is_complete(&self) -> bool {
        self.remaining <= BigDecimal::from(0)
    }

    pub fn refunded_total(&self) -> BigDecimal {
        self.refunds.iter().fold(BigDecimal::from(0), |acc, r| acc + &r.amount)
    }
}

/// Oldest first, id as tie-break, so repeated runs walk payments identically.
pub fn sort_for_allocation(payments: &mut [Payment]) {
    payments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Greedily draws `total` from each payment's remaining capacity.
///
/// Payments are taken in allocation order and their `refunded` value is advanced by the
/// amount drawn, so the slice reflects post-allocation capacity afterwards. Payments with
/// nothing left are skipped and zero refunds are never emitted. A non-empty `remaining`
/// means the payments could not cover the total; the caller must discard the result.
pub fn allocate(total: &BigDecimal, payments: &mut [Payment]) -> Allocation {
    let zero = BigDecimal::from(0);
    sort_for_allocation(payments);

    let mut need = if total > &zero { total.clone() } else { zero.clone() };
    let mut refunds = Vec::new();

    for payment in payments.iter_mut() {
        if need <= zero {
            break;
        }
        let capacity = payment.refundable_capacity();
        if capacity <= zero {
            continue;
        }
        let amount = if capacity < need { capacity } else { need.clone() };
        let observed_refunded = payment.refunded.clone();
        payment.refunded = &payment.refunded + &amount;
        need = need - &amount;
        refunds.push(PlannedRefund { payment_id: payment.id, amount, observed_refunded });
    }

    Allocation { refunds, remaining: need }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PaymentState;
    use chrono::{Duration, Utc};
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn payments(amounts: &[&str]) -> Vec<Payment> {
        let order_id = Uuid::new_v4();
        let base = Utc::now();
        amounts
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let mut p = Payment::completed(order_id, dec(a));
                p.created_at = base + Duration::seconds(i as i64);
                p
            })
            .collect()
    }

    #[test]
    fn single_payment_covers_total() {
        let mut ps = payments(&["50.00"]);
        let allocation = allocate(&dec("20.00"), &mut ps);
        assert!(allocation.is_complete());
        assert_eq!(allocation.refunds.len(), 1);
        assert_eq!(allocation.refunds[0].amount, dec("20.00"));
        assert_eq!(allocation.refunds[0].observed_refunded, dec("0"));
        assert_eq!(ps[0].refundable_capacity(), dec("30.00"));
    }

    #[test]
    fn spills_across_payments_in_creation_order() {
        let mut ps = payments(&["10.00", "15.00", "100.00"]);
        ps.reverse();
        let allocation = allocate(&dec("20.00"), &mut ps);
        assert!(allocation.is_complete());
        let amounts: Vec<String> = allocation.refunds.iter().map(|r| r.amount.to_string()).collect();
        assert_eq!(amounts, vec!["10.00", "10.00"]);
        assert_eq!(allocation.refunded_total(), dec("20.00"));
        assert_eq!(ps[0].refundable_capacity(), dec("0"));
        assert_eq!(ps[1].refundable_capacity(), dec("5.00"));
        assert_eq!(ps[2].refundable_capacity(), dec("100.00"));
    }

    #[test]
    fn shortfall_reports_remaining() {
        let mut ps = payments(&["5.00", "3.00"]);
        let allocation = allocate(&dec("10.00"), &mut ps);
        assert!(!allocation.is_complete());
        assert_eq!(allocation.remaining, dec("2.00"));
        assert_eq!(allocation.refunded_total(), dec("8.00"));
    }

    #[test]
    fn skips_exhausted_and_unsettled_payments() {
        let mut ps = payments(&["10.00", "10.00", "10.00"]);
        ps[0].refunded = dec("10.00");
        ps[1].state = PaymentState::Failed;
        let allocation = allocate(&dec("4.00"), &mut ps);
        assert_eq!(allocation.refunds.len(), 1);
        assert_eq!(allocation.refunds[0].payment_id, ps[2].id);
    }

    #[test]
    fn zero_total_allocates_nothing() {
        let mut ps = payments(&["10.00"]);
        let allocation = allocate(&dec("0"), &mut ps);
        assert!(allocation.is_complete());
        assert!(allocation.refunds.is_empty());
        let empty = allocate(&dec("1.00"), &mut []);
        assert!(!empty.is_complete());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn refunds_never_exceed_capacity(caps in proptest::collection::vec(0i64..10_000, 0..6), total in 0i64..40_000) {
                let strs: Vec<String> = caps.iter().map(|c| format!("{}.{:02}", c / 100, c % 100)).collect();
                let refs: Vec<&str> = strs.iter().map(String::as_str).collect();
                let mut ps = payments(&refs);
                let before: Vec<(Uuid, BigDecimal)> = ps.iter().map(|p| (p.id, p.refundable_capacity())).collect();
                let total_dec = BigDecimal::from(total) / BigDecimal::from(100);
                let allocation = allocate(&total_dec, &mut ps);

                for refund in &allocation.refunds {
                    prop_assert!(refund.amount > BigDecimal::from(0));
                    let (_, cap) = before.iter().find(|(id, _)| *id == refund.payment_id).unwrap();
                    prop_assert!(&refund.amount <= cap);
                }
                let capacity: i64 = caps.iter().sum();
                if capacity >= total {
                    prop_assert!(allocation.is_complete());
                    prop_assert_eq!(allocation.refunded_total(), total_dec);
                } else {
                    prop_assert!(!allocation.is_complete());
                    prop_assert_eq!(allocation.refunded_total() + allocation.remaining, total_dec);
                }
            }
        }
    }
}
