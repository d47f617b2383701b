use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common_money::format_money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceStatus {
    Pending,
    Accepted,
    Rejected,
    ManualIntervention,
}

impl AcceptanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptanceStatus::Pending => "pending",
            AcceptanceStatus::Accepted => "accepted",
            AcceptanceStatus::Rejected => "rejected",
            AcceptanceStatus::ManualIntervention => "manual_intervention",
        }
    }

    pub fn parse(s: &str) -> Option<AcceptanceStatus> {
        match s {
            "pending" => Some(AcceptanceStatus::Pending),
            "accepted" => Some(AcceptanceStatus::Accepted),
            "rejected" => Some(AcceptanceStatus::Rejected),
            "manual_intervention" => Some(AcceptanceStatus::ManualIntervention),
            _ => None,
        }
    }
}

/// Anything that can say whether it needs a replacement shipped.
pub trait ExchangeRequiredCheck {
    fn exchange_required(&self) -> bool;
}

/// One returned unit. Tax figures come from the tax engine as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub id: Uuid,
    pub customer_return_id: Uuid,
    pub inventory_unit_id: Option<Uuid>,
    pub pre_tax_amount: BigDecimal,
    /// Exclusive tax, >= 0.
    pub additional_tax_total: BigDecimal,
    /// Tax backed out of an inclusive price, <= 0. Already excluded from
    /// `pre_tax_amount`, so it is carried for reporting only.
    pub included_tax_total: BigDecimal,
    pub acceptance_status: AcceptanceStatus,
    pub exchange_variant_id: Option<Uuid>,
    pub reimbursement_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ReturnItem {
    pub fn new(customer_return_id: Uuid, pre_tax_amount: BigDecimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_return_id,
            inventory_unit_id: None,
            pre_tax_amount,
            additional_tax_total: BigDecimal::from(0),
            included_tax_total: BigDecimal::from(0),
            acceptance_status: AcceptanceStatus::Pending,
            exchange_variant_id: None,
            reimbursement_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_additional_tax(mut self, amount: BigDecimal) -> Self {
        self.additional_tax_total = amount;
        self
    }

    pub fn with_included_tax(mut self, amount: BigDecimal) -> Self {
        self.included_tax_total = amount;
        self
    }

    pub fn with_status(mut self, status: AcceptanceStatus) -> Self {
        self.acceptance_status = status;
        self
    }

    pub fn with_exchange(mut self, variant_id: Uuid) -> Self {
        self.exchange_variant_id = Some(variant_id);
        self
    }

    /// Unrounded contribution to a reimbursement total: the net price plus any
    /// exclusive tax.
    pub fn total(&self) -> BigDecimal {
        &self.pre_tax_amount + &self.additional_tax_total
    }

    pub fn is_accepted(&self) -> bool {
        self.acceptance_status == AcceptanceStatus::Accepted
    }

    pub fn is_reimbursed(&self) -> bool {
        self.reimbursement_id.is_some()
    }
}

impl ExchangeRequiredCheck for ReturnItem {
    fn exchange_required(&self) -> bool {
        self.exchange_variant_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerReturn {
    pub id: Uuid,
    pub number: String,
    pub order_id: Uuid,
    pub return_items: Vec<ReturnItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub number: String,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Completed,
    Failed,
    Void,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Completed => "completed",
            PaymentState::Failed => "failed",
            PaymentState::Void => "void",
        }
    }

    pub fn parse(s: &str) -> Option<PaymentState> {
        match s {
            "pending" => Some(PaymentState::Pending),
            "completed" => Some(PaymentState::Completed),
            "failed" => Some(PaymentState::Failed),
            "void" => Some(PaymentState::Void),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: BigDecimal,
    /// Sum of refunds already recorded against this payment.
    pub refunded: BigDecimal,
    pub state: PaymentState,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn completed(order_id: Uuid, amount: BigDecimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            amount,
            refunded: BigDecimal::from(0),
            state: PaymentState::Completed,
            created_at: Utc::now(),
        }
    }

    /// Only settled payments can be refunded.
    pub fn can_refund(&self) -> bool {
        self.state == PaymentState::Completed
    }

    pub fn refundable_capacity(&self) -> BigDecimal {
        let zero = BigDecimal::from(0);
        if !self.can_refund() {
            return zero;
        }
        let left = &self.amount - &self.refunded;
        if left < zero { zero } else { left }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub reimbursement_id: Uuid,
    pub amount: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeUnit {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub return_item_id: Uuid,
    pub reimbursement_id: Uuid,
}

/// The order's single exchange shipment; later exchanges append units to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeShipment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub units: Vec<ExchangeUnit>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReimbursementStatus {
    Pending,
    Reimbursed,
}

impl ReimbursementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReimbursementStatus::Pending => "pending",
            ReimbursementStatus::Reimbursed => "reimbursed",
        }
    }

    pub fn parse(s: &str) -> Option<ReimbursementStatus> {
        match s {
            "pending" => Some(ReimbursementStatus::Pending),
            "reimbursed" => Some(ReimbursementStatus::Reimbursed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reimbursement {
    pub id: Uuid,
    /// Assigned once, before the first insert.
    pub number: Option<String>,
    pub order_id: Uuid,
    pub customer_return_id: Uuid,
    pub return_items: Vec<ReturnItem>,
    pub total: BigDecimal,
    pub status: ReimbursementStatus,
    pub performed_at: Option<DateTime<Utc>>,
    /// Refunds already committed against this reimbursement.
    pub refunds: Vec<Refund>,
    pub created_at: DateTime<Utc>,
}

impl Reimbursement {
    pub fn is_performed(&self) -> bool {
        self.status == ReimbursementStatus::Reimbursed
    }

    pub fn paid_amount(&self) -> BigDecimal {
        self.refunds.iter().fold(BigDecimal::from(0), |acc, r| acc + &r.amount)
    }

    pub fn unpaid_amount(&self) -> BigDecimal {
        self.total.clone() - self.paid_amount()
    }

    pub fn display_total(&self, currency: &str) -> String {
        format_money(&self.total, currency)
    }

    pub fn return_items_requiring_exchange(&self) -> Vec<&ReturnItem> {
        crate::exchange::return_items_requiring_exchange(&self.return_items)
    }
}
