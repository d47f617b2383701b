use bigdecimal::BigDecimal;
use thiserror::Error;
use uuid::Uuid;

use crate::model::Reimbursement;
use crate::repo::StoreError;

#[derive(Debug, Error)]
pub enum ReimbursementError {
    /// The order's payments could not cover the total. Nothing was committed.
    #[error("reimbursement {} incomplete: total {total}, payments short by {shortfall}", .reimbursement.id)]
    IncompleteReimbursement {
        /// Still pending with no refunds, so its `unpaid_amount()` is the full total.
        reimbursement: Box<Reimbursement>,
        total: BigDecimal,
        /// Part of `total` the order's payments had no capacity left for.
        shortfall: BigDecimal,
    },
    #[error("reimbursement {0} has already been performed")]
    AlreadyPerformed(Uuid),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("return item {0} is already attached to a reimbursement")]
    ReturnItemAlreadyReimbursed(Uuid),
    #[error("no free reimbursement number after {attempts} attempts")]
    NumberExhausted { attempts: u32 },
    #[error("reimbursement {0} kept conflicting with concurrent refunds")]
    ConcurrentModification(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReimbursementError {
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ReimbursementError::IncompleteReimbursement { .. })
    }

    pub fn shortfall(&self) -> Option<&BigDecimal> {
        match self {
            ReimbursementError::IncompleteReimbursement { shortfall, .. } => Some(shortfall),
            _ => None,
        }
    }
}
