use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{CustomerReturn, ExchangeShipment, Order, Payment, Reimbursement};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("return item {0} already belongs to a reimbursement")]
    ReturnItemTaken(Uuid),
    #[error("reimbursement number {0} already exists")]
    DuplicateNumber(String),
    #[error("reimbursement has no number")]
    MissingNumber,
    /// A compare-and-set guard failed; nothing was written.
    #[error("concurrent modification of {entity} {id}")]
    Conflict { entity: &'static str, id: Uuid },
    #[error("corrupt {entity} row: {detail}")]
    Corrupt { entity: &'static str, detail: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Storage for reimbursements and the order data they draw on.
#[async_trait]
pub trait ReimbursementStore: Send + Sync {
    async fn customer_return(&self, id: Uuid) -> Result<Option<CustomerReturn>, StoreError>;

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError>;

    /// Loads the reimbursement with its return items and committed refunds.
    async fn reimbursement(&self, id: Uuid) -> Result<Option<Reimbursement>, StoreError>;

    async fn number_exists(&self, number: &str) -> Result<bool, StoreError>;

    /// Inserts a numbered reimbursement and claims its return items in one transaction.
    /// Fails with `ReturnItemTaken` if any item is already claimed, leaving nothing behind.
    async fn insert_reimbursement(&self, reimbursement: &Reimbursement) -> Result<(), StoreError>;

    /// Applies a unit of work atomically. Fails with `Conflict` when the reimbursement is no
    /// longer pending or a payment's refunded amount moved since allocation.
    async fn commit(&self, work: UnitOfWork) -> Result<(), StoreError>;

    async fn exchange_shipment(&self, order_id: Uuid) -> Result<Option<ExchangeShipment>, StoreError>;
}
