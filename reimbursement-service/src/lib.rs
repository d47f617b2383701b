pub mod allocation;
pub mod config;
pub mod error;
pub mod exchange;
pub mod memory;
pub mod model;
pub mod notify;
pub mod number;
pub mod pg;
pub mod reimbursement;
pub mod repo;
pub mod totals;
pub mod unit_of_work;

pub use allocation::{allocate, Allocation, PlannedRefund};
pub use config::{load_reimbursement_config, ReimbursementConfig};
pub use error::ReimbursementError;
pub use exchange::{plan_exchanges, return_items_requiring_exchange, ExchangeRequest};
pub use memory::InMemoryStore;
pub use model::{
    AcceptanceStatus, CustomerReturn, ExchangeRequiredCheck, ExchangeShipment, ExchangeUnit, Order, Payment,
    PaymentState, Refund, Reimbursement, ReimbursementStatus, ReturnItem,
};
pub use notify::{AuditNotifier, NoopNotifier, NotifyError, ReimbursementNotifier};
pub use number::{generate_number, is_valid_number};
pub use pg::PgReimbursementStore;
pub use reimbursement::{build_from_customer_return, ReimbursementPlan, ReimbursementService};
pub use repo::{ReimbursementStore, StoreError};
pub use totals::{calculated_total, ExchangeTotalPolicy};
pub use unit_of_work::{CapacityCheck, UnitOfWork};
