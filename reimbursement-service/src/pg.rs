use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::model::{
    AcceptanceStatus, CustomerReturn, ExchangeShipment, ExchangeUnit, Order, Payment, PaymentState, Refund,
    Reimbursement, ReimbursementStatus, ReturnItem,
};
use crate::repo::{ReimbursementStore, StoreError};
use crate::unit_of_work::UnitOfWork;

const UNIQUE_VIOLATION: &str = "23505";
const NUMBER_CONSTRAINT: &str = "reimbursements_number_key";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    number: String,
    currency: String,
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    amount: BigDecimal,
    refunded: BigDecimal,
    state: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let state = PaymentState::parse(&row.state)
            .ok_or_else(|| StoreError::Corrupt { entity: "payment", detail: format!("unknown state {}", row.state) })?;
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            amount: row.amount,
            refunded: row.refunded,
            state,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CustomerReturnRow {
    id: Uuid,
    number: String,
    order_id: Uuid,
}

#[derive(sqlx::FromRow)]
struct ReturnItemRow {
    id: Uuid,
    customer_return_id: Uuid,
    inventory_unit_id: Option<Uuid>,
    pre_tax_amount: BigDecimal,
    additional_tax_total: BigDecimal,
    included_tax_total: BigDecimal,
    acceptance_status: String,
    exchange_variant_id: Option<Uuid>,
    reimbursement_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReturnItemRow> for ReturnItem {
    type Error = StoreError;

    fn try_from(row: ReturnItemRow) -> Result<Self, Self::Error> {
        let acceptance_status = AcceptanceStatus::parse(&row.acceptance_status).ok_or_else(|| StoreError::Corrupt {
            entity: "return_item",
            detail: format!("unknown acceptance status {}", row.acceptance_status),
        })?;
        Ok(ReturnItem {
            id: row.id,
            customer_return_id: row.customer_return_id,
            inventory_unit_id: row.inventory_unit_id,
            pre_tax_amount: row.pre_tax_amount,
            additional_tax_total: row.additional_tax_total,
            included_tax_total: row.included_tax_total,
            acceptance_status,
            exchange_variant_id: row.exchange_variant_id,
            reimbursement_id: row.reimbursement_id,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReimbursementRow {
    id: Uuid,
    number: String,
    order_id: Uuid,
    customer_return_id: Uuid,
    total: BigDecimal,
    status: String,
    performed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    payment_id: Uuid,
    reimbursement_id: Uuid,
    amount: BigDecimal,
    created_at: DateTime<Utc>,
}

impl From<RefundRow> for Refund {
    fn from(row: RefundRow) -> Self {
        Refund {
            id: row.id,
            payment_id: row.payment_id,
            reimbursement_id: row.reimbursement_id,
            amount: row.amount,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ShipmentRow {
    id: Uuid,
    order_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ExchangeUnitRow {
    id: Uuid,
    variant_id: Uuid,
    return_item_id: Uuid,
    reimbursement_id: Uuid,
}

const RETURN_ITEM_COLUMNS: &str = "id, customer_return_id, inventory_unit_id, pre_tax_amount, additional_tax_total, \
     included_tax_total, acceptance_status, exchange_variant_id, reimbursement_id, created_at";

/// Postgres-backed store. Writes run in a single transaction with row locks on the
/// payments they touch.
#[derive(Clone)]
pub struct PgReimbursementStore {
    pool: PgPool,
}

impl PgReimbursementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn items_where(&self, column: &str, id: Uuid) -> Result<Vec<ReturnItem>, StoreError> {
        let sql = format!("SELECT {RETURN_ITEM_COLUMNS} FROM return_items WHERE {column} = $1 ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, ReturnItemRow>(&sql).bind(id).fetch_all(&self.pool).await?;
        rows.into_iter().map(ReturnItem::try_from).collect()
    }

    async fn claim_item(
        tx: &mut Transaction<'_, Postgres>,
        reimbursement: &Reimbursement,
        item_id: Uuid,
    ) -> Result<(), StoreError> {
        let claimed = sqlx::query(
            "UPDATE return_items SET reimbursement_id = $1
             WHERE id = $2 AND customer_return_id = $3 AND reimbursement_id IS NULL",
        )
        .bind(reimbursement.id)
        .bind(item_id)
        .bind(reimbursement.customer_return_id)
        .execute(&mut **tx)
        .await?;
        if claimed.rows_affected() == 1 {
            return Ok(());
        }
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM return_items WHERE id = $1 AND customer_return_id = $2)",
        )
        .bind(item_id)
        .bind(reimbursement.customer_return_id)
        .fetch_one(&mut **tx)
        .await?;
        if exists {
            Err(StoreError::ReturnItemTaken(item_id))
        } else {
            Err(StoreError::NotFound { entity: "return_item", id: item_id })
        }
    }
}

#[async_trait]
impl ReimbursementStore for PgReimbursementStore {
    async fn customer_return(&self, id: Uuid) -> Result<Option<CustomerReturn>, StoreError> {
        let row = sqlx::query_as::<_, CustomerReturnRow>("SELECT id, number, order_id FROM customer_returns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let return_items = self.items_where("customer_return_id", row.id).await?;
        Ok(Some(CustomerReturn { id: row.id, number: row.number, order_id: row.order_id, return_items }))
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT id, number, currency FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Order { id: r.id, number: r.number, currency: r.currency }))
    }

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, order_id, amount, refunded, state, created_at FROM payments
             WHERE order_id = $1 ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn reimbursement(&self, id: Uuid) -> Result<Option<Reimbursement>, StoreError> {
        let row = sqlx::query_as::<_, ReimbursementRow>(
            "SELECT id, number, order_id, customer_return_id, total, status, performed_at, created_at
             FROM reimbursements WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        let status = ReimbursementStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt { entity: "reimbursement", detail: format!("unknown status {}", row.status) })?;
        let return_items = self.items_where("reimbursement_id", row.id).await?;
        let refunds = sqlx::query_as::<_, RefundRow>(
            "SELECT id, payment_id, reimbursement_id, amount, created_at FROM refunds
             WHERE reimbursement_id = $1 ORDER BY created_at, id",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(Reimbursement {
            id: row.id,
            number: Some(row.number),
            order_id: row.order_id,
            customer_return_id: row.customer_return_id,
            return_items,
            total: row.total,
            status,
            performed_at: row.performed_at,
            refunds: refunds.into_iter().map(Refund::from).collect(),
            created_at: row.created_at,
        }))
    }

    async fn number_exists(&self, number: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reimbursements WHERE number = $1)")
            .bind(number)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn insert_reimbursement(&self, reimbursement: &Reimbursement) -> Result<(), StoreError> {
        let number = reimbursement.number.as_deref().ok_or(StoreError::MissingNumber)?;
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO reimbursements (id, number, order_id, customer_return_id, total, status, performed_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(reimbursement.id)
        .bind(number)
        .bind(reimbursement.order_id)
        .bind(reimbursement.customer_return_id)
        .bind(&reimbursement.total)
        .bind(reimbursement.status.as_str())
        .bind(reimbursement.performed_at)
        .bind(reimbursement.created_at)
        .execute(&mut *tx)
        .await;
        if let Err(err) = inserted {
            return Err(match &err {
                sqlx::Error::Database(db)
                    if db.code().as_deref() == Some(UNIQUE_VIOLATION) && db.constraint() == Some(NUMBER_CONSTRAINT) =>
                {
                    StoreError::DuplicateNumber(number.to_string())
                }
                _ => StoreError::Database(err),
            });
        }
        for item in &reimbursement.return_items {
            Self::claim_item(&mut tx, reimbursement, item.id).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn commit(&self, work: UnitOfWork) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE reimbursements SET status = 'reimbursed', total = $2, performed_at = $3
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(work.reimbursement_id)
        .bind(&work.total)
        .bind(work.performed_at)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reimbursements WHERE id = $1)")
                .bind(work.reimbursement_id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                StoreError::Conflict { entity: "reimbursement", id: work.reimbursement_id }
            } else {
                StoreError::NotFound { entity: "reimbursement", id: work.reimbursement_id }
            });
        }

        for check in &work.capacity_checks {
            let current: Option<BigDecimal> = sqlx::query_scalar("SELECT refunded FROM payments WHERE id = $1 FOR UPDATE")
                .bind(check.payment_id)
                .fetch_optional(&mut *tx)
                .await?;
            match current {
                None => return Err(StoreError::NotFound { entity: "payment", id: check.payment_id }),
                Some(refunded) if refunded != check.expected_refunded => {
                    return Err(StoreError::Conflict { entity: "payment", id: check.payment_id });
                }
                Some(_) => {}
            }
            sqlx::query("UPDATE payments SET refunded = $2 WHERE id = $1")
                .bind(check.payment_id)
                .bind(&check.new_refunded)
                .execute(&mut *tx)
                .await?;
        }

        for refund in &work.refunds {
            sqlx::query(
                "INSERT INTO refunds (id, payment_id, reimbursement_id, amount, created_at) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(refund.id)
            .bind(refund.payment_id)
            .bind(refund.reimbursement_id)
            .bind(&refund.amount)
            .bind(refund.created_at)
            .execute(&mut *tx)
            .await?;
        }

        if !work.exchange_units.is_empty() {
            let shipment_id: Uuid = sqlx::query_scalar(
                "INSERT INTO exchange_shipments (id, order_id) VALUES ($1, $2)
                 ON CONFLICT (order_id) DO UPDATE SET order_id = EXCLUDED.order_id
                 RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(work.order_id)
            .fetch_one(&mut *tx)
            .await?;
            for unit in &work.exchange_units {
                sqlx::query(
                    "INSERT INTO exchange_inventory_units (id, shipment_id, variant_id, return_item_id, reimbursement_id)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(unit.id)
                .bind(shipment_id)
                .bind(unit.variant_id)
                .bind(unit.return_item_id)
                .bind(unit.reimbursement_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn exchange_shipment(&self, order_id: Uuid) -> Result<Option<ExchangeShipment>, StoreError> {
        let row = sqlx::query_as::<_, ShipmentRow>("SELECT id, order_id, created_at FROM exchange_shipments WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let units = sqlx::query_as::<_, ExchangeUnitRow>(
            "SELECT id, variant_id, return_item_id, reimbursement_id FROM exchange_inventory_units
             WHERE shipment_id = $1 ORDER BY position",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(ExchangeShipment {
            id: row.id,
            order_id: row.order_id,
            units: units
                .into_iter()
                .map(|u| ExchangeUnit {
                    id: u.id,
                    variant_id: u.variant_id,
                    return_item_id: u.return_item_id,
                    reimbursement_id: u.reimbursement_id,
                })
                .collect(),
            created_at: row.created_at,
        }))
    }
}
