//! PostgreSQL-backed store implementation.
//!
//! Contended rows are taken with `SELECT ... FOR UPDATE` inside the unit
//! of work, and the per-day number sequence is drawn with an atomic upsert,
//! so two concurrent transactions can never both pass the same availability
//! check or mint the same document number. Reporting queries run on the
//! pool outside any transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Currency, CustomerId, FulfillmentId, InventoryItemId, LocationId, Money, OrderId, OrderItemId,
    PaymentId, ProductId, ReservationId, ReturnId, VariantId,
};
use domain::{
    Adjustment, AdjustmentType, FinancialStatus, Fulfillment, FulfillmentItem, FulfillmentProgress,
    FulfillmentStatus, InventoryItem, Order, OrderItem, OrderStatus, Payment, PaymentStatus,
    ProductSnapshot, Purchaser, Reservation, ReservationStatus, Return, ReturnItem, ReturnStatus,
    StockTotals, TrackingInfo,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::uow::{TransactionalStore, UnitOfWork};

/// PostgreSQL-backed transactional store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    #[tracing::instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

/// An open database transaction.
pub struct PostgresUow {
    tx: Transaction<'static, Postgres>,
}

fn parse_status<T>(raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(StoreError::corrupted)
}

fn row_to_inventory_item(row: PgRow) -> Result<InventoryItem> {
    Ok(InventoryItem {
        id: InventoryItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        variant_id: row
            .try_get::<Option<String>, _>("variant_id")?
            .map(VariantId::new),
        location_id: LocationId::new(row.try_get::<String, _>("location_id")?),
        quantity: row.try_get("quantity")?,
        reserved_quantity: row.try_get("reserved_quantity")?,
        low_stock_threshold: row.try_get("low_stock_threshold")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_reservation(row: PgRow) -> Result<Reservation> {
    Ok(Reservation {
        id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        inventory_item_id: InventoryItemId::from_uuid(row.try_get::<Uuid, _>("inventory_item_id")?),
        quantity: row.try_get("quantity")?,
        reason: row.try_get("reason")?,
        reference: row.try_get("reference")?,
        status: parse_status::<ReservationStatus>(&row.try_get::<String, _>("status")?)?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        closed_at: row.try_get("closed_at")?,
    })
}

fn row_to_adjustment(row: PgRow) -> Result<Adjustment> {
    Ok(Adjustment {
        id: common::AdjustmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        inventory_item_id: InventoryItemId::from_uuid(row.try_get::<Uuid, _>("inventory_item_id")?),
        adjustment_type: parse_status::<AdjustmentType>(
            &row.try_get::<String, _>("adjustment_type")?,
        )?,
        quantity: row.try_get("quantity")?,
        reason: row.try_get("reason")?,
        reference: row.try_get("reference")?,
        actor: row.try_get("actor")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_payment(row: PgRow) -> Result<Payment> {
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        currency: Currency::new(row.try_get::<String, _>("currency")?),
        method: row.try_get("method")?,
        gateway: row.try_get("gateway")?,
        gateway_transaction_id: row.try_get("gateway_transaction_id")?,
        status: parse_status::<PaymentStatus>(&row.try_get::<String, _>("status")?)?,
        processed_at: row.try_get("processed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
    let snapshot_json: serde_json::Value = row.try_get("snapshot")?;
    let snapshot: ProductSnapshot = serde_json::from_value(snapshot_json)?;

    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        variant_id: row
            .try_get::<Option<String>, _>("variant_id")?
            .map(VariantId::new),
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        total_price: Money::from_cents(row.try_get("total_price_cents")?),
        snapshot,
        quantity_fulfilled: row.try_get::<i32, _>("quantity_fulfilled")? as u32,
        quantity_returned: row.try_get::<i32, _>("quantity_returned")? as u32,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order(row: PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let tags_json: serde_json::Value = row.try_get("tags")?;
    let tags: Vec<String> = serde_json::from_value(tags_json)?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_number: row.try_get("order_number")?,
        purchaser: Purchaser {
            customer_id: row
                .try_get::<Option<Uuid>, _>("customer_id")?
                .map(CustomerId::from_uuid),
            guest_email: row.try_get("guest_email")?,
            guest_phone: row.try_get("guest_phone")?,
        },
        status: parse_status::<OrderStatus>(&row.try_get::<String, _>("status")?)?,
        financial_status: parse_status::<FinancialStatus>(
            &row.try_get::<String, _>("financial_status")?,
        )?,
        fulfillment_progress: parse_status::<FulfillmentProgress>(
            &row.try_get::<String, _>("fulfillment_progress")?,
        )?,
        currency: Currency::new(row.try_get::<String, _>("currency")?),
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        tax: Money::from_cents(row.try_get("tax_cents")?),
        shipping: Money::from_cents(row.try_get("shipping_cents")?),
        discount: Money::from_cents(row.try_get("discount_cents")?),
        total: Money::from_cents(row.try_get("total_cents")?),
        shipping_address: row.try_get("shipping_address")?,
        billing_address: row.try_get("billing_address")?,
        tags,
        notes: row.try_get("notes")?,
        items,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

fn fulfillment_from_rows(row: PgRow, items: Vec<FulfillmentItem>) -> Result<Fulfillment> {
    Ok(Fulfillment {
        id: FulfillmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        status: parse_status::<FulfillmentStatus>(&row.try_get::<String, _>("status")?)?,
        tracking: TrackingInfo {
            carrier: row.try_get("carrier")?,
            tracking_number: row.try_get("tracking_number")?,
            tracking_url: row.try_get("tracking_url")?,
        },
        items,
        shipped_at: row.try_get("shipped_at")?,
        delivered_at: row.try_get("delivered_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn return_from_rows(row: PgRow, items: Vec<ReturnItem>) -> Result<Return> {
    Ok(Return {
        id: ReturnId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        return_number: row.try_get("return_number")?,
        status: parse_status::<ReturnStatus>(&row.try_get::<String, _>("status")?)?,
        reason: row.try_get("reason")?,
        refund_amount: row
            .try_get::<Option<i64>, _>("refund_amount_cents")?
            .map(Money::from_cents),
        items,
        processed_at: row.try_get("processed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

const ORDER_COLUMNS: &str = "id, order_number, customer_id, guest_email, guest_phone, status, \
     financial_status, fulfillment_progress, currency, subtotal_cents, tax_cents, shipping_cents, \
     discount_cents, total_cents, shipping_address, billing_address, tags, notes, created_at, \
     updated_at, cancelled_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, variant_id, quantity, unit_price_cents, \
     total_price_cents, snapshot, quantity_fulfilled, quantity_returned, created_at";

const INVENTORY_COLUMNS: &str = "id, product_id, variant_id, location_id, quantity, \
     reserved_quantity, low_stock_threshold, created_at, updated_at";

const RESERVATION_COLUMNS: &str =
    "id, inventory_item_id, quantity, reason, reference, status, expires_at, created_at, closed_at";

const PAYMENT_COLUMNS: &str = "id, order_id, amount_cents, currency, method, gateway, \
     gateway_transaction_id, status, processed_at, created_at";

const FULFILLMENT_COLUMNS: &str = "id, order_id, status, carrier, tracking_number, tracking_url, \
     shipped_at, delivered_at, created_at";

async fn load_order_items<'e, E>(executor: E, order_id: OrderId) -> Result<Vec<OrderItem>>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY created_at ASC"
    ))
    .bind(order_id.as_uuid())
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(row_to_order_item).collect()
}

async fn load_fulfillment_items<'e, E>(
    executor: E,
    fulfillment_id: FulfillmentId,
) -> Result<Vec<FulfillmentItem>>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query(
        "SELECT order_item_id, quantity FROM fulfillment_items WHERE fulfillment_id = $1",
    )
    .bind(fulfillment_id.as_uuid())
    .fetch_all(executor)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(FulfillmentItem {
                order_item_id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("order_item_id")?),
                quantity: row.try_get::<i32, _>("quantity")? as u32,
            })
        })
        .collect()
}

#[async_trait]
impl TransactionalStore for PostgresStore {
    type Uow = PostgresUow;

    async fn begin(&self) -> Result<Self::Uow> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUow { tx })
    }

    async fn load_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let items = load_order_items(&self.pool, id).await?;
                Ok(Some(row_to_order(row, items)?))
            }
            None => Ok(None),
        }
    }

    async fn load_inventory_item(&self, id: InventoryItemId) -> Result<Option<InventoryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_inventory_item).transpose()
    }

    async fn stock_totals(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<StockTotals> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(quantity), 0) AS on_hand,
                   COALESCE(SUM(reserved_quantity), 0) AS reserved
            FROM inventory_items
            WHERE product_id = $1 AND variant_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(product_id.as_str())
        .bind(variant_id.map(|v| v.as_str()))
        .fetch_one(&self.pool)
        .await?;

        let on_hand: i64 = row.try_get("on_hand")?;
        let reserved: i64 = row.try_get("reserved")?;
        Ok(StockTotals {
            on_hand,
            reserved,
            available: on_hand - reserved,
        })
    }

    async fn low_stock_items(&self) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items \
             WHERE quantity - reserved_quantity <= low_stock_threshold \
             ORDER BY product_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_inventory_item).collect()
    }

    async fn out_of_stock_items(&self) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items \
             WHERE quantity - reserved_quantity <= 0 \
             ORDER BY product_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_inventory_item).collect()
    }

    async fn adjustments_for_item(&self, id: InventoryItemId) -> Result<Vec<Adjustment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, inventory_item_id, adjustment_type, quantity, reason, reference, actor, created_at
            FROM adjustments
            WHERE inventory_item_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_adjustment).collect()
    }

    async fn payments_for_order(&self, id: OrderId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at ASC"
        ))
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_payment).collect()
    }

    async fn fulfillments_for_order(&self, id: OrderId) -> Result<Vec<Fulfillment>> {
        let rows = sqlx::query(&format!(
            "SELECT {FULFILLMENT_COLUMNS} FROM fulfillments \
             WHERE order_id = $1 ORDER BY created_at ASC"
        ))
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let mut fulfillments = Vec::with_capacity(rows.len());
        for row in rows {
            let fulfillment_id = FulfillmentId::from_uuid(row.try_get::<Uuid, _>("id")?);
            let items = load_fulfillment_items(&self.pool, fulfillment_id).await?;
            fulfillments.push(fulfillment_from_rows(row, items)?);
        }
        Ok(fulfillments)
    }
}

#[async_trait]
impl UnitOfWork for PostgresUow {
    async fn commit(self) -> Result<()>
    where
        Self: Sized,
    {
        self.tx.commit().await?;
        tracing::debug!("transaction committed");
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let tags_json = serde_json::to_value(&order.tags)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, customer_id, guest_email, guest_phone, status,
                financial_status, fulfillment_progress, currency, subtotal_cents, tax_cents,
                shipping_cents, discount_cents, total_cents, shipping_address, billing_address,
                tags, notes, created_at, updated_at, cancelled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(order.purchaser.customer_id.map(|c| c.as_uuid()))
        .bind(&order.purchaser.guest_email)
        .bind(&order.purchaser.guest_phone)
        .bind(order.status.as_str())
        .bind(order.financial_status.as_str())
        .bind(order.fulfillment_progress.as_str())
        .bind(order.currency.as_str())
        .bind(order.subtotal.cents())
        .bind(order.tax.cents())
        .bind(order.shipping.cents())
        .bind(order.discount.cents())
        .bind(order.total.cents())
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(tags_json)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.cancelled_at)
        .execute(&mut *self.tx)
        .await?;

        for item in &order.items {
            let snapshot_json = serde_json::to_value(&item.snapshot)?;
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, variant_id, quantity,
                    unit_price_cents, total_price_cents, snapshot, quantity_fulfilled,
                    quantity_returned, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.product_id.as_str())
            .bind(item.variant_id.as_ref().map(|v| v.as_str()))
            .bind(item.quantity as i32)
            .bind(item.unit_price.cents())
            .bind(item.total_price.cents())
            .bind(snapshot_json)
            .bind(item.quantity_fulfilled as i32)
            .bind(item.quantity_returned as i32)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let tags_json = serde_json::to_value(&order.tags)?;

        sqlx::query(
            r#"
            UPDATE orders SET status = $2, financial_status = $3, fulfillment_progress = $4,
                shipping_address = $5, billing_address = $6, tags = $7, notes = $8,
                updated_at = $9, cancelled_at = $10
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.financial_status.as_str())
        .bind(order.fulfillment_progress.as_str())
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(tags_json)
        .bind(&order.notes)
        .bind(order.updated_at)
        .bind(order.cancelled_at)
        .execute(&mut *self.tx)
        .await?;

        // Line items are immutable apart from their fulfillment counters.
        for item in &order.items {
            sqlx::query(
                "UPDATE order_items SET quantity_fulfilled = $2, quantity_returned = $3 \
                 WHERE id = $1",
            )
            .bind(item.id.as_uuid())
            .bind(item.quantity_fulfilled as i32)
            .bind(item.quantity_returned as i32)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let items = load_order_items(&mut *self.tx, id).await?;
                Ok(Some(row_to_order(row, items)?))
            }
            None => Ok(None),
        }
    }

    async fn next_sequence(&mut self, day_key: &str) -> Result<u32> {
        let value: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO day_sequences (key, value) VALUES ($1, 1)
            ON CONFLICT (key) DO UPDATE SET value = day_sequences.value + 1
            RETURNING value
            "#,
        )
        .bind(day_key)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(value as u32)
    }

    async fn insert_inventory_item(&mut self, item: &InventoryItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_items (id, product_id, variant_id, location_id, quantity,
                reserved_quantity, low_stock_threshold, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.product_id.as_str())
        .bind(item.variant_id.as_ref().map(|v| v.as_str()))
        .bind(item.location_id.as_str())
        .bind(item.quantity)
        .bind(item.reserved_quantity)
        .bind(item.low_stock_threshold)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn inventory_item(&mut self, id: InventoryItemId) -> Result<Option<InventoryItem>> {
        let row = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_inventory_item).transpose()
    }

    async fn inventory_items_for_product(
        &mut self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<Vec<InventoryItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_items \
             WHERE product_id = $1 AND variant_id IS NOT DISTINCT FROM $2 \
             ORDER BY location_id ASC \
             FOR UPDATE"
        ))
        .bind(product_id.as_str())
        .bind(variant_id.map(|v| v.as_str()))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_inventory_item).collect()
    }

    async fn update_inventory_item(&mut self, item: &InventoryItem) -> Result<()> {
        sqlx::query(
            "UPDATE inventory_items SET quantity = $2, reserved_quantity = $3, \
             low_stock_threshold = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(item.id.as_uuid())
        .bind(item.quantity)
        .bind(item.reserved_quantity)
        .bind(item.low_stock_threshold)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reservations (id, inventory_item_id, quantity, reason, reference, status,
                expires_at, created_at, closed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.inventory_item_id.as_uuid())
        .bind(reservation.quantity)
        .bind(&reservation.reason)
        .bind(&reservation.reference)
        .bind(reservation.status.as_str())
        .bind(reservation.expires_at)
        .bind(reservation.created_at)
        .bind(reservation.closed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn reservation(&mut self, id: ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_reservation).transpose()
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        sqlx::query("UPDATE reservations SET status = $2, closed_at = $3 WHERE id = $1")
            .bind(reservation.id.as_uuid())
            .bind(reservation.status.as_str())
            .bind(reservation.closed_at)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn active_reservations_for_reference(
        &mut self,
        reference: &str,
    ) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE reference = $1 AND status = 'ACTIVE' \
             ORDER BY created_at ASC \
             FOR UPDATE"
        ))
        .bind(reference)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_reservation).collect()
    }

    async fn expired_reservations(&mut self, now: DateTime<Utc>) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE status = 'ACTIVE' AND expires_at IS NOT NULL AND expires_at <= $1 \
             ORDER BY created_at ASC \
             FOR UPDATE"
        ))
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_reservation).collect()
    }

    async fn insert_adjustment(&mut self, adjustment: &Adjustment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO adjustments (id, inventory_item_id, adjustment_type, quantity, reason,
                reference, actor, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(adjustment.id.as_uuid())
        .bind(adjustment.inventory_item_id.as_uuid())
        .bind(adjustment.adjustment_type.as_str())
        .bind(adjustment.quantity)
        .bind(&adjustment.reason)
        .bind(&adjustment.reference)
        .bind(&adjustment.actor)
        .bind(adjustment.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, amount_cents, currency, method, gateway,
                gateway_transaction_id, status, processed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.amount.cents())
        .bind(payment.currency.as_str())
        .bind(&payment.method)
        .bind(&payment.gateway)
        .bind(&payment.gateway_transaction_id)
        .bind(payment.status.as_str())
        .bind(payment.processed_at)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_payment).collect()
    }

    async fn insert_fulfillment(&mut self, fulfillment: &Fulfillment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fulfillments (id, order_id, status, carrier, tracking_number, tracking_url,
                shipped_at, delivered_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(fulfillment.id.as_uuid())
        .bind(fulfillment.order_id.as_uuid())
        .bind(fulfillment.status.as_str())
        .bind(&fulfillment.tracking.carrier)
        .bind(&fulfillment.tracking.tracking_number)
        .bind(&fulfillment.tracking.tracking_url)
        .bind(fulfillment.shipped_at)
        .bind(fulfillment.delivered_at)
        .bind(fulfillment.created_at)
        .execute(&mut *self.tx)
        .await?;

        for item in &fulfillment.items {
            sqlx::query(
                "INSERT INTO fulfillment_items (fulfillment_id, order_item_id, quantity) \
                 VALUES ($1, $2, $3)",
            )
            .bind(fulfillment.id.as_uuid())
            .bind(item.order_item_id.as_uuid())
            .bind(item.quantity as i32)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn fulfillment(&mut self, id: FulfillmentId) -> Result<Option<Fulfillment>> {
        let row = sqlx::query(&format!(
            "SELECT {FULFILLMENT_COLUMNS} FROM fulfillments WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                let items = load_fulfillment_items(&mut *self.tx, id).await?;
                Ok(Some(fulfillment_from_rows(row, items)?))
            }
            None => Ok(None),
        }
    }

    async fn update_fulfillment(&mut self, fulfillment: &Fulfillment) -> Result<()> {
        sqlx::query(
            "UPDATE fulfillments SET status = $2, carrier = $3, tracking_number = $4, \
             tracking_url = $5, shipped_at = $6, delivered_at = $7 WHERE id = $1",
        )
        .bind(fulfillment.id.as_uuid())
        .bind(fulfillment.status.as_str())
        .bind(&fulfillment.tracking.carrier)
        .bind(&fulfillment.tracking.tracking_number)
        .bind(&fulfillment.tracking.tracking_url)
        .bind(fulfillment.shipped_at)
        .bind(fulfillment.delivered_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_return(&mut self, ret: &Return) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO returns (id, order_id, return_number, status, reason, refund_amount_cents,
                processed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(ret.id.as_uuid())
        .bind(ret.order_id.as_uuid())
        .bind(&ret.return_number)
        .bind(ret.status.as_str())
        .bind(&ret.reason)
        .bind(ret.refund_amount.map(|m| m.cents()))
        .bind(ret.processed_at)
        .bind(ret.created_at)
        .execute(&mut *self.tx)
        .await?;

        for item in &ret.items {
            sqlx::query(
                "INSERT INTO return_items (return_id, order_item_id, quantity, condition) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(ret.id.as_uuid())
            .bind(item.order_item_id.as_uuid())
            .bind(item.quantity as i32)
            .bind(&item.condition)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn return_request(&mut self, id: ReturnId) -> Result<Option<Return>> {
        let row = sqlx::query(
            "SELECT id, order_id, return_number, status, reason, refund_amount_cents, \
             processed_at, created_at FROM returns WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            "SELECT order_item_id, quantity, condition FROM return_items WHERE return_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        let items = item_rows
            .into_iter()
            .map(|row| {
                Ok(ReturnItem {
                    order_item_id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("order_item_id")?),
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                    condition: row.try_get("condition")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(return_from_rows(row, items)?))
    }

    async fn update_return(&mut self, ret: &Return) -> Result<()> {
        sqlx::query(
            "UPDATE returns SET status = $2, refund_amount_cents = $3, processed_at = $4 \
             WHERE id = $1",
        )
        .bind(ret.id.as_uuid())
        .bind(ret.status.as_str())
        .bind(ret.refund_amount.map(|m| m.cents()))
        .bind(ret.processed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }
}
