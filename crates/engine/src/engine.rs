//! The transaction coordinator.
//!
//! Every multi-entity operation opens exactly one unit of work against the
//! store, drives the domain entities through it, commits, and only then
//! notifies external collaborators (broadcast, audit, statistics). A
//! failure at any step before commit rolls the whole operation back;
//! post-commit collaborator failures are logged and swallowed because the
//! business mutation has already succeeded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{
    Currency, FulfillmentId, InventoryItemId, LocationId, Money, OrderId, ProductId,
    ReservationId, ReturnId, VariantId,
};
use domain::{
    Adjustment, AdjustmentType, DomainError, FinancialStatus, Fulfillment, FulfillmentItem,
    FulfillmentProgress, InventoryItem, Order, OrderItem, OrderStatus, Payment, Purchaser,
    Reservation, Return, ReturnItem, StockTotals, completed_sum,
    number::{day_key, format_number},
};
use serde_json::json;
use store::{StoreError, TransactionalStore, UnitOfWork};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::events;
use crate::services::{
    AuditSink, CatalogLookup, CustomerStats, EventBroadcaster, InMemoryAuditLog,
    InMemoryBroadcaster, InMemoryCustomerStats, NoopReturnHook, PaymentGateway, PricingCalculator,
    ReturnApprovedHook, ZeroCharges, audit::AuditEntry,
};

/// One requested line of a new order.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    /// Overrides the live catalog price when present.
    pub price_override: Option<Money>,
}

/// A request to create an order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub purchaser: Purchaser,
    pub currency: Currency,
    pub items: Vec<NewOrderItem>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

/// A partial update to an order's mutable fields.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    /// Validated against the status transition table; illegal pairs fail
    /// with `InvalidState`.
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
}

/// A request to process a payment against an order.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub amount: Money,
    /// Accepted as given; a mismatch with the order's currency is recorded,
    /// not converted.
    pub currency: Currency,
    pub method: String,
    pub gateway: String,
    pub gateway_transaction_id: Option<String>,
}

/// The transaction coordinator over a store and its collaborators.
pub struct Engine<S: TransactionalStore> {
    store: S,
    catalog: Arc<dyn CatalogLookup>,
    gateway: Arc<dyn PaymentGateway>,
    broadcaster: Arc<dyn EventBroadcaster>,
    audit: Arc<dyn AuditSink>,
    stats: Arc<dyn CustomerStats>,
    pricing: Arc<dyn PricingCalculator>,
    return_hook: Arc<dyn ReturnApprovedHook>,
    config: EngineConfig,
}

impl<S: TransactionalStore> Engine<S> {
    /// Creates an engine with default (in-memory) broadcast, audit, and
    /// statistics collaborators, zero pricing, and a no-op return hook.
    pub fn new(
        store: S,
        catalog: Arc<dyn CatalogLookup>,
        gateway: Arc<dyn PaymentGateway>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            gateway,
            broadcaster: Arc::new(InMemoryBroadcaster::new()),
            audit: Arc::new(InMemoryAuditLog::new()),
            stats: Arc::new(InMemoryCustomerStats::new()),
            pricing: Arc::new(ZeroCharges),
            return_hook: Arc::new(NoopReturnHook),
            config,
        }
    }

    /// Replaces the event broadcaster.
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn EventBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Replaces the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the customer statistics updater.
    pub fn with_stats(mut self, stats: Arc<dyn CustomerStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Replaces the pricing calculator.
    pub fn with_pricing(mut self, pricing: Arc<dyn PricingCalculator>) -> Self {
        self.pricing = pricing;
        self
    }

    /// Replaces the return approval hook.
    pub fn with_return_hook(mut self, hook: Arc<dyn ReturnApprovedHook>) -> Self {
        self.return_hook = hook;
        self
    }

    // ----- Orders -----

    /// Creates an order: snapshots the catalog, reserves stock, mints the
    /// order number, and persists everything in one unit of work.
    #[tracing::instrument(skip(self, request), fields(item_count = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        actor: Option<&str>,
    ) -> Result<Order> {
        metrics::counter!("engine_order_creates_total").increment(1);
        let start = std::time::Instant::now();

        if request.items.is_empty() {
            return Err(DomainError::validation("order requires at least one item").into());
        }
        if request.items.iter().any(|i| i.quantity == 0) {
            return Err(DomainError::validation("item quantity must be positive").into());
        }

        // Resolve catalog entries before opening the transaction; the
        // catalog is an external collaborator.
        let mut resolved = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let entry = self
                .catalog
                .lookup(&line.product_id, line.variant_id.as_ref())
                .await?
                .ok_or_else(|| {
                    DomainError::not_found("Product", line_label(&line.product_id, line.variant_id.as_ref()))
                })?;
            resolved.push((line.clone(), entry));
        }

        let mut uow = self.store.begin().await?;

        let today = Utc::now().date_naive();
        let sequence = uow
            .next_sequence(&day_key(&self.config.order_prefix, today))
            .await?;
        let order_number = format_number(&self.config.order_prefix, today, sequence);

        let order_id = OrderId::new();
        let items: Vec<OrderItem> = resolved
            .iter()
            .map(|(line, entry)| {
                let unit_price = line.price_override.unwrap_or(entry.price);
                OrderItem::new(order_id, entry.snapshot(), line.quantity, unit_price)
            })
            .collect();

        let charges = self.pricing.charges(&items, &request.currency);
        let mut order = Order::create(
            order_id,
            order_number.clone(),
            request.purchaser.clone(),
            request.currency.clone(),
            items,
            charges,
        )?;
        order.shipping_address = request.shipping_address.clone();
        order.billing_address = request.billing_address.clone();
        order.tags = request.tags.clone();
        if let Some(notes) = &request.notes {
            order.append_note(notes);
        }

        let expires_at = self.reservation_expiry();
        for item in &order.items {
            if !item.snapshot.tracks_inventory {
                continue;
            }
            reserve_stock_for_line(
                &mut uow,
                &item.product_id,
                item.variant_id.as_ref(),
                item.quantity as i64,
                &order_number,
                expires_at,
            )
            .await?;
        }

        uow.insert_order(&order).await?;
        uow.commit().await?;

        metrics::histogram!("engine_order_create_seconds").record(start.elapsed().as_secs_f64());
        tracing::info!(order_number = %order.order_number, total = %order.total, "order created");

        if let Some(customer_id) = order.purchaser.customer_id
            && let Err(err) = self.stats.order_placed(customer_id, order.total).await
        {
            tracing::warn!(%customer_id, error = %err, "customer statistics update failed");
        }
        self.record_audit(
            "order.create",
            "Order",
            order.id.to_string(),
            actor,
            json!({ "order_number": order.order_number, "total_cents": order.total.cents() }),
        )
        .await;
        self.broadcast(events::ORDER_CREATED, events::order_created(&order))
            .await;

        Ok(order)
    }

    /// Applies a partial update to an order.
    ///
    /// Status changes follow the state machine table; an illegal pair
    /// fails with `InvalidState` and nothing is written.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_order(
        &self,
        order_id: OrderId,
        patch: OrderPatch,
        actor: Option<&str>,
    ) -> Result<Order> {
        let mut uow = self.store.begin().await?;
        let mut order = require(uow.order(order_id).await?, "Order", order_id)?;

        let old_status = order.status;
        if let Some(next) = patch.status {
            order.transition_status(next)?;
        }
        if let Some(notes) = &patch.notes {
            order.append_note(notes);
        }
        if let Some(tags) = patch.tags {
            order.tags = tags;
        }
        if let Some(address) = patch.shipping_address {
            order.shipping_address = Some(address);
        }
        if let Some(address) = patch.billing_address {
            order.billing_address = Some(address);
        }

        uow.update_order(&order).await?;
        uow.commit().await?;

        if order.status != old_status {
            self.broadcast(
                events::ORDER_STATUS_UPDATED,
                events::order_status_updated(&order, old_status, order.status),
            )
            .await;
        }
        self.record_audit(
            "order.update",
            "Order",
            order.id.to_string(),
            actor,
            json!({ "old_status": old_status.as_str(), "new_status": order.status.as_str() }),
        )
        .await;

        Ok(order)
    }

    /// Cancels an order: releases its reservations, mirrors every completed
    /// payment with a refund record, and marks the financial status
    /// refunded when money moved back.
    ///
    /// Fails with `InvalidState` once the order has shipped or delivered.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        reason: &str,
        actor: Option<&str>,
    ) -> Result<Order> {
        metrics::counter!("engine_order_cancels_total").increment(1);

        let mut uow = self.store.begin().await?;
        let mut order = require(uow.order(order_id).await?, "Order", order_id)?;

        order.cancel(reason)?;

        let reservations = uow
            .active_reservations_for_reference(&order.order_number)
            .await?;
        for mut reservation in reservations {
            let mut item = require(
                uow.inventory_item(reservation.inventory_item_id).await?,
                "InventoryItem",
                reservation.inventory_item_id,
            )?;
            reservation.release()?;
            item.release(reservation.quantity);
            uow.update_reservation(&reservation).await?;
            uow.update_inventory_item(&item).await?;
        }

        let payments = uow.payments_for_order(order_id).await?;
        let mut refunded = false;
        for payment in payments.iter().filter(|p| p.is_completed() && p.amount.is_positive()) {
            uow.insert_payment(&payment.refund_of()).await?;
            refunded = true;
        }
        if refunded {
            order.set_financial_status(FinancialStatus::Refunded);
        }

        uow.update_order(&order).await?;
        uow.commit().await?;

        tracing::info!(order_number = %order.order_number, refunded, "order cancelled");
        self.record_audit(
            "order.cancel",
            "Order",
            order.id.to_string(),
            actor,
            json!({ "reason": reason, "refunded": refunded }),
        )
        .await;
        self.broadcast(events::ORDER_CANCELLED, events::order_cancelled(&order, reason))
            .await;

        Ok(order)
    }

    /// Loads an order.
    pub async fn order(&self, order_id: OrderId) -> Result<Order> {
        require(self.store.load_order(order_id).await?, "Order", order_id)
    }

    // ----- Payments -----

    /// Charges the gateway and records a completed payment, then derives
    /// the order's financial status from the sum of completed payments.
    ///
    /// The gateway call is isolated behind a timeout and runs before the
    /// unit of work opens; a declined or timed-out charge fails with
    /// `PaymentFailed` and persists nothing.
    #[tracing::instrument(skip(self, request), fields(amount = %request.amount))]
    pub async fn process_payment(
        &self,
        order_id: OrderId,
        request: PaymentRequest,
        actor: Option<&str>,
    ) -> Result<Payment> {
        metrics::counter!("engine_payments_total").increment(1);

        require(self.store.load_order(order_id).await?, "Order", order_id)?;

        let charge = match tokio::time::timeout(
            self.config.gateway_timeout,
            self.gateway
                .charge(order_id, request.amount, &request.currency, &request.method),
        )
        .await
        {
            Ok(Ok(charge)) => charge,
            Ok(Err(err)) => {
                metrics::counter!("engine_payments_failed_total").increment(1);
                return Err(DomainError::PaymentFailed {
                    order_id: order_id.to_string(),
                    reason: err.to_string(),
                }
                .into());
            }
            Err(_) => {
                metrics::counter!("engine_payments_failed_total").increment(1);
                return Err(DomainError::PaymentFailed {
                    order_id: order_id.to_string(),
                    reason: "gateway timed out".to_string(),
                }
                .into());
            }
        };

        let mut uow = self.store.begin().await?;
        let mut order = require(uow.order(order_id).await?, "Order", order_id)?;

        let payment = Payment::completed(
            order_id,
            request.amount,
            request.currency.clone(),
            request.method.clone(),
            request.gateway.clone(),
            request
                .gateway_transaction_id
                .clone()
                .or(Some(charge.transaction_id)),
        );
        uow.insert_payment(&payment).await?;

        let payments = uow.payments_for_order(order_id).await?;
        let paid = completed_sum(&payments);
        order.set_financial_status(FinancialStatus::derive(paid, order.total));
        uow.update_order(&order).await?;
        uow.commit().await?;

        tracing::info!(
            order_number = %order.order_number,
            paid = %paid,
            financial_status = %order.financial_status,
            "payment processed"
        );
        self.record_audit(
            "payment.process",
            "Payment",
            payment.id.to_string(),
            actor,
            json!({ "order_id": order_id, "amount_cents": payment.amount.cents() }),
        )
        .await;
        self.broadcast(events::PAYMENT_PROCESSED, events::payment_processed(&payment))
            .await;

        Ok(payment)
    }

    /// All payments recorded against an order, oldest first.
    pub async fn payments(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        Ok(self.store.payments_for_order(order_id).await?)
    }

    // ----- Fulfillments -----

    /// Creates a fulfillment over part or all of an order's items,
    /// converting their reservations into a permanent stock decrease.
    ///
    /// Fails with `InvalidQuantity` if any requested quantity exceeds that
    /// item's remaining fulfillable quantity.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn create_fulfillment(
        &self,
        order_id: OrderId,
        items: Vec<FulfillmentItem>,
        actor: Option<&str>,
    ) -> Result<Fulfillment> {
        metrics::counter!("engine_fulfillments_total").increment(1);

        let mut uow = self.store.begin().await?;
        let mut order = require(uow.order(order_id).await?, "Order", order_id)?;

        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
            return Err(DomainError::invalid_state(
                "Order",
                order.id,
                order.status,
                "fulfill",
            )
            .into());
        }

        let fulfillment = Fulfillment::new(order_id, items)?;

        for line in &fulfillment.items {
            let item = order.item_mut(line.order_item_id)?;
            item.record_fulfilled(line.quantity)?;
            let product_id = item.product_id.clone();
            let variant_id = item.variant_id.clone();
            let tracked = item.snapshot.tracks_inventory;

            if tracked {
                consume_stock_for_line(
                    &mut uow,
                    &order.order_number,
                    &product_id,
                    variant_id.as_ref(),
                    line.quantity as i64,
                    &fulfillment.id.to_string(),
                    actor,
                )
                .await?;
            }
        }

        order.refresh_fulfillment_progress();
        uow.insert_fulfillment(&fulfillment).await?;
        uow.update_order(&order).await?;
        uow.commit().await?;

        tracing::info!(
            order_number = %order.order_number,
            fulfillment_id = %fulfillment.id,
            progress = %order.fulfillment_progress,
            "fulfillment created"
        );
        self.record_audit(
            "fulfillment.create",
            "Fulfillment",
            fulfillment.id.to_string(),
            actor,
            json!({ "order_id": order_id, "item_count": fulfillment.items.len() }),
        )
        .await;
        self.broadcast(
            events::FULFILLMENT_CREATED,
            events::fulfillment_created(&fulfillment),
        )
        .await;

        Ok(fulfillment)
    }

    /// Marks a fulfillment shipped and advances the order to `Shipped`.
    #[tracing::instrument(skip(self, tracking))]
    pub async fn ship_fulfillment(
        &self,
        fulfillment_id: FulfillmentId,
        tracking: domain::TrackingInfo,
        actor: Option<&str>,
    ) -> Result<Fulfillment> {
        let mut uow = self.store.begin().await?;
        let mut fulfillment = require(
            uow.fulfillment(fulfillment_id).await?,
            "Fulfillment",
            fulfillment_id,
        )?;
        fulfillment.ship(tracking)?;
        uow.update_fulfillment(&fulfillment).await?;

        let mut order = require(uow.order(fulfillment.order_id).await?, "Order", fulfillment.order_id)?;
        let old_status = order.status;
        advance_order(&mut order, OrderStatus::Shipped)?;
        uow.update_order(&order).await?;
        uow.commit().await?;

        if order.status != old_status {
            self.broadcast(
                events::ORDER_STATUS_UPDATED,
                events::order_status_updated(&order, old_status, order.status),
            )
            .await;
        }
        self.record_audit(
            "fulfillment.ship",
            "Fulfillment",
            fulfillment.id.to_string(),
            actor,
            json!({ "order_id": fulfillment.order_id }),
        )
        .await;

        Ok(fulfillment)
    }

    /// Confirms delivery of a shipped fulfillment; when every ordered unit
    /// has shipped, the order advances to `Delivered`.
    #[tracing::instrument(skip(self))]
    pub async fn mark_delivered(
        &self,
        fulfillment_id: FulfillmentId,
        actor: Option<&str>,
    ) -> Result<Fulfillment> {
        let mut uow = self.store.begin().await?;
        let mut fulfillment = require(
            uow.fulfillment(fulfillment_id).await?,
            "Fulfillment",
            fulfillment_id,
        )?;
        fulfillment.mark_delivered()?;
        uow.update_fulfillment(&fulfillment).await?;

        let mut order = require(uow.order(fulfillment.order_id).await?, "Order", fulfillment.order_id)?;
        let old_status = order.status;
        if order.fulfillment_progress == FulfillmentProgress::Fulfilled {
            advance_order(&mut order, OrderStatus::Delivered)?;
        }
        uow.update_order(&order).await?;
        uow.commit().await?;

        if order.status != old_status {
            self.broadcast(
                events::ORDER_STATUS_UPDATED,
                events::order_status_updated(&order, old_status, order.status),
            )
            .await;
        }
        self.record_audit(
            "fulfillment.deliver",
            "Fulfillment",
            fulfillment.id.to_string(),
            actor,
            json!({ "order_id": fulfillment.order_id }),
        )
        .await;

        Ok(fulfillment)
    }

    /// All fulfillments for an order, oldest first.
    pub async fn fulfillments(&self, order_id: OrderId) -> Result<Vec<Fulfillment>> {
        Ok(self.store.fulfillments_for_order(order_id).await?)
    }

    // ----- Returns -----

    /// Creates a return request over fulfilled items.
    ///
    /// Fails with `InvalidQuantity` if any requested quantity exceeds that
    /// item's fulfilled-minus-returned allowance.
    #[tracing::instrument(skip(self, items, reason), fields(item_count = items.len()))]
    pub async fn create_return(
        &self,
        order_id: OrderId,
        items: Vec<ReturnItem>,
        reason: &str,
        actor: Option<&str>,
    ) -> Result<Return> {
        metrics::counter!("engine_returns_total").increment(1);

        let mut uow = self.store.begin().await?;
        let order = require(uow.order(order_id).await?, "Order", order_id)?;

        for line in &items {
            let item = order.item(line.order_item_id)?;
            if line.quantity == 0 || line.quantity > item.returnable() {
                return Err(DomainError::InvalidQuantity {
                    item: item.product_id.to_string(),
                    requested: line.quantity,
                    allowed: item.returnable(),
                }
                .into());
            }
        }

        let today = Utc::now().date_naive();
        let sequence = uow
            .next_sequence(&day_key(&self.config.return_prefix, today))
            .await?;
        let return_number = format_number(&self.config.return_prefix, today, sequence);

        let ret = Return::new(order_id, return_number, reason, items)?;
        uow.insert_return(&ret).await?;
        uow.commit().await?;

        tracing::info!(return_number = %ret.return_number, "return requested");
        self.record_audit(
            "return.create",
            "Return",
            ret.id.to_string(),
            actor,
            json!({ "order_id": order_id, "return_number": ret.return_number }),
        )
        .await;
        self.broadcast(events::RETURN_CREATED, events::return_created(&ret))
            .await;

        Ok(ret)
    }

    /// Approves or rejects a return request.
    ///
    /// Approval records the refund amount and marks the returned units on
    /// the order's line items; moving money or stock is the approval
    /// hook's policy, invoked after commit.
    #[tracing::instrument(skip(self))]
    pub async fn process_return(
        &self,
        return_id: ReturnId,
        approve: bool,
        refund_amount: Option<Money>,
        actor: Option<&str>,
    ) -> Result<Return> {
        let mut uow = self.store.begin().await?;
        let mut ret = require(uow.return_request(return_id).await?, "Return", return_id)?;

        if approve {
            ret.approve(refund_amount)?;
            let mut order = require(uow.order(ret.order_id).await?, "Order", ret.order_id)?;
            for line in &ret.items {
                order
                    .item_mut(line.order_item_id)?
                    .record_returned(line.quantity)?;
            }
            uow.update_order(&order).await?;
        } else {
            ret.reject()?;
        }

        uow.update_return(&ret).await?;
        uow.commit().await?;

        if approve && let Err(err) = self.return_hook.on_return_approved(&ret).await {
            tracing::warn!(return_number = %ret.return_number, error = %err, "return hook failed");
        }
        self.record_audit(
            "return.process",
            "Return",
            ret.id.to_string(),
            actor,
            json!({ "approved": approve, "refund_cents": ret.refund_amount.map(|m| m.cents()) }),
        )
        .await;

        Ok(ret)
    }

    // ----- Inventory -----

    /// Creates a stock record with an initial quantity, recording the
    /// seeding as a `SET` adjustment.
    #[tracing::instrument(skip(self))]
    pub async fn create_item(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        location_id: LocationId,
        quantity: i64,
        low_stock_threshold: Option<i64>,
        actor: Option<&str>,
    ) -> Result<InventoryItem> {
        if quantity < 0 {
            return Err(DomainError::validation("initial quantity must not be negative").into());
        }
        let item = InventoryItem::new(
            product_id,
            variant_id,
            location_id,
            quantity,
            low_stock_threshold.unwrap_or(self.config.default_low_stock_threshold),
        );

        let mut uow = self.store.begin().await?;
        uow.insert_inventory_item(&item).await?;
        uow.insert_adjustment(&Adjustment::new(
            item.id,
            AdjustmentType::Set,
            quantity,
            "initial stock",
            None,
            actor.map(str::to_string),
        ))
        .await?;
        uow.commit().await?;

        self.record_audit(
            "inventory.create",
            "InventoryItem",
            item.id.to_string(),
            actor,
            json!({ "product_id": item.product_id, "quantity": quantity }),
        )
        .await;

        Ok(item)
    }

    /// Places a hold against a stock record.
    #[tracing::instrument(skip(self, reason, reference))]
    pub async fn reserve(
        &self,
        item_id: InventoryItemId,
        quantity: i64,
        reason: &str,
        reference: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Reservation> {
        let mut uow = self.store.begin().await?;
        let mut item = require(uow.inventory_item(item_id).await?, "InventoryItem", item_id)?;

        item.reserve(quantity)?;
        let reservation = Reservation::new(item_id, quantity, reason, reference, expires_at);
        uow.update_inventory_item(&item).await?;
        uow.insert_reservation(&reservation).await?;
        uow.commit().await?;

        Ok(reservation)
    }

    /// Releases a hold, returning its units to available.
    ///
    /// Releasing the same reservation twice fails with `InvalidState` and
    /// does not change quantities a second time.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, reservation_id: ReservationId) -> Result<Reservation> {
        let mut uow = self.store.begin().await?;
        let mut reservation = require(
            uow.reservation(reservation_id).await?,
            "Reservation",
            reservation_id,
        )?;
        let mut item = require(
            uow.inventory_item(reservation.inventory_item_id).await?,
            "InventoryItem",
            reservation.inventory_item_id,
        )?;

        reservation.release()?;
        item.release(reservation.quantity);
        uow.update_reservation(&reservation).await?;
        uow.update_inventory_item(&item).await?;
        uow.commit().await?;

        Ok(reservation)
    }

    /// Converts a hold into a permanent stock decrease.
    ///
    /// `quantity` may be less than the reservation's; the remainder is
    /// released back to available.
    #[tracing::instrument(skip(self))]
    pub async fn fulfill_reservation(
        &self,
        reservation_id: ReservationId,
        quantity: i64,
    ) -> Result<Reservation> {
        let mut uow = self.store.begin().await?;
        let mut reservation = require(
            uow.reservation(reservation_id).await?,
            "Reservation",
            reservation_id,
        )?;
        if quantity <= 0 || quantity > reservation.quantity {
            return Err(DomainError::InvalidQuantity {
                item: reservation.id.to_string(),
                requested: quantity.max(0) as u32,
                allowed: reservation.quantity.max(0) as u32,
            }
            .into());
        }
        let mut item = require(
            uow.inventory_item(reservation.inventory_item_id).await?,
            "InventoryItem",
            reservation.inventory_item_id,
        )?;

        reservation.fulfill()?;
        item.fulfill(quantity)?;
        if quantity < reservation.quantity {
            item.release(reservation.quantity - quantity);
        }
        uow.update_reservation(&reservation).await?;
        uow.update_inventory_item(&item).await?;
        uow.commit().await?;

        Ok(reservation)
    }

    /// Applies a raw stock change and records the immutable adjustment row.
    #[tracing::instrument(skip(self, reason, reference))]
    pub async fn adjust(
        &self,
        item_id: InventoryItemId,
        adjustment_type: AdjustmentType,
        quantity: i64,
        reason: &str,
        reference: Option<String>,
        actor: Option<&str>,
    ) -> Result<Adjustment> {
        let mut uow = self.store.begin().await?;
        let mut item = require(uow.inventory_item(item_id).await?, "InventoryItem", item_id)?;

        match adjustment_type {
            AdjustmentType::Increase => item.increase(quantity),
            AdjustmentType::Decrease => item.decrease(quantity)?,
            AdjustmentType::Set => item.set_quantity(quantity)?,
        }

        let adjustment = Adjustment::new(
            item_id,
            adjustment_type,
            quantity,
            reason,
            reference,
            actor.map(str::to_string),
        );
        uow.update_inventory_item(&item).await?;
        uow.insert_adjustment(&adjustment).await?;
        uow.commit().await?;

        self.record_audit(
            "inventory.adjust",
            "InventoryItem",
            item_id.to_string(),
            actor,
            json!({ "type": adjustment_type.as_str(), "quantity": quantity, "reason": reason }),
        )
        .await;

        Ok(adjustment)
    }

    /// Releases every active reservation whose expiry has passed.
    ///
    /// Returns the number of reservations released.
    #[tracing::instrument(skip(self))]
    pub async fn release_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut uow = self.store.begin().await?;
        let expired = uow.expired_reservations(now).await?;
        let count = expired.len();

        for mut reservation in expired {
            let mut item = require(
                uow.inventory_item(reservation.inventory_item_id).await?,
                "InventoryItem",
                reservation.inventory_item_id,
            )?;
            reservation.release()?;
            item.release(reservation.quantity);
            uow.update_reservation(&reservation).await?;
            uow.update_inventory_item(&item).await?;
        }
        uow.commit().await?;

        if count > 0 {
            tracing::info!(count, "expired reservations released");
        }
        Ok(count)
    }

    /// Loads a stock record.
    pub async fn inventory_item(&self, item_id: InventoryItemId) -> Result<InventoryItem> {
        require(
            self.store.load_inventory_item(item_id).await?,
            "InventoryItem",
            item_id,
        )
    }

    /// Stock totals for a product/variant across locations.
    pub async fn totals(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
    ) -> Result<StockTotals> {
        Ok(self.store.stock_totals(product_id, variant_id).await?)
    }

    /// Stock records at or below their low-stock threshold.
    pub async fn low_stock_items(&self) -> Result<Vec<InventoryItem>> {
        Ok(self.store.low_stock_items().await?)
    }

    /// Stock records with nothing available to sell.
    pub async fn out_of_stock_items(&self) -> Result<Vec<InventoryItem>> {
        Ok(self.store.out_of_stock_items().await?)
    }

    /// Adjustment history for a stock record, oldest first.
    pub async fn adjustments(&self, item_id: InventoryItemId) -> Result<Vec<Adjustment>> {
        Ok(self.store.adjustments_for_item(item_id).await?)
    }

    // ----- Post-commit side effects -----

    fn reservation_expiry(&self) -> Option<DateTime<Utc>> {
        self.config
            .reservation_ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() + ttl)
    }

    async fn broadcast(&self, event: &str, payload: serde_json::Value) {
        if let Err(err) = self.broadcaster.publish(event, payload).await {
            tracing::warn!(event, error = %err, "event broadcast failed");
        }
    }

    async fn record_audit(
        &self,
        action: &str,
        entity_type: &str,
        entity_id: String,
        actor: Option<&str>,
        metadata: serde_json::Value,
    ) {
        let entry = AuditEntry {
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            actor: actor.map(str::to_string),
            metadata,
        };
        if let Err(err) = self.audit.record(entry).await {
            tracing::warn!(action, error = %err, "audit record failed");
        }
    }
}

fn require<T>(value: Option<T>, entity: &'static str, id: impl ToString) -> Result<T> {
    value.ok_or_else(|| DomainError::not_found(entity, id.to_string()).into())
}

fn line_label(product_id: &ProductId, variant_id: Option<&VariantId>) -> String {
    match variant_id {
        Some(variant) => format!("{product_id}/{variant}"),
        None => product_id.to_string(),
    }
}

/// Walks an order forward along the fulfillment chain to `target`,
/// transitioning through intermediate statuses. Orders outside the chain
/// (cancelled, refunded) are left untouched.
fn advance_order(order: &mut Order, target: OrderStatus) -> std::result::Result<(), DomainError> {
    const CHAIN: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];

    let Some(target_idx) = CHAIN.iter().position(|s| *s == target) else {
        return Ok(());
    };
    let Some(mut current_idx) = CHAIN.iter().position(|s| *s == order.status) else {
        return Ok(());
    };
    while current_idx < target_idx {
        current_idx += 1;
        order.transition_status(CHAIN[current_idx])?;
    }
    Ok(())
}

/// Reserves `quantity` units of a product across its stock locations for a
/// new order, preferring locations in their sorted order.
///
/// Fails the whole operation with `InsufficientStock` (naming the
/// offending product) if the locations together cannot cover the quantity.
async fn reserve_stock_for_line<U: UnitOfWork>(
    uow: &mut U,
    product_id: &ProductId,
    variant_id: Option<&VariantId>,
    quantity: i64,
    order_number: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<()> {
    let mut items = uow.inventory_items_for_product(product_id, variant_id).await?;
    let total_available: i64 = items.iter().map(|i| i.available()).sum();
    if total_available < quantity {
        return Err(DomainError::InsufficientStock {
            item: line_label(product_id, variant_id),
            requested: quantity,
            available: total_available,
        }
        .into());
    }

    let mut remaining = quantity;
    for item in items.iter_mut() {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(item.available());
        if take <= 0 {
            continue;
        }
        item.reserve(take)?;
        uow.update_inventory_item(item).await?;
        uow.insert_reservation(&Reservation::new(
            item.id,
            take,
            "order",
            order_number,
            expires_at,
        ))
        .await?;
        remaining -= take;
    }

    Ok(())
}

/// Converts up to `quantity` reserved units for a product into a permanent
/// stock decrease at fulfillment time.
///
/// Consumes the order's active reservations oldest-first; a reservation
/// larger than the remaining quantity is closed and replaced with a
/// smaller active one. Units beyond what is reserved (e.g. after an expiry
/// sweep) come straight out of raw availability.
async fn consume_stock_for_line<U: UnitOfWork>(
    uow: &mut U,
    order_number: &str,
    product_id: &ProductId,
    variant_id: Option<&VariantId>,
    quantity: i64,
    fulfillment_ref: &str,
    actor: Option<&str>,
) -> Result<()> {
    let mut remaining = quantity;

    let reservations = uow.active_reservations_for_reference(order_number).await?;
    for mut reservation in reservations {
        if remaining == 0 {
            break;
        }
        let Some(mut item) = uow.inventory_item(reservation.inventory_item_id).await? else {
            return Err(StoreError::corrupted(format!(
                "reservation {} references missing inventory item",
                reservation.id
            ))
            .into());
        };
        if &item.product_id != product_id || item.variant_id.as_ref() != variant_id {
            continue;
        }

        let take = remaining.min(reservation.quantity);
        item.fulfill(take)?;
        reservation.fulfill()?;
        uow.update_inventory_item(&item).await?;
        uow.update_reservation(&reservation).await?;

        if take < reservation.quantity {
            uow.insert_reservation(&Reservation::new(
                item.id,
                reservation.quantity - take,
                reservation.reason.clone(),
                reservation.reference.clone(),
                reservation.expires_at,
            ))
            .await?;
        }

        uow.insert_adjustment(&Adjustment::new(
            item.id,
            AdjustmentType::Decrease,
            take,
            "fulfillment",
            Some(fulfillment_ref.to_string()),
            actor.map(str::to_string),
        ))
        .await?;
        remaining -= take;
    }

    if remaining > 0 {
        let mut items = uow.inventory_items_for_product(product_id, variant_id).await?;
        let total_available: i64 = items.iter().map(|i| i.available()).sum();
        for item in items.iter_mut() {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(item.available());
            if take <= 0 {
                continue;
            }
            item.decrease(take)?;
            uow.update_inventory_item(item).await?;
            uow.insert_adjustment(&Adjustment::new(
                item.id,
                AdjustmentType::Decrease,
                take,
                "fulfillment",
                Some(fulfillment_ref.to_string()),
                actor.map(str::to_string),
            ))
            .await?;
            remaining -= take;
        }
        if remaining > 0 {
            return Err(DomainError::InsufficientStock {
                item: line_label(product_id, variant_id),
                requested: quantity,
                available: total_available,
            }
            .into());
        }
    }

    Ok(())
}
