//! End-to-end engine scenarios over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{Currency, CustomerId, InventoryItemId, LocationId, Money, ProductId};
use domain::{
    AdjustmentType, DomainError, FinancialStatus, FulfillmentItem, FulfillmentProgress,
    FulfillmentStatus, OrderStatus, Purchaser, ReturnItem, ReturnStatus, TrackingInfo,
};
use engine::services::{
    CatalogEntry, InMemoryAuditLog, InMemoryBroadcaster, InMemoryCatalog, InMemoryCustomerStats,
    InMemoryGateway,
};
use engine::{
    CreateOrderRequest, Engine, EngineConfig, EngineError, NewOrderItem, OrderPatch,
    PaymentRequest,
};
use store::InMemoryStore;

struct Harness {
    engine: Engine<InMemoryStore>,
    store: InMemoryStore,
    catalog: Arc<InMemoryCatalog>,
    gateway: Arc<InMemoryGateway>,
    broadcaster: Arc<InMemoryBroadcaster>,
    audit: Arc<InMemoryAuditLog>,
    stats: Arc<InMemoryCustomerStats>,
}

fn setup() -> Harness {
    setup_with_config(EngineConfig::default())
}

fn setup_with_config(config: EngineConfig) -> Harness {
    let store = InMemoryStore::new();
    let catalog = Arc::new(InMemoryCatalog::new());
    let gateway = Arc::new(InMemoryGateway::new());
    let broadcaster = Arc::new(InMemoryBroadcaster::new());
    let audit = Arc::new(InMemoryAuditLog::new());
    let stats = Arc::new(InMemoryCustomerStats::new());

    let engine = Engine::new(store.clone(), catalog.clone(), gateway.clone(), config)
        .with_broadcaster(broadcaster.clone())
        .with_audit(audit.clone())
        .with_stats(stats.clone());

    Harness {
        engine,
        store,
        catalog,
        gateway,
        broadcaster,
        audit,
        stats,
    }
}

/// Seeds a tracked catalog product with one stock record at WH-1.
async fn seed_product(h: &Harness, sku: &str, price_cents: i64, stock: i64) -> InventoryItemId {
    h.catalog
        .add_product(sku, &format!("Product {sku}"), Money::from_cents(price_cents));
    let item = h
        .engine
        .create_item(
            ProductId::new(sku),
            None,
            LocationId::new("WH-1"),
            stock,
            None,
            None,
        )
        .await
        .unwrap();
    item.id
}

fn order_request(sku: &str, quantity: u32) -> CreateOrderRequest {
    CreateOrderRequest {
        purchaser: Purchaser::guest("buyer@example.com"),
        currency: Currency::usd(),
        items: vec![NewOrderItem {
            product_id: ProductId::new(sku),
            variant_id: None,
            quantity,
            price_override: None,
        }],
        shipping_address: None,
        billing_address: None,
        tags: Vec::new(),
        notes: None,
    }
}

fn payment_request(cents: i64) -> PaymentRequest {
    PaymentRequest {
        amount: Money::from_cents(cents),
        currency: Currency::usd(),
        method: "card".to_string(),
        gateway: "test-gateway".to_string(),
        gateway_transaction_id: None,
    }
}

// ----- Orders and reservations -----

#[tokio::test]
async fn test_create_order_reserves_stock() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;

    let order = h
        .engine
        .create_order(order_request("SKU-001", 2), None)
        .await
        .unwrap();

    assert!(order.order_number.starts_with("ORD-"));
    assert!(order.order_number.ends_with("-0001"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.financial_status, FinancialStatus::Pending);
    assert_eq!(order.fulfillment_progress, FulfillmentProgress::Unfulfilled);
    assert_eq!(order.total.cents(), 10_000);

    let totals = h
        .engine
        .totals(&ProductId::new("SKU-001"), None)
        .await
        .unwrap();
    assert_eq!(totals.on_hand, 5);
    assert_eq!(totals.reserved, 2);
    assert_eq!(totals.available, 3);

    assert_eq!(h.broadcaster.event_names(), vec!["order.created"]);
}

#[tokio::test]
async fn test_insufficient_stock_rolls_back_everything() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;

    let err = h
        .engine
        .create_order(order_request("SKU-001", 10), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Domain(DomainError::InsufficientStock {
            requested: 10,
            available: 5,
            ..
        })
    ));

    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.store.reservation_count().await, 0);
    let totals = h
        .engine
        .totals(&ProductId::new("SKU-001"), None)
        .await
        .unwrap();
    assert_eq!(totals.reserved, 0);
    assert!(h.broadcaster.events().is_empty());

    // The rolled-back attempt did not consume a sequence value.
    let order = h
        .engine
        .create_order(order_request("SKU-001", 2), None)
        .await
        .unwrap();
    assert!(order.order_number.ends_with("-0001"));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let h = setup();

    let err = h
        .engine
        .create_order(order_request("SKU-404", 1), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Domain(DomainError::NotFound { entity: "Product", .. })
    ));
}

#[tokio::test]
async fn test_untracked_product_skips_reservation() {
    let h = setup();
    h.catalog.add(CatalogEntry {
        product_id: ProductId::new("SVC-001"),
        variant_id: None,
        name: "Installation service".to_string(),
        sku: "SVC-001".to_string(),
        price: Money::from_cents(9900),
        tracks_inventory: false,
    });

    let order = h
        .engine
        .create_order(order_request("SVC-001", 1), None)
        .await
        .unwrap();
    assert_eq!(order.total.cents(), 9900);
    assert_eq!(h.store.reservation_count().await, 0);
}

#[tokio::test]
async fn test_price_override_keeps_snapshot_price() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;

    let mut request = order_request("SKU-001", 1);
    request.items[0].price_override = Some(Money::from_cents(4000));

    let order = h.engine.create_order(request, None).await.unwrap();
    assert_eq!(order.total.cents(), 4000);
    assert_eq!(order.items[0].unit_price.cents(), 4000);
    assert_eq!(order.items[0].snapshot.price.cents(), 5000);
}

#[tokio::test]
async fn test_concurrent_orders_get_distinct_numbers() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 10).await;

    let (a, b) = tokio::join!(
        h.engine.create_order(order_request("SKU-001", 2), None),
        h.engine.create_order(order_request("SKU-001", 2), None),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_ne!(a.order_number, b.order_number);
    let mut suffixes: Vec<&str> = vec![
        a.order_number.rsplit('-').next().unwrap(),
        b.order_number.rsplit('-').next().unwrap(),
    ];
    suffixes.sort();
    assert_eq!(suffixes, vec!["0001", "0002"]);

    let totals = h
        .engine
        .totals(&ProductId::new("SKU-001"), None)
        .await
        .unwrap();
    assert_eq!(totals.reserved, 4);
}

#[tokio::test]
async fn test_update_order_enforces_transition_table() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 1), None)
        .await
        .unwrap();

    let err = h
        .engine
        .update_order(
            order.id,
            OrderPatch {
                status: Some(OrderStatus::Delivered),
                ..OrderPatch::default()
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::InvalidState { .. })));

    let updated = h
        .engine
        .update_order(
            order.id,
            OrderPatch {
                status: Some(OrderStatus::Confirmed),
                notes: Some("priority customer".to_string()),
                ..OrderPatch::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Confirmed);
    assert!(updated.notes.as_deref().unwrap().contains("priority customer"));
    assert!(
        h.broadcaster
            .event_names()
            .contains(&"order.status.updated".to_string())
    );
}

#[tokio::test]
async fn test_customer_stats_updated_after_order() {
    let h = setup();
    seed_product(&h, "SKU-001", 2500, 5).await;
    let customer = CustomerId::new();

    let mut request = order_request("SKU-001", 2);
    request.purchaser = Purchaser::customer(customer);
    h.engine.create_order(request, None).await.unwrap();

    assert_eq!(
        h.stats.stats_for(customer),
        Some((1, Money::from_cents(5000)))
    );
}

// ----- Payments -----

#[tokio::test]
async fn test_partial_then_full_payment() {
    let h = setup();
    seed_product(&h, "SKU-001", 10_000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 1), None)
        .await
        .unwrap();

    h.engine
        .process_payment(order.id, payment_request(5000), None)
        .await
        .unwrap();
    let after_first = h.engine.order(order.id).await.unwrap();
    assert_eq!(after_first.financial_status, FinancialStatus::PartiallyPaid);

    h.engine
        .process_payment(order.id, payment_request(5000), None)
        .await
        .unwrap();
    let after_second = h.engine.order(order.id).await.unwrap();
    assert_eq!(after_second.financial_status, FinancialStatus::Paid);

    assert_eq!(h.gateway.charge_count(), 2);
    assert_eq!(h.engine.payments(order.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_declined_charge_persists_nothing() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 1), None)
        .await
        .unwrap();

    h.gateway.set_fail_on_charge(true);
    let err = h
        .engine
        .process_payment(order.id, payment_request(5000), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Domain(DomainError::PaymentFailed { .. })
    ));

    assert!(h.engine.payments(order.id).await.unwrap().is_empty());
    let unchanged = h.engine.order(order.id).await.unwrap();
    assert_eq!(unchanged.financial_status, FinancialStatus::Pending);
}

#[tokio::test]
async fn test_gateway_timeout_is_payment_failure() {
    let h = setup_with_config(EngineConfig {
        gateway_timeout: Duration::from_millis(50),
        ..EngineConfig::default()
    });
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 1), None)
        .await
        .unwrap();

    h.gateway.set_delay(Duration::from_millis(500));
    let err = h
        .engine
        .process_payment(order.id, payment_request(5000), None)
        .await
        .unwrap_err();
    match err {
        EngineError::Domain(DomainError::PaymentFailed { reason, .. }) => {
            assert!(reason.contains("timed out"));
        }
        other => panic!("expected PaymentFailed, got {other:?}"),
    }
    assert!(h.engine.payments(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_currency_recorded_as_given() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 1), None)
        .await
        .unwrap();

    let mut request = payment_request(5000);
    request.currency = Currency::new("eur");
    let payment = h
        .engine
        .process_payment(order.id, request, None)
        .await
        .unwrap();

    // Amounts are not converted; a mismatched currency is recorded as-is
    // and still counts toward the paid sum.
    assert_eq!(payment.currency.as_str(), "EUR");
    let paid = h.engine.order(order.id).await.unwrap();
    assert_eq!(paid.financial_status, FinancialStatus::Paid);
}

// ----- Cancellation -----

#[tokio::test]
async fn test_cancel_refunds_payments_and_releases_stock() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 2), None)
        .await
        .unwrap();
    h.engine
        .process_payment(order.id, payment_request(10_000), None)
        .await
        .unwrap();

    let cancelled = h
        .engine
        .cancel_order(order.id, "customer request", None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.financial_status, FinancialStatus::Refunded);

    let payments = h.engine.payments(order.id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(domain::completed_sum(&payments).cents(), 0);

    let totals = h
        .engine
        .totals(&ProductId::new("SKU-001"), None)
        .await
        .unwrap();
    assert_eq!(totals.reserved, 0);
    assert_eq!(totals.available, 5);

    assert!(
        h.broadcaster
            .event_names()
            .contains(&"order.cancelled".to_string())
    );
}

#[tokio::test]
async fn test_cancel_shipped_order_fails_unchanged() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 2), None)
        .await
        .unwrap();

    let fulfillment = h
        .engine
        .create_fulfillment(
            order.id,
            vec![FulfillmentItem {
                order_item_id: order.items[0].id,
                quantity: 2,
            }],
            None,
        )
        .await
        .unwrap();
    h.engine
        .ship_fulfillment(fulfillment.id, TrackingInfo::default(), None)
        .await
        .unwrap();

    let err = h
        .engine
        .cancel_order(order.id, "too late", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::InvalidState { .. })));

    let unchanged = h.engine.order(order.id).await.unwrap();
    assert_eq!(unchanged.status, OrderStatus::Shipped);
}

// ----- Fulfillments -----

#[tokio::test]
async fn test_fulfillment_consumes_reservation_and_ships() {
    let h = setup();
    let item_id = seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 2), None)
        .await
        .unwrap();

    let fulfillment = h
        .engine
        .create_fulfillment(
            order.id,
            vec![FulfillmentItem {
                order_item_id: order.items[0].id,
                quantity: 2,
            }],
            None,
        )
        .await
        .unwrap();
    assert_eq!(fulfillment.status, FulfillmentStatus::Pending);

    let totals = h
        .engine
        .totals(&ProductId::new("SKU-001"), None)
        .await
        .unwrap();
    assert_eq!(totals.on_hand, 3);
    assert_eq!(totals.reserved, 0);

    let after = h.engine.order(order.id).await.unwrap();
    assert_eq!(after.fulfillment_progress, FulfillmentProgress::Fulfilled);

    let adjustments = h.engine.adjustments(item_id).await.unwrap();
    let decrease = adjustments
        .iter()
        .find(|a| a.adjustment_type == AdjustmentType::Decrease)
        .unwrap();
    assert_eq!(decrease.quantity, 2);
    assert_eq!(decrease.reason, "fulfillment");

    let shipped = h
        .engine
        .ship_fulfillment(
            fulfillment.id,
            TrackingInfo {
                carrier: Some("UPS".to_string()),
                tracking_number: Some("1Z999".to_string()),
                tracking_url: None,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(shipped.status, FulfillmentStatus::Shipped);
    assert_eq!(
        h.engine.order(order.id).await.unwrap().status,
        OrderStatus::Shipped
    );

    h.engine.mark_delivered(fulfillment.id, None).await.unwrap();
    assert_eq!(
        h.engine.order(order.id).await.unwrap().status,
        OrderStatus::Delivered
    );
}

#[tokio::test]
async fn test_partial_fulfillment_keeps_remaining_reservation() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 3), None)
        .await
        .unwrap();

    h.engine
        .create_fulfillment(
            order.id,
            vec![FulfillmentItem {
                order_item_id: order.items[0].id,
                quantity: 2,
            }],
            None,
        )
        .await
        .unwrap();

    let totals = h
        .engine
        .totals(&ProductId::new("SKU-001"), None)
        .await
        .unwrap();
    assert_eq!(totals.on_hand, 3);
    assert_eq!(totals.reserved, 1);

    let after = h.engine.order(order.id).await.unwrap();
    assert_eq!(
        after.fulfillment_progress,
        FulfillmentProgress::PartiallyFulfilled
    );

    // The remaining unit ships on a second fulfillment.
    h.engine
        .create_fulfillment(
            order.id,
            vec![FulfillmentItem {
                order_item_id: order.items[0].id,
                quantity: 1,
            }],
            None,
        )
        .await
        .unwrap();
    let done = h.engine.order(order.id).await.unwrap();
    assert_eq!(done.fulfillment_progress, FulfillmentProgress::Fulfilled);
    assert_eq!(h.engine.fulfillments(order.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_overfulfillment_rejected_unchanged() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 2), None)
        .await
        .unwrap();

    let err = h
        .engine
        .create_fulfillment(
            order.id,
            vec![FulfillmentItem {
                order_item_id: order.items[0].id,
                quantity: 3,
            }],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Domain(DomainError::InvalidQuantity {
            requested: 3,
            allowed: 2,
            ..
        })
    ));

    assert!(h.engine.fulfillments(order.id).await.unwrap().is_empty());
    let totals = h
        .engine
        .totals(&ProductId::new("SKU-001"), None)
        .await
        .unwrap();
    assert_eq!(totals.on_hand, 5);
    assert_eq!(totals.reserved, 2);
}

#[tokio::test]
async fn test_fulfill_cancelled_order_fails() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 1), None)
        .await
        .unwrap();
    h.engine.cancel_order(order.id, "changed mind", None).await.unwrap();

    let err = h
        .engine
        .create_fulfillment(
            order.id,
            vec![FulfillmentItem {
                order_item_id: order.items[0].id,
                quantity: 1,
            }],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::InvalidState { .. })));
}

// ----- Returns -----

#[tokio::test]
async fn test_return_bounded_by_fulfilled_quantity() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 2), None)
        .await
        .unwrap();

    // Nothing fulfilled yet: nothing is returnable.
    let err = h
        .engine
        .create_return(
            order.id,
            vec![ReturnItem {
                order_item_id: order.items[0].id,
                quantity: 1,
                condition: None,
            }],
            "damaged",
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Domain(DomainError::InvalidQuantity { allowed: 0, .. })
    ));

    h.engine
        .create_fulfillment(
            order.id,
            vec![FulfillmentItem {
                order_item_id: order.items[0].id,
                quantity: 2,
            }],
            None,
        )
        .await
        .unwrap();

    let ret = h
        .engine
        .create_return(
            order.id,
            vec![ReturnItem {
                order_item_id: order.items[0].id,
                quantity: 1,
                condition: Some("damaged".to_string()),
            }],
            "damaged in transit",
            None,
        )
        .await
        .unwrap();
    assert!(ret.return_number.starts_with("RET-"));
    assert!(ret.return_number.ends_with("-0001"));
    assert_eq!(ret.status, ReturnStatus::Requested);
    assert!(
        h.broadcaster
            .event_names()
            .contains(&"return.created".to_string())
    );
}

#[tokio::test]
async fn test_approved_return_records_refund_and_counters() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 2), None)
        .await
        .unwrap();
    h.engine
        .create_fulfillment(
            order.id,
            vec![FulfillmentItem {
                order_item_id: order.items[0].id,
                quantity: 2,
            }],
            None,
        )
        .await
        .unwrap();

    let ret = h
        .engine
        .create_return(
            order.id,
            vec![ReturnItem {
                order_item_id: order.items[0].id,
                quantity: 1,
                condition: None,
            }],
            "wrong size",
            None,
        )
        .await
        .unwrap();

    let approved = h
        .engine
        .process_return(ret.id, true, Some(Money::from_cents(5000)), None)
        .await
        .unwrap();
    assert_eq!(approved.status, ReturnStatus::Approved);
    assert_eq!(approved.refund_amount, Some(Money::from_cents(5000)));

    let after = h.engine.order(order.id).await.unwrap();
    assert_eq!(after.items[0].quantity_returned, 1);

    // A second return may only cover what is still returnable.
    let err = h
        .engine
        .create_return(
            order.id,
            vec![ReturnItem {
                order_item_id: order.items[0].id,
                quantity: 2,
                condition: None,
            }],
            "wrong size",
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Domain(DomainError::InvalidQuantity {
            requested: 2,
            allowed: 1,
            ..
        })
    ));
}

#[tokio::test]
async fn test_rejected_return_leaves_counters_alone() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 1), None)
        .await
        .unwrap();
    h.engine
        .create_fulfillment(
            order.id,
            vec![FulfillmentItem {
                order_item_id: order.items[0].id,
                quantity: 1,
            }],
            None,
        )
        .await
        .unwrap();
    let ret = h
        .engine
        .create_return(
            order.id,
            vec![ReturnItem {
                order_item_id: order.items[0].id,
                quantity: 1,
                condition: None,
            }],
            "no reason given",
            None,
        )
        .await
        .unwrap();

    let rejected = h.engine.process_return(ret.id, false, None, None).await.unwrap();
    assert_eq!(rejected.status, ReturnStatus::Rejected);

    let after = h.engine.order(order.id).await.unwrap();
    assert_eq!(after.items[0].quantity_returned, 0);

    // A decision is final.
    let err = h
        .engine
        .process_return(ret.id, true, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::InvalidState { .. })));
}

// ----- Inventory operations -----

#[tokio::test]
async fn test_double_release_fails_without_double_counting() {
    let h = setup();
    let item_id = seed_product(&h, "SKU-001", 5000, 10).await;

    let reservation = h
        .engine
        .reserve(item_id, 4, "order", "ORD-X", None)
        .await
        .unwrap();
    h.engine.release(reservation.id).await.unwrap();

    let err = h.engine.release(reservation.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::InvalidState { .. })));

    let item = h.engine.inventory_item(item_id).await.unwrap();
    assert_eq!(item.reserved_quantity, 0);
    assert_eq!(item.available(), 10);
}

#[tokio::test]
async fn test_partial_reservation_fulfillment_releases_remainder() {
    let h = setup();
    let item_id = seed_product(&h, "SKU-001", 5000, 10).await;

    let reservation = h
        .engine
        .reserve(item_id, 4, "order", "ORD-X", None)
        .await
        .unwrap();
    h.engine.fulfill_reservation(reservation.id, 3).await.unwrap();

    let item = h.engine.inventory_item(item_id).await.unwrap();
    assert_eq!(item.quantity, 7);
    assert_eq!(item.reserved_quantity, 0);
    assert_eq!(item.available(), 7);
}

#[tokio::test]
async fn test_adjustments_keep_full_history() {
    let h = setup();
    let item_id = seed_product(&h, "SKU-001", 5000, 10).await;

    h.engine
        .adjust(item_id, AdjustmentType::Increase, 5, "restock", None, Some("ops"))
        .await
        .unwrap();
    h.engine
        .adjust(
            item_id,
            AdjustmentType::Set,
            12,
            "cycle count",
            Some("CC-42".to_string()),
            Some("ops"),
        )
        .await
        .unwrap();

    let item = h.engine.inventory_item(item_id).await.unwrap();
    assert_eq!(item.quantity, 12);

    let history = h.engine.adjustments(item_id).await.unwrap();
    // Seed SET, INCREASE, cycle-count SET.
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].adjustment_type, AdjustmentType::Set);
    assert_eq!(history[1].adjustment_type, AdjustmentType::Increase);
    assert_eq!(history[2].reference.as_deref(), Some("CC-42"));
}

#[tokio::test]
async fn test_decrease_below_reserved_fails() {
    let h = setup();
    let item_id = seed_product(&h, "SKU-001", 5000, 10).await;
    h.engine
        .reserve(item_id, 6, "order", "ORD-X", None)
        .await
        .unwrap();

    let err = h
        .engine
        .adjust(item_id, AdjustmentType::Decrease, 5, "shrinkage", None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Domain(DomainError::InsufficientStock { .. })
    ));

    let item = h.engine.inventory_item(item_id).await.unwrap();
    assert_eq!(item.quantity, 10);
}

#[tokio::test]
async fn test_expired_reservations_are_swept() {
    let h = setup_with_config(EngineConfig {
        reservation_ttl: Some(Duration::from_millis(0)),
        ..EngineConfig::default()
    });
    seed_product(&h, "SKU-001", 5000, 5).await;
    let order = h
        .engine
        .create_order(order_request("SKU-001", 2), None)
        .await
        .unwrap();

    let released = h.engine.release_expired(Utc::now()).await.unwrap();
    assert_eq!(released, 1);

    let totals = h
        .engine
        .totals(&ProductId::new("SKU-001"), None)
        .await
        .unwrap();
    assert_eq!(totals.reserved, 0);
    assert_eq!(totals.available, 5);

    // With the hold gone, fulfillment draws from raw availability.
    h.engine
        .create_fulfillment(
            order.id,
            vec![FulfillmentItem {
                order_item_id: order.items[0].id,
                quantity: 2,
            }],
            None,
        )
        .await
        .unwrap();
    let totals = h
        .engine
        .totals(&ProductId::new("SKU-001"), None)
        .await
        .unwrap();
    assert_eq!(totals.on_hand, 3);
    assert_eq!(totals.reserved, 0);
}

#[tokio::test]
async fn test_low_stock_report() {
    let h = setup();
    h.catalog
        .add_product("SKU-001", "Widget", Money::from_cents(5000));
    h.engine
        .create_item(
            ProductId::new("SKU-001"),
            None,
            LocationId::new("WH-1"),
            3,
            Some(5),
            None,
        )
        .await
        .unwrap();
    h.engine
        .create_item(
            ProductId::new("SKU-001"),
            None,
            LocationId::new("WH-2"),
            50,
            Some(5),
            None,
        )
        .await
        .unwrap();

    let low = h.engine.low_stock_items().await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].location_id, LocationId::new("WH-1"));
    assert!(h.engine.out_of_stock_items().await.unwrap().is_empty());
}

// ----- Collaborator failure handling -----

#[tokio::test]
async fn test_broadcast_failure_never_fails_the_operation() {
    let h = setup();
    seed_product(&h, "SKU-001", 5000, 5).await;
    h.broadcaster.set_fail_on_publish(true);

    let order = h
        .engine
        .create_order(order_request("SKU-001", 1), None)
        .await
        .unwrap();

    // The order committed and the audit trail still recorded it.
    assert_eq!(h.store.order_count().await, 1);
    assert!(h.broadcaster.events().is_empty());
    assert!(
        h.audit
            .entries()
            .iter()
            .any(|e| e.action == "order.create" && e.entity_id == order.id.to_string())
    );
}
