use std::sync::Arc;

use common::{Currency, LocationId, Money, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{FulfillmentItem, Purchaser, TrackingInfo};
use engine::services::{InMemoryCatalog, InMemoryGateway};
use engine::{CreateOrderRequest, Engine, EngineConfig, NewOrderItem, PaymentRequest};
use store::InMemoryStore;

fn make_engine(stock: i64) -> Engine<InMemoryStore> {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.add_product("SKU-BENCH", "Benchmark Widget", Money::from_cents(1000));

    let engine = Engine::new(
        InMemoryStore::new(),
        catalog,
        Arc::new(InMemoryGateway::new()),
        EngineConfig::default(),
    );

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        engine
            .create_item(
                ProductId::new("SKU-BENCH"),
                None,
                LocationId::new("WH-1"),
                stock,
                None,
                None,
            )
            .await
            .unwrap();
    });
    engine
}

fn order_request(quantity: u32) -> CreateOrderRequest {
    CreateOrderRequest {
        purchaser: Purchaser::guest("bench@example.com"),
        currency: Currency::usd(),
        items: vec![NewOrderItem {
            product_id: ProductId::new("SKU-BENCH"),
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

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = make_engine(100_000_000);

    c.bench_function("engine/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.create_order(order_request(1), None).await.unwrap();
            });
        });
    });
}

fn bench_payment_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = make_engine(100_000_000);

    c.bench_function("engine/create_order_and_pay", |b| {
        b.iter(|| {
            rt.block_on(async {
                let order = engine.create_order(order_request(1), None).await.unwrap();
                engine
                    .process_payment(
                        order.id,
                        PaymentRequest {
                            amount: order.total,
                            currency: order.currency.clone(),
                            method: "card".to_string(),
                            gateway: "bench".to_string(),
                            gateway_transaction_id: None,
                        },
                        None,
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_full_fulfillment_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = make_engine(100_000_000);

    c.bench_function("engine/order_fulfill_ship_deliver", |b| {
        b.iter(|| {
            rt.block_on(async {
                let order = engine.create_order(order_request(2), None).await.unwrap();
                let fulfillment = engine
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
                engine
                    .ship_fulfillment(fulfillment.id, TrackingInfo::default(), None)
                    .await
                    .unwrap();
                engine.mark_delivered(fulfillment.id, None).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_order,
    bench_payment_cycle,
    bench_full_fulfillment_cycle,
);
criterion_main!(benches);
