//! Domain event names and payloads broadcast after commit.

use domain::{Fulfillment, Order, OrderStatus, Payment, Return};
use serde_json::json;

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_STATUS_UPDATED: &str = "order.status.updated";
pub const ORDER_CANCELLED: &str = "order.cancelled";
pub const PAYMENT_PROCESSED: &str = "payment.processed";
pub const FULFILLMENT_CREATED: &str = "fulfillment.created";
pub const RETURN_CREATED: &str = "return.created";

pub fn order_created(order: &Order) -> serde_json::Value {
    json!({
        "order_id": order.id,
        "order_number": order.order_number,
        "total_cents": order.total.cents(),
        "currency": order.currency.as_str(),
        "item_count": order.items.len(),
    })
}

pub fn order_status_updated(order: &Order, old: OrderStatus, new: OrderStatus) -> serde_json::Value {
    json!({
        "order_id": order.id,
        "order_number": order.order_number,
        "old_status": old.as_str(),
        "new_status": new.as_str(),
    })
}

pub fn order_cancelled(order: &Order, reason: &str) -> serde_json::Value {
    json!({
        "order_id": order.id,
        "order_number": order.order_number,
        "reason": reason,
    })
}

pub fn payment_processed(payment: &Payment) -> serde_json::Value {
    json!({
        "payment_id": payment.id,
        "order_id": payment.order_id,
        "amount_cents": payment.amount.cents(),
        "currency": payment.currency.as_str(),
        "gateway": payment.gateway,
    })
}

pub fn fulfillment_created(fulfillment: &Fulfillment) -> serde_json::Value {
    json!({
        "fulfillment_id": fulfillment.id,
        "order_id": fulfillment.order_id,
        "item_count": fulfillment.items.len(),
    })
}

pub fn return_created(ret: &Return) -> serde_json::Value {
    json!({
        "return_id": ret.id,
        "order_id": ret.order_id,
        "return_number": ret.return_number,
        "reason": ret.reason,
    })
}
