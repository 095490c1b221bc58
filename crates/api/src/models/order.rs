//! Order models.
//!
//! An order is a point-in-time snapshot of a purchase: line items copy the
//! product's name, image, and unit price at order time rather than
//! referencing the live catalog entry, so historical pricing survives later
//! catalog edits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use clementine_core::{Email, OrderId, OrderItemId, ProductId, UserId};

/// A purchased line item (snapshot copy, not a live reference).
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub qty: i32,
    pub price: Decimal,
}

/// Free-text shipping destination.
#[derive(Debug, Clone)]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// The payment processor's capture confirmation, stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// The processor's unique transaction identifier; mark-paid is
    /// idempotent on this value.
    pub payment_id: String,
    pub status: String,
    pub update_time: String,
    pub payer_email: String,
}

/// An order.
///
/// Normal lifecycle: created unpaid, marked paid exactly once by the payment
/// confirmation, marked delivered by admin action. Never deleted.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub total_price: Decimal,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub receipt: Option<PaymentReceipt>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The slice of a user exposed on admin order listings.
#[derive(Debug, Clone)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub email: Email,
}
