//! Order/payment workflow service.
//!
//! States: created → paid → delivered. Totals are recomputed server-side
//! from current catalog prices at checkout; the client's figures are only
//! accepted when they agree with the server's within a one-cent tolerance.
//! The paid transition is idempotent on the processor's transaction id.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use clementine_core::{OrderId, ProductId, UserId};

use crate::db::orders::{NewOrder, NewOrderItem};
use crate::db::{OrderRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::models::{Order, PaymentReceipt, ShippingAddress, UserSummary};

/// Flat shipping charge below the free-shipping threshold.
fn flat_shipping() -> Decimal {
    Decimal::new(10, 0)
}

/// Items subtotal above which shipping is free.
fn free_shipping_threshold() -> Decimal {
    Decimal::new(100, 0)
}

/// Tax rate applied to the items subtotal.
fn tax_rate() -> Decimal {
    Decimal::new(15, 2)
}

/// Largest accepted difference between a client figure and the server's.
fn total_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Server-computed order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub total_price: Decimal,
}

/// Compute order totals from (unit price, quantity) pairs.
///
/// Shipping is a flat charge waived once the items subtotal exceeds the
/// threshold; tax is a fixed rate on the items subtotal, rounded to cents.
#[must_use]
pub fn compute_totals(lines: &[(Decimal, i32)]) -> OrderTotals {
    let items_price: Decimal = lines
        .iter()
        .map(|(price, qty)| price * Decimal::from(*qty))
        .sum();

    let shipping_price = if items_price > free_shipping_threshold() {
        Decimal::ZERO
    } else {
        flat_shipping()
    };
    let tax_price = (items_price * tax_rate()).round_dp(2);
    let total_price = items_price + shipping_price + tax_price;

    OrderTotals {
        items_price,
        shipping_price,
        tax_price,
        total_price,
    }
}

/// Whether each client figure agrees with the server's within tolerance.
#[must_use]
pub fn totals_agree(server: &OrderTotals, client: &OrderTotals) -> bool {
    let within = |a: Decimal, b: Decimal| (a - b).abs() <= total_tolerance();

    within(server.items_price, client.items_price)
        && within(server.shipping_price, client.shipping_price)
        && within(server.tax_price, client.tax_price)
        && within(server.total_price, client.total_price)
}

/// A line item as requested by the client: a product reference and quantity.
#[derive(Debug)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub qty: i32,
}

/// Validated input for order creation.
#[derive(Debug)]
pub struct CreateOrder {
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    /// Totals as computed by the client, checked against the server's.
    pub client_totals: OrderTotals,
}

/// Outcome of a payment confirmation.
#[derive(Debug)]
pub enum PaymentOutcome {
    /// This confirmation performed the paid transition.
    Recorded(Order),
    /// The order was already paid by the same processor transaction; the
    /// repeat notification was ignored.
    AlreadyRecorded(Order),
}

impl PaymentOutcome {
    /// The order in its current state, regardless of outcome.
    #[must_use]
    pub fn into_order(self) -> Order {
        match self {
            Self::Recorded(order) | Self::AlreadyRecorded(order) => order,
        }
    }
}

/// Order workflow service.
pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Create an order from the caller's cart.
    ///
    /// Line items are snapshotted from the current catalog (name, image, and
    /// unit price at order time) and every total is recomputed server-side.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` on an empty cart, a non-positive
    /// quantity, or client totals that disagree with the server's.
    /// Returns `AppError::NotFound` if a referenced product doesn't exist.
    pub async fn create_order(&self, user_id: UserId, input: CreateOrder) -> Result<Order> {
        if input.lines.is_empty() {
            return Err(AppError::Validation("No order items".to_owned()));
        }

        let mut items = Vec::with_capacity(input.lines.len());
        let mut priced_lines = Vec::with_capacity(input.lines.len());

        for line in &input.lines {
            if line.qty <= 0 {
                return Err(AppError::Validation(
                    "Item quantity must be positive".to_owned(),
                ));
            }

            let product = self
                .products
                .get_by_id(line.product_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Product not found: {}", line.product_id))
                })?;

            priced_lines.push((product.price, line.qty));
            items.push(NewOrderItem {
                product_id: product.id,
                name: product.name,
                image: product.image,
                qty: line.qty,
                price: product.price,
            });
        }

        let totals = compute_totals(&priced_lines);
        if !totals_agree(&totals, &input.client_totals) {
            return Err(AppError::Validation(
                "Order totals do not match current catalog pricing".to_owned(),
            ));
        }

        let new = NewOrder {
            items,
            shipping_address: input.shipping_address,
            payment_method: input.payment_method,
            items_price: totals.items_price,
            shipping_price: totals.shipping_price,
            tax_price: totals.tax_price,
            total_price: totals.total_price,
        };

        Ok(self.orders.create(user_id, &new).await?)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get an order with its owning user expanded.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order doesn't exist.
    pub async fn get_order(&self, id: OrderId) -> Result<(Order, UserSummary)> {
        self.orders
            .get_with_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))
    }

    /// All orders owned by a user.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    /// Every order with its owning user. Unpaginated.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn all_orders(&self) -> Result<Vec<(Order, UserSummary)>> {
        Ok(self.orders.list_all().await?)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Record a payment capture, transitioning the order to paid.
    ///
    /// Idempotent on the processor transaction id: a repeat notification for
    /// the transaction that already paid this order is ignored, while a
    /// different transaction id on a paid order is rejected.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order doesn't exist.
    /// Returns `AppError::Conflict` if the order is paid under a different
    /// transaction id.
    pub async fn record_payment(
        &self,
        id: OrderId,
        receipt: PaymentReceipt,
    ) -> Result<PaymentOutcome> {
        let order = self
            .orders
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

        if !order.is_paid && self.orders.mark_paid_if_unpaid(id, &receipt).await? {
            let paid = self
                .orders
                .get_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;
            return Ok(PaymentOutcome::Recorded(paid));
        }

        // Already paid, either before this call or by a concurrent
        // confirmation that won the compare-and-set.
        let paid = self
            .orders
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

        match &paid.receipt {
            Some(stored) if stored.payment_id == receipt.payment_id => {
                Ok(PaymentOutcome::AlreadyRecorded(paid))
            }
            _ => Err(AppError::Conflict(
                "Order already paid with a different transaction".to_owned(),
            )),
        }
    }

    /// Transition an order to delivered. No paid precondition is imposed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the order doesn't exist.
    pub async fn deliver_order(&self, id: OrderId) -> Result<Order> {
        self.orders
            .mark_delivered(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))
    }

    // =========================================================================
    // Dashboard Aggregates
    // =========================================================================

    /// Total number of orders.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn total_orders(&self) -> Result<i64> {
        Ok(self.orders.count_all().await?)
    }

    /// Revenue over paid orders.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn total_sales(&self) -> Result<Decimal> {
        Ok(self.orders.total_sales().await?)
    }

    /// Paid revenue per calendar date.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn sales_by_date(&self) -> Result<Vec<(NaiveDate, Decimal)>> {
        Ok(self.orders.sales_by_date().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn totals_charge_flat_shipping_below_threshold() {
        let totals = compute_totals(&[(dec("9.99"), 2)]);

        assert_eq!(totals.items_price, dec("19.98"));
        assert_eq!(totals.shipping_price, dec("10"));
        assert_eq!(totals.tax_price, dec("3.00"));
        assert_eq!(totals.total_price, dec("32.98"));
    }

    #[test]
    fn totals_waive_shipping_above_threshold() {
        let totals = compute_totals(&[(dec("60"), 2)]);

        assert_eq!(totals.items_price, dec("120"));
        assert_eq!(totals.shipping_price, Decimal::ZERO);
        assert_eq!(totals.tax_price, dec("18.00"));
        assert_eq!(totals.total_price, dec("138.00"));
    }

    #[test]
    fn exact_threshold_still_pays_shipping() {
        let totals = compute_totals(&[(dec("100"), 1)]);
        assert_eq!(totals.shipping_price, dec("10"));
    }

    #[test]
    fn tax_rounds_to_cents() {
        // 15% of 10.33 = 1.5495 → 1.55 (banker's rounding lands on 1.55 here)
        let totals = compute_totals(&[(dec("10.33"), 1)]);
        assert_eq!(totals.tax_price, dec("1.55"));
    }

    #[test]
    fn totals_agree_within_one_cent() {
        let server = compute_totals(&[(dec("9.99"), 2)]);
        let mut client = server;

        assert!(totals_agree(&server, &client));

        client.total_price += dec("0.01");
        assert!(totals_agree(&server, &client));

        client.total_price += dec("0.01");
        assert!(!totals_agree(&server, &client));
    }

    #[test]
    fn totals_disagree_on_any_component() {
        let server = compute_totals(&[(dec("9.99"), 2)]);

        let mut client = server;
        client.items_price = dec("0.01");
        assert!(!totals_agree(&server, &client));

        let mut client = server;
        client.shipping_price = Decimal::ZERO;
        assert!(!totals_agree(&server, &client));
    }
}
