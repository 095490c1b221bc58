//! Order repository for database operations.
//!
//! Orders and their line items are written in one transaction at checkout
//! and the items are immutable afterwards; the only later writes are the
//! paid and delivered transitions.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use clementine_core::{Email, OrderId, OrderItemId, ProductId, UserId};

use super::RepositoryError;
use crate::models::{Order, OrderItem, PaymentReceipt, ShippingAddress, UserSummary};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    address: String,
    city: String,
    postal_code: String,
    country: String,
    payment_method: String,
    items_price: Decimal,
    shipping_price: Decimal,
    tax_price: Decimal,
    total_price: Decimal,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    payment_id: Option<String>,
    payment_status: Option<String>,
    payment_update_time: Option<String>,
    payer_email: Option<String>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        let receipt = self.payment_id.map(|payment_id| PaymentReceipt {
            payment_id,
            status: self.payment_status.unwrap_or_default(),
            update_time: self.payment_update_time.unwrap_or_default(),
            payer_email: self.payer_email.unwrap_or_default(),
        });

        Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            items,
            shipping_address: ShippingAddress {
                address: self.address,
                city: self.city,
                postal_code: self.postal_code,
                country: self.country,
            },
            payment_method: self.payment_method,
            items_price: self.items_price,
            shipping_price: self.shipping_price,
            tax_price: self.tax_price,
            total_price: self.total_price,
            is_paid: self.is_paid,
            paid_at: self.paid_at,
            receipt,
            is_delivered: self.is_delivered,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
        }
    }
}

/// Internal row type for order item queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    name: String,
    image: String,
    qty: i32,
    price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            product_id: ProductId::new(row.product_id),
            name: row.name,
            image: row.image,
            qty: row.qty,
            price: row.price,
        }
    }
}

/// Internal row type for the owning user expansion on order listings.
#[derive(Debug, sqlx::FromRow)]
struct OrderWithUserRow {
    #[sqlx(flatten)]
    order: OrderRow,
    username: String,
    email: String,
}

impl OrderWithUserRow {
    fn user_summary(&self) -> Result<UserSummary, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        Ok(UserSummary {
            id: UserId::new(self.order.user_id),
            username: self.username.clone(),
            email,
        })
    }
}

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.address, o.city, o.postal_code, o.country, \
     o.payment_method, o.items_price, o.shipping_price, o.tax_price, o.total_price, \
     o.is_paid, o.paid_at, o.payment_id, o.payment_status, o.payment_update_time, \
     o.payer_email, o.is_delivered, o.delivered_at, o.created_at";

/// Same column list without the `o.` alias, for `RETURNING` clauses.
const ORDER_RETURNING: &str = "id, user_id, address, city, postal_code, country, \
     payment_method, items_price, shipping_price, tax_price, total_price, \
     is_paid, paid_at, payment_id, payment_status, payment_update_time, \
     payer_email, is_delivered, delivered_at, created_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, name, image, qty, price";

// =============================================================================
// Write Payloads
// =============================================================================

/// A line item to record at checkout (already repriced server-side).
#[derive(Debug)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub qty: i32,
    pub price: Decimal,
}

/// A new order with server-computed totals.
#[derive(Debug)]
pub struct NewOrder {
    pub items: Vec<NewOrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub total_price: Decimal,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new order and its line items in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        user_id: UserId,
        new: &NewOrder,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO orders \
                (user_id, address, city, postal_code, country, payment_method, \
                 items_price, shipping_price, tax_price, total_price) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ORDER_RETURNING}"
        ))
        .bind(user_id.as_i32())
        .bind(&new.shipping_address.address)
        .bind(&new.shipping_address.city)
        .bind(&new.shipping_address.postal_code)
        .bind(&new.shipping_address.country)
        .bind(&new.payment_method)
        .bind(new.items_price)
        .bind(new.shipping_price)
        .bind(new.tax_price)
        .bind(new.total_price)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write_error(e, "order already exists"))?;

        let mut items = Vec::with_capacity(new.items.len());
        for item in &new.items {
            let item_row: OrderItemRow = sqlx::query_as(&format!(
                "INSERT INTO order_items (order_id, product_id, name, image, qty, price) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING {ITEM_COLUMNS}"
            ))
            .bind(row.id)
            .bind(item.product_id.as_i32())
            .bind(&item.name)
            .bind(&item.image)
            .bind(item.qty)
            .bind(item.price)
            .fetch_one(&mut *tx)
            .await?;
            items.push(item_row.into());
        }

        tx.commit().await?;

        Ok(row.into_order(items))
    }

    /// Get an order by ID with its line items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = self.items_for(&[row.id]).await?.remove(&row.id).unwrap_or_default();
        Ok(Some(row.into_order(items)))
    }

    /// Get an order by ID with its owning user expanded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn get_with_user(
        &self,
        id: OrderId,
    ) -> Result<Option<(Order, UserSummary)>, RepositoryError> {
        let row: Option<OrderWithUserRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS}, u.username, u.email \
             FROM orders o JOIN users u ON u.id = o.user_id \
             WHERE o.id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user = row.user_summary()?;
        let items = self
            .items_for(&[row.order.id])
            .await?
            .remove(&row.order.id)
            .unwrap_or_default();
        Ok(Some((row.order.into_order(items), user)))
    }

    /// All orders owned by a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.user_id = $1 ORDER BY o.id"
        ))
        .bind(user_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        self.assemble(rows).await
    }

    /// Every order with its owning user, oldest first. Unpaginated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn list_all(&self) -> Result<Vec<(Order, UserSummary)>, RepositoryError> {
        let rows: Vec<OrderWithUserRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS}, u.username, u.email \
             FROM orders o JOIN users u ON u.id = o.user_id \
             ORDER BY o.id"
        ))
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.order.id).collect();
        let mut items = self.items_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let user = row.user_summary()?;
                let order_items = items.remove(&row.order.id).unwrap_or_default();
                Ok((row.order.into_order(order_items), user))
            })
            .collect()
    }

    /// Record the payment receipt, transitioning the order to paid.
    ///
    /// The `is_paid = FALSE` guard makes the write a compare-and-set: under
    /// concurrent confirmations only one wins, and the caller decides from
    /// the stored receipt whether a lost write was a duplicate notification.
    ///
    /// # Returns
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// order was already paid (or does not exist).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_paid_if_unpaid(
        &self,
        id: OrderId,
        receipt: &PaymentReceipt,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET \
                is_paid = TRUE, paid_at = now(), \
                payment_id = $2, payment_status = $3, \
                payment_update_time = $4, payer_email = $5 \
             WHERE id = $1 AND is_paid = FALSE",
        )
        .bind(id.as_i32())
        .bind(&receipt.payment_id)
        .bind(&receipt.status)
        .bind(&receipt.update_time)
        .bind(&receipt.payer_email)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transition an order to delivered.
    ///
    /// Returns `None` if the order does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_delivered(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET is_delivered = TRUE, delivered_at = now() WHERE id = $1",
        )
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Total number of orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_all(&self) -> Result<i64, RepositoryError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(self.pool)
            .await?;

        Ok(count.0)
    }

    /// Revenue summed over paid orders only.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn total_sales(&self) -> Result<Decimal, RepositoryError> {
        let total: (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_price), 0) FROM orders WHERE is_paid",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(total.0)
    }

    /// Paid revenue grouped by calendar date of payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales_by_date(&self) -> Result<Vec<(NaiveDate, Decimal)>, RepositoryError> {
        let rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(
            "SELECT paid_at::date AS date, SUM(total_price) AS total \
             FROM orders WHERE is_paid AND paid_at IS NOT NULL \
             GROUP BY paid_at::date ORDER BY date",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    /// Fetch line items for a batch of orders, grouped by order id.
    async fn items_for(
        &self,
        order_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<OrderItem>>, RepositoryError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(order_ids)
        .fetch_all(self.pool)
        .await?;

        let mut grouped: HashMap<i32, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    async fn assemble(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut items = self.items_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect())
    }
}
