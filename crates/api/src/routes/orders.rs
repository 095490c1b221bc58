//! Order route handlers.
//!
//! Checkout, the owner/admin order views, the paid and delivered
//! transitions, and the admin dashboard aggregates.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use clementine_core::{OrderId, ProductId, UserId, parse_id};

use crate::error::{AppError, Result};
use crate::middleware::{CurrentAdmin, CurrentUser};
use crate::models::{Order, PaymentReceipt, ShippingAddress, User, UserSummary};
use crate::services::OrderService;
use crate::services::orders::{CreateOrder, OrderLine, OrderTotals, PaymentOutcome};
use crate::state::AppState;

/// Order routes, mounted under `/api/orders`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_all_orders))
        .route("/mine", get(my_orders))
        .route("/total-orders", get(total_orders))
        .route("/total-sales", get(total_sales))
        .route("/total-sales-by-date", get(total_sales_by_date))
        .route("/{id}", get(get_order))
        .route("/{id}/pay", put(pay_order))
        .route("/{id}/deliver", put(deliver_order))
}

// =============================================================================
// Wire Types
// =============================================================================

/// A requested line item: product reference plus quantity.
#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product: Option<ProductId>,
    pub qty: Option<i32>,
}

/// Shipping destination request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressRequest {
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Checkout request body. The client's totals are verified against the
/// server's own pricing, never trusted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub order_items: Vec<OrderItemRequest>,
    pub shipping_address: Option<ShippingAddressRequest>,
    pub payment_method: Option<String>,
    pub items_price: Option<Decimal>,
    pub shipping_price: Option<Decimal>,
    pub tax_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
}

/// Payment capture details as reported by the processor.
#[derive(Debug, Deserialize)]
pub struct PaymentDetailsRequest {
    pub id: Option<String>,
    pub status: Option<String>,
    pub update_time: Option<String>,
    pub payer: Option<PayerRequest>,
}

/// The payer block of a capture payload.
#[derive(Debug, Deserialize)]
pub struct PayerRequest {
    pub email_address: Option<String>,
}

impl PaymentDetailsRequest {
    /// Convert into a stored receipt. The transaction id is mandatory; it is
    /// the idempotency key of the paid transition.
    pub fn into_receipt(self) -> Result<PaymentReceipt> {
        let payment_id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Missing payment transaction id".to_owned()))?;

        Ok(PaymentReceipt {
            payment_id,
            status: self.status.unwrap_or_default(),
            update_time: self.update_time.unwrap_or_default(),
            payer_email: self
                .payer
                .and_then(|p| p.email_address)
                .unwrap_or_default(),
        })
    }
}

/// Order line item response body.
#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub product: ProductId,
    pub name: String,
    pub image: String,
    pub qty: i32,
    pub price: Decimal,
}

/// Shipping destination response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressResponse {
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Stored payment receipt response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResultResponse {
    pub id: String,
    pub status: String,
    pub update_time: String,
    pub payer_email: String,
}

/// The owning user, expanded on admin views and the detail view.
#[derive(Debug, Serialize)]
pub struct OrderUserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

impl From<UserSummary> for OrderUserResponse {
    fn from(user: UserSummary) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email.to_string(),
        }
    }
}

/// Order response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<OrderUserResponse>,
    pub order_items: Vec<OrderItemResponse>,
    pub shipping_address: ShippingAddressResponse,
    pub payment_method: String,
    pub items_price: Decimal,
    pub shipping_price: Decimal,
    pub tax_price: Decimal,
    pub total_price: Decimal,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_result: Option<PaymentResultResponse>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OrderResponse {
    fn new(order: Order, user: Option<UserSummary>) -> Self {
        Self {
            id: order.id,
            user: user.map(Into::into),
            order_items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product: item.product_id,
                    name: item.name,
                    image: item.image,
                    qty: item.qty,
                    price: item.price,
                })
                .collect(),
            shipping_address: ShippingAddressResponse {
                address: order.shipping_address.address,
                city: order.shipping_address.city,
                postal_code: order.shipping_address.postal_code,
                country: order.shipping_address.country,
            },
            payment_method: order.payment_method,
            items_price: order.items_price,
            shipping_price: order.shipping_price,
            tax_price: order.tax_price,
            total_price: order.total_price,
            is_paid: order.is_paid,
            paid_at: order.paid_at,
            payment_result: order.receipt.map(|r| PaymentResultResponse {
                id: r.payment_id,
                status: r.status,
                update_time: r.update_time,
                payer_email: r.payer_email,
            }),
            is_delivered: order.is_delivered,
            delivered_at: order.delivered_at,
            created_at: order.created_at,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self::new(order, None)
    }
}

/// Daily sales response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySalesResponse {
    pub date: NaiveDate,
    pub total_sales: Decimal,
}

fn order_id(raw: &str) -> Result<OrderId> {
    parse_id(raw).ok_or_else(|| AppError::NotFound("Order not found".to_owned()))
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| {
        AppError::Validation(format!(
            "Please fill all required fields: '{field}' is missing"
        ))
    })
}

/// Owner-or-admin visibility gate.
fn authorize_order_access(order: &Order, user: &User) -> Result<()> {
    if order.user_id == user.id || user.role.can_manage_store() {
        return Ok(());
    }
    Err(AppError::Unauthorized(
        "Not authorized to view this order".to_owned(),
    ))
}

// =============================================================================
// Checkout & Views
// =============================================================================

/// POST /api/orders - Create an order from the caller's cart.
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    let shipping = required(body.shipping_address, "shippingAddress")?;
    let payment_method = required(body.payment_method, "paymentMethod")?;

    let lines = body
        .order_items
        .into_iter()
        .map(|item| {
            Ok(OrderLine {
                product_id: required(item.product, "product")?,
                qty: required(item.qty, "qty")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let input = CreateOrder {
        lines,
        shipping_address: ShippingAddress {
            address: required(shipping.address, "address")?,
            city: required(shipping.city, "city")?,
            postal_code: required(shipping.postal_code, "postalCode")?,
            country: required(shipping.country, "country")?,
        },
        payment_method,
        client_totals: OrderTotals {
            items_price: required(body.items_price, "itemsPrice")?,
            shipping_price: required(body.shipping_price, "shippingPrice")?,
            tax_price: required(body.tax_price, "taxPrice")?,
            total_price: required(body.total_price, "totalPrice")?,
        },
    };

    let order = OrderService::new(state.pool())
        .create_order(user.id, input)
        .await?;

    tracing::info!(order_id = %order.id, user_id = %user.id, "order created");

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/orders/:id - One order, visible to its owner or an admin.
pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>> {
    let id = order_id(&id)?;

    let (order, owner) = OrderService::new(state.pool()).get_order(id).await?;
    authorize_order_access(&order, &user)?;

    Ok(Json(OrderResponse::new(order, Some(owner))))
}

/// GET /api/orders/mine - The caller's own orders.
pub async fn my_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<OrderResponse>>> {
    let orders = OrderService::new(state.pool())
        .orders_for_user(user.id)
        .await?;

    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /api/orders - Every order with its owner (admin).
pub async fn list_all_orders(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<Vec<OrderResponse>>> {
    let orders = OrderService::new(state.pool()).all_orders().await?;

    Ok(Json(
        orders
            .into_iter()
            .map(|(order, user)| OrderResponse::new(order, Some(user)))
            .collect(),
    ))
}

// =============================================================================
// Transitions
// =============================================================================

/// PUT /api/orders/:id/pay - Record the processor's capture confirmation.
///
/// Idempotent on the processor transaction id: repeating the confirmation
/// for the same transaction returns the stored order unchanged; a different
/// transaction id on a paid order is a conflict.
pub async fn pay_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<PaymentDetailsRequest>,
) -> Result<Json<OrderResponse>> {
    let id = order_id(&id)?;
    let receipt = body.into_receipt()?;

    let service = OrderService::new(state.pool());
    let (order, _) = service.get_order(id).await?;
    authorize_order_access(&order, &user)?;

    let outcome = service.record_payment(id, receipt).await?;
    if let PaymentOutcome::AlreadyRecorded(_) = &outcome {
        tracing::info!(order_id = %id, "duplicate payment notification ignored");
    }

    Ok(Json(outcome.into_order().into()))
}

/// PUT /api/orders/:id/deliver - Mark an order delivered (admin).
pub async fn deliver_order(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>> {
    let id = order_id(&id)?;

    let order = OrderService::new(state.pool()).deliver_order(id).await?;

    Ok(Json(order.into()))
}

// =============================================================================
// Dashboard Aggregates
// =============================================================================

/// GET /api/orders/total-orders - Total order count (admin).
pub async fn total_orders(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<Value>> {
    let total = OrderService::new(state.pool()).total_orders().await?;

    Ok(Json(json!({ "totalOrders": total })))
}

/// GET /api/orders/total-sales - Revenue over paid orders (admin).
pub async fn total_sales(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<Value>> {
    let total = OrderService::new(state.pool()).total_sales().await?;

    Ok(Json(json!({ "totalSales": total })))
}

/// GET /api/orders/total-sales-by-date - Paid revenue per day (admin).
pub async fn total_sales_by_date(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
) -> Result<Json<Vec<DailySalesResponse>>> {
    let rows = OrderService::new(state.pool()).sales_by_date().await?;

    Ok(Json(
        rows.into_iter()
            .map(|(date, total_sales)| DailySalesResponse { date, total_sales })
            .collect(),
    ))
}
