//! Route handlers and router assembly.
//!
//! Each resource gets its own module; the full JSON API is mounted under
//! `/api`. Path ids are parsed from their string form so a malformed id is
//! answered the same way as an absent record (404), never a parser error.

pub mod categories;
pub mod config;
pub mod orders;
pub mod payments;
pub mod products;
pub mod uploads;
pub mod users;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Assemble the full API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/products", products::routes())
        .nest("/api/category", categories::routes())
        .nest("/api/users", users::routes())
        .nest("/api/orders", orders::routes())
        .nest("/api/payments", payments::routes())
        .route("/api/config/paypal", get(config::paypal_client_id))
}
