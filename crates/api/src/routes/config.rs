//! Public client configuration.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /api/config/paypal - The public payment processor client identifier.
///
/// This value is safe to expose; the browser SDK needs it to render the
/// checkout buttons.
pub async fn paypal_client_id(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "clientId": state.config().paypal.client_id }))
}
