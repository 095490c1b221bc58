//! Payment webhook route handlers.
//!
//! Server-to-server payment confirmation. The processor signs the raw
//! request body with HMAC-SHA256 over a shared secret; the hex signature
//! arrives in `X-Webhook-Signature`. Verified notifications feed the same
//! idempotent paid transition as the client-side confirmation route.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;

use clementine_core::OrderId;

use crate::error::{AppError, Result};
use crate::routes::orders::PaymentDetailsRequest;
use crate::services::OrderService;
use crate::services::orders::PaymentOutcome;
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 signature of the raw body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

type HmacSha256 = Hmac<Sha256>;

/// Payment routes, mounted under `/api/payments`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook", post(payment_webhook))
}

/// Webhook notification payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub order_id: Option<OrderId>,
    pub capture: Option<PaymentDetailsRequest>,
}

/// Verify the webhook signature over the raw body.
fn verify_signature(secret: &str, body: &[u8], provided: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    let computed = hex::encode(mac.finalize().into_bytes());

    computed == provided.to_lowercase()
}

/// POST /api/payments/webhook - Processor-signed payment confirmation.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let Some(secret) = state.config().paypal.webhook_secret.as_ref() else {
        return Err(AppError::Unauthorized(
            "Payment webhook is not configured".to_owned(),
        ));
    };

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing webhook signature".to_owned()))?;

    if !verify_signature(secrecy::ExposeSecret::expose_secret(secret), &body, provided) {
        tracing::warn!("rejected payment webhook with invalid signature");
        return Err(AppError::Unauthorized(
            "Invalid webhook signature".to_owned(),
        ));
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {e}")))?;

    let order_id = payload
        .order_id
        .ok_or_else(|| AppError::Validation("Missing orderId".to_owned()))?;
    let receipt = payload
        .capture
        .ok_or_else(|| AppError::Validation("Missing capture".to_owned()))?
        .into_receipt()?;

    let outcome = OrderService::new(state.pool())
        .record_payment(order_id, receipt)
        .await?;

    let message = match outcome {
        PaymentOutcome::Recorded(_) => "Payment recorded",
        PaymentOutcome::AlreadyRecorded(_) => "Payment already recorded",
    };

    Ok(Json(json!({ "message": message, "orderId": order_id })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "webhook-shared-key";

    fn sign(body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"orderId": 1}"#;
        let signature = sign(body);

        assert!(verify_signature(SECRET, body, &signature));
    }

    #[test]
    fn signature_is_case_insensitive_hex() {
        let body = br#"{"orderId": 1}"#;
        let signature = sign(body).to_uppercase();

        assert!(verify_signature(SECRET, body, &signature));
    }

    #[test]
    fn rejects_tampered_body() {
        let signature = sign(br#"{"orderId": 1}"#);

        assert!(!verify_signature(SECRET, br#"{"orderId": 2}"#, &signature));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = br#"{"orderId": 1}"#;
        let signature = sign(body);

        assert!(!verify_signature("a-different-key", body, &signature));
    }
}
