//! Payment provider webhook.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use domain::models::entitlement::SubscriptionPlan;
use shared::crypto::verify_signature;

use crate::app::AppState;
use crate::error::ApiError;

/// Header carrying `sha256=<hex HMAC of the raw body>`.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Event confirming a completed checkout.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub object: WebhookObject,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookObject {
    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutMetadata {
    pub user_id: Option<String>,
    pub selected_plan: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

/// Receive a payment event.
///
/// POST /webhook
///
/// A completed checkout sets the local tier first, then pushes the plan to
/// the identity provider. A failed push is reported as 502; the local tier
/// keeps the new plan.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let secret = &state.config.billing.webhook_secret;
    if secret.is_empty() {
        return Err(ApiError::ServiceUnavailable(
            "Payment webhooks are not configured".to_string(),
        ));
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing webhook signature".to_string()))?;
    verify_signature(&body, signature, secret)
        .map_err(|e| {
            ApiError::Unauthorized(format!("Webhook signature verification failed: {}", e))
        })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Invalid webhook payload: {}", e)))?;

    if event.event_type != CHECKOUT_COMPLETED {
        info!(event_type = %event.event_type, "Webhook event acknowledged");
        return Ok(Json(WebhookAck { status: "success" }));
    }

    let metadata = event.data.object.metadata;
    let (Some(user_id), Some(selected_plan)) = (metadata.user_id, metadata.selected_plan) else {
        info!("Checkout event without user or plan metadata acknowledged");
        return Ok(Json(WebhookAck { status: "success" }));
    };

    shared::validation::validate_user_id(&user_id)
        .map_err(|_| ApiError::Validation("Invalid user id in metadata".to_string()))?;
    let plan: SubscriptionPlan = selected_plan.parse().map_err(ApiError::Validation)?;

    let entitlement = state.entitlements.set_plan(&user_id, plan).await?;
    let plan = entitlement.plan.unwrap_or(plan);
    info!(user_id = %user_id, plan = %plan, "Plan confirmed by payment provider");

    if let Err(e) = state.plan_sync.push_plan(&user_id, plan).await {
        error!(
            user_id = %user_id,
            plan = %plan,
            error = %e,
            "Failed to push plan to identity provider"
        );
        return Err(ApiError::Upstream(format!(
            "Plan saved but identity provider update failed: {}",
            e
        )));
    }

    Ok(Json(WebhookAck { status: "success" }))
}
