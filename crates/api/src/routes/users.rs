//! Subscription, usage and admin endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use domain::models::entitlement::SubscriptionPlan;
use domain::services::{Remaining, SubscriptionStatus};
use shared::crypto::secrets_match;

use crate::app::AppState;
use crate::error::ApiError;

/// Body shared by the per-user endpoints.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserRequest {
    #[validate(custom(function = "shared::validation::validate_user_id"))]
    pub user_id: String,

    #[serde(default)]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(custom(function = "shared::validation::validate_user_id"))]
    pub user_id: String,

    pub plan: String,

    #[serde(default)]
    #[validate(url(message = "Invalid return URL"))]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminRequest {
    #[validate(custom(function = "shared::validation::validate_user_id"))]
    pub user_id: String,

    pub admin_key: String,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub remaining_analyses: Remaining,
}

/// Result of tracking one analysis.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TrackResponse {
    Unlimited { unlimited: bool },
    Remaining { remaining_analyses: u32 },
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AdminStatus {
    pub is_admin: bool,
}

/// Subscription overview. Starts the trial on first sight of a user.
///
/// POST /user-subscription
pub async fn user_subscription(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> Result<Json<SubscriptionStatus>, ApiError> {
    request.validate()?;
    let status = state
        .entitlements
        .subscription_status(&request.user_id, request.email.as_deref())
        .await?;
    Ok(Json(status))
}

/// Remaining allowance without consuming anything.
///
/// POST /check-usage
pub async fn check_usage(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> Result<Json<UsageResponse>, ApiError> {
    request.validate()?;
    let decision = state.entitlements.check(&request.user_id).await?;
    Ok(Json(UsageResponse {
        remaining_analyses: decision.remaining,
    }))
}

/// Consume one unit of quota.
///
/// POST /track-analysis
pub async fn track_analysis(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> Result<Json<TrackResponse>, ApiError> {
    request.validate()?;
    let receipt = state.entitlements.consume(&request.user_id).await?;
    let response = match receipt.remaining {
        Remaining::Unbounded => TrackResponse::Unlimited { unlimited: true },
        Remaining::Limited(n) => TrackResponse::Remaining {
            remaining_analyses: n,
        },
    };
    Ok(Json(response))
}

/// Start a checkout for a paid plan.
///
/// POST /create-checkout-session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    request.validate()?;
    let plan: SubscriptionPlan = request.plan.parse().map_err(ApiError::Validation)?;

    let checkout_url = match request.return_url {
        Some(url) => url,
        None => format!(
            "{}/payment-success?plan={}",
            state.config.billing.app_base_url.trim_end_matches('/'),
            plan
        ),
    };

    if state.config.billing.simulate_payments {
        state.entitlements.set_plan(&request.user_id, plan).await?;
        warn!(
            user_id = %request.user_id,
            plan = %plan,
            "Payment simulated, plan confirmed without webhook"
        );
    } else {
        info!(user_id = %request.user_id, plan = %plan, "Checkout started");
    }

    Ok(Json(CheckoutResponse { checkout_url }))
}

/// Grant admin override.
///
/// POST /set-admin
pub async fn set_admin(
    State(state): State<AppState>,
    Json(request): Json<AdminRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    request.validate()?;

    let expected = &state.config.admin.admin_key;
    if expected.is_empty() {
        return Err(ApiError::ServiceUnavailable(
            "Admin management is disabled".to_string(),
        ));
    }
    if !secrets_match(expected, &request.admin_key) {
        warn!(user_id = %request.user_id, "Rejected admin grant with invalid key");
        return Err(ApiError::Forbidden("Invalid admin key".to_string()));
    }

    state.entitlements.grant_admin(&request.user_id).await?;
    info!(user_id = %request.user_id, "Admin override granted");

    Ok(Json(StatusMessage {
        status: "success",
        message: format!("User {} is now an admin", request.user_id),
    }))
}

/// POST /check-admin
pub async fn check_admin(
    State(state): State<AppState>,
    Json(request): Json<UserRequest>,
) -> Result<Json<AdminStatus>, ApiError> {
    request.validate()?;
    let is_admin = state.entitlements.is_admin(&request.user_id).await?;
    Ok(Json(AdminStatus { is_admin }))
}
