//! Bearer identity extractor.
//!
//! Verifies the identity-provider token in the Authorization header and
//! exposes the caller's subject, plan claim and roles.

use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use shared::jwt::Identity;

use crate::app::AppState;
use crate::error::ApiError;

/// Role granting unrestricted report access.
pub const ADMIN_ROLE: &str = "admin";

/// Plan claims that allow saving reports.
pub const PAID_PLAN_CLAIMS: [&str; 3] = ["basic", "plus", "pro"];

/// Authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl AuthenticatedUser {
    pub fn user_id(&self) -> &str {
        &self.0.subject
    }

    pub fn is_admin(&self) -> bool {
        self.0.has_role(ADMIN_ROLE)
    }

    /// Whether the token itself proves a paid plan.
    pub fn has_paid_plan_claim(&self) -> bool {
        self.0
            .plan
            .as_deref()
            .map(|p| PAID_PLAN_CLAIMS.contains(&p.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let verifier = state.token_verifier.as_ref().ok_or_else(|| {
            tracing::warn!("Bearer token received but no verification key is configured");
            ApiError::Unauthorized("Token verification is not configured".to_string())
        })?;

        let identity = verifier.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Token rejected");
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })?;

        Ok(AuthenticatedUser(identity))
    }
}
