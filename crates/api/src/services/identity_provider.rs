//! Identity provider plan sync.
//!
//! After a payment is confirmed the plan is written to the user's
//! `app_metadata` so newly issued tokens carry the `plan` claim.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use domain::models::entitlement::SubscriptionPlan;

use crate::config::IdentityProviderConfig;

#[derive(Debug, Error)]
pub enum PlanSyncError {
    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity provider error: {0}")]
    ServiceError(String),
}

/// Pushes confirmed plans to the identity provider.
#[async_trait]
pub trait PlanSync: Send + Sync {
    async fn push_plan(&self, user_id: &str, plan: SubscriptionPlan) -> Result<(), PlanSyncError>;
}

/// Management API client.
#[derive(Debug, Clone)]
pub struct ManagementApiClient {
    client: Client,
    domain: String,
    api_token: String,
    timeout_secs: u64,
}

impl ManagementApiClient {
    pub fn new(config: &IdentityProviderConfig) -> Result<Self, PlanSyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            domain: config.domain.trim().trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.domain.is_empty() && !self.api_token.is_empty()
    }

    fn user_url(&self, user_id: &str) -> String {
        let base = if self.domain.starts_with("http://") || self.domain.starts_with("https://") {
            self.domain.clone()
        } else {
            format!("https://{}", self.domain)
        };
        let mut url = format!("{}/api/v2/users/", base);
        url.extend(url::form_urlencoded::byte_serialize(user_id.as_bytes()));
        url
    }
}

#[async_trait]
impl PlanSync for ManagementApiClient {
    async fn push_plan(&self, user_id: &str, plan: SubscriptionPlan) -> Result<(), PlanSyncError> {
        if !self.is_configured() {
            warn!(
                user_id = %user_id,
                plan = %plan,
                "Identity provider not configured, plan not pushed"
            );
            return Ok(());
        }

        let response = self
            .client
            .patch(self.user_url(user_id))
            .bearer_auth(&self.api_token)
            .json(&json!({ "app_metadata": { "plan": plan.as_str() } }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PlanSyncError::Timeout(self.timeout_secs)
                } else {
                    PlanSyncError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlanSyncError::ServiceError(format!("HTTP {}: {}", status, body)));
        }

        info!(user_id = %user_id, plan = %plan, "Plan pushed to identity provider");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(domain: &str, token: &str) -> ManagementApiClient {
        ManagementApiClient::new(&IdentityProviderConfig {
            domain: domain.to_string(),
            api_token: token.to_string(),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_user_url_encodes_id() {
        let c = client("tenant.eu.auth0.com", "t");
        assert_eq!(
            c.user_url("auth0|abc 1"),
            "https://tenant.eu.auth0.com/api/v2/users/auth0%7Cabc+1"
        );
    }

    #[test]
    fn test_user_url_keeps_explicit_scheme() {
        let c = client("http://127.0.0.1:8081/", "t");
        assert_eq!(c.user_url("u1"), "http://127.0.0.1:8081/api/v2/users/u1");
    }

    #[tokio::test]
    async fn test_unconfigured_push_is_skipped() {
        let c = client("", "");
        assert!(!c.is_configured());
        assert!(c.push_plan("u1", SubscriptionPlan::Pro).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_provider_fails() {
        let c = client("http://127.0.0.1:9", "token");
        assert!(c.push_plan("u1", SubscriptionPlan::Basic).await.is_err());
    }
}
