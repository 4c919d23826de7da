//! User entitlement entity (database row mapping).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::entitlement::{DailyUsage, SubscriptionPlan, UserEntitlement};
use sqlx::FromRow;

/// Database row mapping for the user_entitlements table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntitlementEntity {
    pub user_id: String,
    pub email: Option<String>,
    pub plan: Option<String>,
    pub is_admin: bool,
    pub trial_started_at: DateTime<Utc>,
    pub daily_usage_date: Option<NaiveDate>,
    pub daily_usage_count: i32,
    pub weekly_usage: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserEntitlementEntity> for UserEntitlement {
    type Error = String;

    fn try_from(entity: UserEntitlementEntity) -> Result<Self, Self::Error> {
        let plan = entity
            .plan
            .as_deref()
            .map(str::parse::<SubscriptionPlan>)
            .transpose()?;
        let weekly_usage: BTreeMap<String, u32> = serde_json::from_value(entity.weekly_usage)
            .map_err(|e| format!("weekly_usage: {}", e))?;
        let daily_usage = entity.daily_usage_date.map(|date| DailyUsage {
            date,
            count: entity.daily_usage_count.max(0) as u32,
        });

        Ok(UserEntitlement {
            user_id: entity.user_id,
            email: entity.email,
            plan,
            is_admin: entity.is_admin,
            trial_started_at: entity.trial_started_at,
            daily_usage,
            weekly_usage,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

impl From<&UserEntitlement> for UserEntitlementEntity {
    fn from(entitlement: &UserEntitlement) -> Self {
        UserEntitlementEntity {
            user_id: entitlement.user_id.clone(),
            email: entitlement.email.clone(),
            plan: entitlement.plan.map(|p| p.as_str().to_string()),
            is_admin: entitlement.is_admin,
            trial_started_at: entitlement.trial_started_at,
            daily_usage_date: entitlement.daily_usage.map(|d| d.date),
            daily_usage_count: entitlement
                .daily_usage
                .map(|d| d.count.min(i32::MAX as u32) as i32)
                .unwrap_or(0),
            weekly_usage: serde_json::to_value(&entitlement.weekly_usage)
                .unwrap_or_else(|_| serde_json::json!({})),
            created_at: entitlement.created_at,
            updated_at: entitlement.updated_at,
        }
    }
}
