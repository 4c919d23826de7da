//! Entitlement repository for database operations.

use async_trait::async_trait;
use sqlx::PgPool;

use domain::models::entitlement::UserEntitlement;
use domain::services::entitlements::{EntitlementStore, StoreError};

use crate::entities::UserEntitlementEntity;
use crate::metrics::QueryTimer;

/// Repository for the user_entitlements table.
#[derive(Clone)]
pub struct EntitlementRepository {
    pool: PgPool,
}

impl EntitlementRepository {
    /// Creates a new EntitlementRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find the entitlement row of a user.
    pub async fn find_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Option<UserEntitlementEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_entitlement_by_user_id");
        let result = sqlx::query_as::<_, UserEntitlementEntity>(
            r#"
            SELECT user_id, email, plan, is_admin, trial_started_at,
                   daily_usage_date, daily_usage_count, weekly_usage, created_at, updated_at
            FROM user_entitlements
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Insert or replace the entitlement row of a user.
    pub async fn upsert(&self, entity: &UserEntitlementEntity) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("upsert_entitlement");
        let result = sqlx::query(
            r#"
            INSERT INTO user_entitlements (
                user_id, email, plan, is_admin, trial_started_at,
                daily_usage_date, daily_usage_count, weekly_usage, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                email = EXCLUDED.email,
                plan = EXCLUDED.plan,
                is_admin = EXCLUDED.is_admin,
                trial_started_at = EXCLUDED.trial_started_at,
                daily_usage_date = EXCLUDED.daily_usage_date,
                daily_usage_count = EXCLUDED.daily_usage_count,
                weekly_usage = EXCLUDED.weekly_usage,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&entity.user_id)
        .bind(&entity.email)
        .bind(&entity.plan)
        .bind(entity.is_admin)
        .bind(entity.trial_started_at)
        .bind(entity.daily_usage_date)
        .bind(entity.daily_usage_count)
        .bind(&entity.weekly_usage)
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .execute(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|_| ())
    }

    /// Cheap connectivity probe.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map(|_| ())
    }
}

pub(crate) fn unavailable(e: sqlx::Error) -> StoreError {
    tracing::error!(error = %e, "Database operation failed");
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl EntitlementStore for EntitlementRepository {
    async fn load(&self, user_id: &str) -> Result<Option<UserEntitlement>, StoreError> {
        match self.find_by_user_id(user_id).await.map_err(unavailable)? {
            Some(entity) => UserEntitlement::try_from(entity)
                .map(Some)
                .map_err(StoreError::Corrupt),
            None => Ok(None),
        }
    }

    async fn save(&self, entitlement: &UserEntitlement) -> Result<(), StoreError> {
        self.upsert(&UserEntitlementEntity::from(entitlement))
            .await
            .map_err(unavailable)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.health_check().await.map_err(unavailable)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
