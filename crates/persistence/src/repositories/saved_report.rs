//! Saved report repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::saved_report::SavedReport;
use domain::services::entitlements::StoreError;
use domain::services::reports::ReportStore;

use super::entitlement::unavailable;
use crate::entities::SavedReportEntity;
use crate::metrics::QueryTimer;

/// Repository for the saved_reports table.
#[derive(Clone)]
pub struct SavedReportRepository {
    pool: PgPool,
}

impl SavedReportRepository {
    /// Creates a new SavedReportRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a report.
    pub async fn create(&self, report: &SavedReport) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("create_saved_report");
        let result = sqlx::query(
            r#"
            INSERT INTO saved_reports (id, user_id, analysis_type, url, results, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(report.id)
        .bind(&report.user_id)
        .bind(&report.analysis_type)
        .bind(&report.url)
        .bind(&report.results)
        .bind(report.created_at)
        .execute(&self.pool)
        .await;
        timer.finish(&result);
        result.map(|_| ())
    }

    /// List a user's reports older than the cursor, newest first.
    pub async fn list_by_user(
        &self,
        user_id: &str,
        before: Option<(DateTime<Utc>, Uuid)>,
        limit: i64,
    ) -> Result<Vec<SavedReportEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_saved_reports_by_user");
        let (before_ts, before_id) = match before {
            Some((ts, id)) => (Some(ts), Some(id)),
            None => (None, None),
        };
        let result = sqlx::query_as::<_, SavedReportEntity>(
            r#"
            SELECT id, user_id, analysis_type, url, results, created_at
            FROM saved_reports
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(before_ts)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Find a report by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SavedReportEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_saved_report_by_id");
        let result = sqlx::query_as::<_, SavedReportEntity>(
            r#"
            SELECT id, user_id, analysis_type, url, results, created_at
            FROM saved_reports
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }
}

#[async_trait]
impl ReportStore for SavedReportRepository {
    async fn insert(&self, report: &SavedReport) -> Result<(), StoreError> {
        self.create(report).await.map_err(unavailable)
    }

    async fn list(
        &self,
        user_id: &str,
        before: Option<(DateTime<Utc>, Uuid)>,
        limit: usize,
    ) -> Result<Vec<SavedReport>, StoreError> {
        let rows = self
            .list_by_user(user_id, before, limit as i64)
            .await
            .map_err(unavailable)?;
        Ok(rows.into_iter().map(SavedReport::from).collect())
    }

    async fn find(&self, id: Uuid) -> Result<Option<SavedReport>, StoreError> {
        Ok(self
            .find_by_id(id)
            .await
            .map_err(unavailable)?
            .map(SavedReport::from))
    }
}
