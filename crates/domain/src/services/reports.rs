//! Saved report service.
//!
//! Paying users can keep analysis results. Listing is newest first with an
//! opaque keyset cursor over `(created_at, id)`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::pagination::{clamp_limit, decode_cursor, encode_cursor};

use super::entitlements::StoreError;
use crate::models::saved_report::{ListReportsQuery, ReportPage, SaveReportRequest, SavedReport};

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert(&self, report: &SavedReport) -> Result<(), StoreError>;

    /// Reports of `user_id` strictly older than `before`, newest first.
    async fn list(
        &self,
        user_id: &str,
        before: Option<(DateTime<Utc>, Uuid)>,
        limit: usize,
    ) -> Result<Vec<SavedReport>, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<SavedReport>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<Uuid, SavedReport>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn insert(&self, report: &SavedReport) -> Result<(), StoreError> {
        self.reports.write().await.insert(report.id, report.clone());
        Ok(())
    }

    async fn list(
        &self,
        user_id: &str,
        before: Option<(DateTime<Utc>, Uuid)>,
        limit: usize,
    ) -> Result<Vec<SavedReport>, StoreError> {
        let reports = self.reports.read().await;
        let mut owned: Vec<SavedReport> = reports
            .values()
            .filter(|r| r.user_id == user_id)
            .filter(|r| match before {
                Some(key) => (r.created_at, r.id) < key,
                None => true,
            })
            .cloned()
            .collect();
        owned.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        owned.truncate(limit);
        Ok(owned)
    }

    async fn find(&self, id: Uuid) -> Result<Option<SavedReport>, StoreError> {
        Ok(self.reports.read().await.get(&id).cloned())
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid cursor")]
    InvalidCursor,

    #[error("Report not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn ReportStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    pub async fn save(
        &self,
        user_id: &str,
        request: SaveReportRequest,
    ) -> Result<SavedReport, ReportError> {
        let report = SavedReport {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            analysis_type: request.analysis_type,
            url: request.url,
            results: request.results,
            created_at: Utc::now().trunc_subsecs(6),
        };
        self.store.insert(&report).await?;
        tracing::info!(user_id = %user_id, report_id = %report.id, "Report saved");
        Ok(report)
    }

    pub async fn list(
        &self,
        user_id: &str,
        query: &ListReportsQuery,
    ) -> Result<ReportPage, ReportError> {
        let before = match query.cursor.as_deref() {
            Some(cursor) => Some(decode_cursor(cursor).map_err(|_| ReportError::InvalidCursor)?),
            None => None,
        };
        let limit = clamp_limit(query.limit) as usize;

        let mut reports = self.store.list(user_id, before, limit + 1).await?;
        let next_cursor = if reports.len() > limit {
            reports.truncate(limit);
            reports.last().map(|r| encode_cursor(r.created_at, r.id))
        } else {
            None
        };

        Ok(ReportPage { reports, next_cursor })
    }

    /// Returns the report only to its owner; anyone else gets `NotFound`.
    pub async fn get(&self, user_id: &str, id: Uuid) -> Result<SavedReport, ReportError> {
        match self.store.find(id).await? {
            Some(report) if report.user_id == user_id => Ok(report),
            _ => Err(ReportError::NotFound),
        }
    }
}
