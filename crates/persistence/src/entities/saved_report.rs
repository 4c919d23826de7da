//! Saved report entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::saved_report::SavedReport;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the saved_reports table.
#[derive(Debug, Clone, FromRow)]
pub struct SavedReportEntity {
    pub id: Uuid,
    pub user_id: String,
    pub analysis_type: String,
    pub url: String,
    pub results: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<SavedReportEntity> for SavedReport {
    fn from(entity: SavedReportEntity) -> Self {
        SavedReport {
            id: entity.id,
            user_id: entity.user_id,
            analysis_type: entity.analysis_type,
            url: entity.url,
            results: entity.results,
            created_at: entity.created_at,
        }
    }
}
