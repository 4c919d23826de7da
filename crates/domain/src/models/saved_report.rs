//! Saved report domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// An analysis result a paying user chose to keep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedReport {
    pub id: Uuid,
    pub user_id: String,
    pub analysis_type: String,
    pub url: String,
    pub results: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Request payload for saving a report.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaveReportRequest {
    #[validate(length(
        min = 1,
        max = 50,
        message = "Analysis type must be between 1 and 50 characters"
    ))]
    pub analysis_type: String,

    #[validate(length(min = 1, max = 2048, message = "URL must be between 1 and 2048 characters"))]
    pub url: String,

    pub results: serde_json::Value,
}

/// Query parameters for listing reports.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListReportsQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

/// One page of a caller's reports, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct ReportPage {
    pub reports: Vec<SavedReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}
