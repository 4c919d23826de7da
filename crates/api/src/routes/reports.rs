//! Saved report endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use domain::models::saved_report::{ListReportsQuery, ReportPage, SaveReportRequest, SavedReport};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AuthenticatedUser;

/// Whether the caller may keep reports: admin role, a paid plan claim, or a
/// paid local tier.
async fn can_save(state: &AppState, user: &AuthenticatedUser) -> Result<bool, ApiError> {
    if user.is_admin() || user.has_paid_plan_claim() {
        return Ok(true);
    }
    let tier = state.entitlements.tier(user.user_id()).await?;
    Ok(tier.map(|t| t.is_paid()).unwrap_or(false))
}

/// Save an analysis result.
///
/// POST /reports
pub async fn save_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<SaveReportRequest>,
) -> Result<(StatusCode, Json<SavedReport>), ApiError> {
    request.validate()?;

    if !can_save(&state, &user).await? {
        return Err(ApiError::Forbidden(
            "Saving reports requires a paid plan".to_string(),
        ));
    }

    let report = state.reports.save(user.user_id(), request).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// List the caller's reports, newest first.
///
/// GET /reports?cursor=<c>&limit=<n>
pub async fn list_reports(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<ReportPage>, ApiError> {
    let page = state.reports.list(user.user_id(), &query).await?;
    Ok(Json(page))
}

/// GET /reports/:id
pub async fn get_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SavedReport>, ApiError> {
    let report = state.reports.get(user.user_id(), id).await?;
    Ok(Json(report))
}
