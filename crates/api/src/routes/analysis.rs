//! Analysis endpoint.

use axum::{extract::State, Json};
use tracing::{info, warn};
use validator::Validate;

use domain::models::analysis::{AnalysisPlan, AnalysisRequest};
use domain::models::report::AnalysisReport;
use domain::services::{AnalysisError, UsageReceipt};

use crate::app::AppState;
use crate::error::ApiError;

/// Run one analysis.
///
/// POST /get_suggestions
///
/// Input is validated before any external call. With a `user_id`, one unit
/// of quota is consumed up front and refunded if the pipeline aborts.
pub async fn get_suggestions(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisReport>, ApiError> {
    request.validate()?;
    let plan = AnalysisPlan::from_request(&request)?;

    if !state.pipeline.is_configured() {
        return Err(AnalysisError::NotConfigured.into());
    }

    let charge: Option<(&str, UsageReceipt)> = match request.user_id.as_deref() {
        Some(user_id) => Some((user_id, state.entitlements.consume(user_id).await?)),
        None => None,
    };

    info!(
        url = %plan.url,
        mode = %plan.mode,
        user_id = request.user_id.as_deref().unwrap_or("anonymous"),
        "Analysis started"
    );

    match state.pipeline.run(&plan).await {
        Ok(report) => Ok(Json(report)),
        Err(err) => {
            if let Some((user_id, receipt)) = &charge {
                if let Err(refund_err) = state.entitlements.refund(user_id, receipt).await {
                    warn!(user_id = %user_id, error = %refund_err, "Quota refund failed");
                }
            }
            Err(err.into())
        }
    }
}
