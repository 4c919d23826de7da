use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain::models::analysis::InvalidRequest;
use domain::services::{
    AnalysisError, EntitlementError, QuotaError, ReportError, StoreError,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation error: {message}")]
    InvalidFields {
        message: String,
        details: Vec<ValidationDetail>,
    },

    #[error("Rate limited")]
    RateLimited,

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let details = match &self {
            ApiError::InvalidFields { details, .. } => Some(details.clone()),
            _ => None,
        };

        let (status, error_code, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::QuotaExceeded(msg) => (StatusCode::FORBIDDEN, "quota_exceeded", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            ApiError::InvalidFields { message, .. } => {
                (StatusCode::BAD_REQUEST, "validation_error", message.clone())
            }
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests. Please try again later.".into(),
            ),
            ApiError::ExtractionFailed(msg) => {
                tracing::warn!(error = %msg, "Page extraction failed");
                (StatusCode::BAD_GATEWAY, "extraction_failed", msg.clone())
            }
            ApiError::Upstream(msg) => {
                tracing::error!(error = %msg, "Upstream provider failed");
                (StatusCode::BAD_GATEWAY, "upstream_error", msg.clone())
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(format!("Storage error: {}", err))
    }
}

impl From<QuotaError> for ApiError {
    fn from(err: QuotaError) -> Self {
        ApiError::QuotaExceeded(err.to_string())
    }
}

impl From<EntitlementError> for ApiError {
    fn from(err: EntitlementError) -> Self {
        match err {
            EntitlementError::Quota(e) => e.into(),
            EntitlementError::Store(e) => e.into(),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidCursor => ApiError::Validation("Invalid cursor".into()),
            ReportError::NotFound => ApiError::NotFound("Report not found".into()),
            ReportError::Store(e) => e.into(),
        }
    }
}

impl From<InvalidRequest> for ApiError {
    fn from(err: InvalidRequest) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::NotConfigured => {
                ApiError::ServiceUnavailable("Generation backend is not configured".into())
            }
            AnalysisError::Extraction(e) => ApiError::ExtractionFailed(e.to_string()),
            AnalysisError::Generation(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e.message.clone().map(|m| m.to_string()).unwrap_or_default(),
                })
            })
            .collect();

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::InvalidFields { message, details }
    }
}
