//! Analysis request and mode domain model.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use validator::Validate;

/// Single-prompt analysis kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecializedKind {
    LandingPage,
    ProductPage,
    TrustCheck,
    BrandAnalysis,
    MobileExperience,
}

impl SpecializedKind {
    pub const ALL: [SpecializedKind; 5] = [
        SpecializedKind::LandingPage,
        SpecializedKind::ProductPage,
        SpecializedKind::TrustCheck,
        SpecializedKind::BrandAnalysis,
        SpecializedKind::MobileExperience,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecializedKind::LandingPage => "landing_page",
            SpecializedKind::ProductPage => "product_page",
            SpecializedKind::TrustCheck => "trust_check",
            SpecializedKind::BrandAnalysis => "brand_analysis",
            SpecializedKind::MobileExperience => "mobile_experience",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Only page-level kinds get a scored design stage.
    pub fn scores_design(&self) -> bool {
        matches!(
            self,
            SpecializedKind::LandingPage | SpecializedKind::ProductPage
        )
    }
}

impl std::fmt::Display for SpecializedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved analysis mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisMode {
    /// SEO, UX and content.
    Standard,
    /// Same three topics, strengths only.
    Competitor,
    Specialized(SpecializedKind),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown analysis type: {0}")]
pub struct InvalidMode(pub String);

impl AnalysisMode {
    /// Resolves the mode from the request fields. The competitor flag
    /// overrides any requested analysis type.
    pub fn resolve(analysis_type: Option<&str>, is_competitor: bool) -> Result<Self, InvalidMode> {
        if is_competitor {
            return Ok(AnalysisMode::Competitor);
        }
        match analysis_type.map(str::trim) {
            None | Some("") | Some("standard") => Ok(AnalysisMode::Standard),
            Some("competitor") => Ok(AnalysisMode::Competitor),
            Some(other) => SpecializedKind::parse(other)
                .map(AnalysisMode::Specialized)
                .ok_or_else(|| InvalidMode(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Standard => "standard",
            AnalysisMode::Competitor => "competitor",
            AnalysisMode::Specialized(kind) => kind.as_str(),
        }
    }

    /// Whether the design prompt is sent for this mode.
    pub fn runs_design_stage(&self) -> bool {
        match self {
            AnalysisMode::Standard | AnalysisMode::Competitor => true,
            AnalysisMode::Specialized(kind) => kind.scores_design(),
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload for running an analysis.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnalysisRequest {
    #[validate(length(min = 1, max = 2048, message = "URL is required for analysis"))]
    pub url: String,

    #[serde(default)]
    pub analysis_type: Option<String>,

    #[serde(default)]
    pub is_competitor: bool,

    /// When present, one unit of quota is consumed before the analysis runs.
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 255,
        message = "User id must be between 1 and 255 characters"
    ))]
    pub user_id: Option<String>,
}

/// Validated request, ready for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPlan {
    pub url: Url,
    pub mode: AnalysisMode,
}

/// Reasons a request is rejected before any external call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidRequest {
    #[error("Invalid URL: {0}")]
    Url(String),

    #[error(transparent)]
    Mode(#[from] InvalidMode),
}

impl AnalysisPlan {
    pub fn new(
        url: &str,
        analysis_type: Option<&str>,
        is_competitor: bool,
    ) -> Result<Self, InvalidRequest> {
        let url = shared::validation::parse_target_url(url).map_err(|e| {
            InvalidRequest::Url(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            )
        })?;
        let mode = AnalysisMode::resolve(analysis_type, is_competitor)?;
        Ok(Self { url, mode })
    }

    pub fn from_request(request: &AnalysisRequest) -> Result<Self, InvalidRequest> {
        Self::new(
            &request.url,
            request.analysis_type.as_deref(),
            request.is_competitor,
        )
    }

    /// Host used for the audience lookup.
    pub fn domain(&self) -> String {
        shared::validation::bare_domain(&self.url)
    }
}
