//! Domain models for SiteInsight.

pub mod analysis;
pub mod entitlement;
pub mod report;
pub mod saved_report;
pub mod snapshot;

pub use analysis::{AnalysisMode, AnalysisPlan, AnalysisRequest, InvalidRequest, SpecializedKind};
pub use entitlement::{SubscriptionPlan, Tier, UserEntitlement};
pub use report::{
    AnalysisReport, AspectAnalysis, DesignScore, RecommendationsSummary, SpecializedAnalysis,
    Stage, StageTimings, StrengthsSummary, SummaryRecord,
};
pub use saved_report::{ListReportsQuery, ReportPage, SaveReportRequest, SavedReport};
pub use snapshot::PageSnapshot;
