//! Domain services for SiteInsight.
//!
//! Services contain business logic that operates on domain models.

pub mod aggregator;
pub mod entitlements;
pub mod fanout;
pub mod pipeline;
pub mod prompts;
pub mod quota;
pub mod reports;
pub mod response_parser;

pub use aggregator::{Aggregator, PrimaryRecords};
pub use entitlements::{
    BasicInfo, Clock, EntitlementError, EntitlementService, EntitlementStore,
    InMemoryEntitlementStore, StoreError, SubscriptionStatus, SystemClock, TrialInfo,
};
pub use fanout::{
    FanOut, FanOutError, GenerationBackend, GenerationError, MockGenerationBackend,
    DEFAULT_GENERATION_TIMEOUT,
};
pub use pipeline::{
    AnalysisError, AnalysisPipeline, AudienceMetrics, ContentExtractor, ExtractionError,
    MockAudienceMetrics, MockContentExtractor, DEFAULT_PAGE_TIMEOUT,
};
pub use prompts::{PromptBuilder, DEFAULT_LANGUAGE, DEFAULT_SYSTEM_PROMPT};
pub use quota::{QuotaDecision, QuotaError, Remaining, UsageReceipt, UsageWindow};
pub use reports::{InMemoryReportStore, ReportError, ReportService, ReportStore};
pub use response_parser::{DelimitedJsonExtractor, ParseError, PayloadExtractor, ResponseParser};
