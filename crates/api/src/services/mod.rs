//! Outbound clients used by the API.

pub mod audience;
pub mod identity_provider;
pub mod openai;
pub mod page_extractor;

pub use audience::AudienceClient;
pub use identity_provider::{ManagementApiClient, PlanSync, PlanSyncError};
pub use openai::OpenAiClient;
pub use page_extractor::HttpPageExtractor;
