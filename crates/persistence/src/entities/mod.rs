//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod entitlement;
pub mod saved_report;

pub use entitlement::UserEntitlementEntity;
pub use saved_report::SavedReportEntity;
