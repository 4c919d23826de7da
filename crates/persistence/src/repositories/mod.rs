//! Repository implementations for database operations.

pub mod entitlement;
pub mod saved_report;

pub use entitlement::EntitlementRepository;
pub use saved_report::SavedReportRepository;
