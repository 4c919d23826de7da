//! Domain layer for the SiteInsight backend.
//!
//! This crate contains:
//! - Domain models (entitlements, analysis requests, page snapshots, reports)
//! - Usage metering and entitlement services
//! - The analysis pipeline: prompt building, model fan-out, response repair
//!   and aggregation
//! - Collaborator traits implemented by the persistence and api crates

pub mod models;
pub mod services;
