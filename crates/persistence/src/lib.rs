//! Persistence layer for the SiteInsight backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Postgres implementations of the domain's entitlement and report stores

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
