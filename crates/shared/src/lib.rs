//! Shared utilities and common types for the SiteInsight backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (hashing, webhook signatures)
//! - Identity token verification
//! - Cursor pagination
//! - Common validation logic

pub mod crypto;
pub mod jwt;
pub mod pagination;
pub mod validation;
