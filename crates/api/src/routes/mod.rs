//! HTTP route handlers.

pub mod analysis;
pub mod billing;
pub mod health;
pub mod reports;
pub mod users;
