//! Page snapshot produced by the content extraction gateway.

use serde::{Deserialize, Serialize};

/// Headings found on the page, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headings {
    pub h1: Vec<String>,
    pub h2: Vec<String>,
}

/// Trust and payment signals found on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySignals {
    pub ssl: bool,
    pub certifications: Vec<String>,
    pub payment_methods: Vec<String>,
}

/// Color and font tokens pulled from inline styles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignTokens {
    pub colors: Vec<String>,
    pub fonts: Vec<String>,
}

/// Structured extraction of one web page. Read-only once produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub title: String,
    pub meta_description: String,
    pub headings: Headings,
    pub navigation: Vec<String>,
    pub buttons: Vec<String>,
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub prices: Vec<String>,
    pub security: SecuritySignals,
    pub design: DesignTokens,
    #[serde(default, skip_serializing)]
    pub markup: String,
}
