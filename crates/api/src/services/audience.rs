//! Monthly visitor lookup.
//!
//! Scrapes the public traffic estimate of a domain. Every failure path
//! degrades to `"N/A"`; the analysis never fails because of this lookup.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, warn};

use domain::models::report::VISITORS_UNAVAILABLE;
use domain::services::AudienceMetrics;

use crate::config::AudienceConfig;
use crate::services::page_extractor::BROWSER_USER_AGENT;

lazy_static! {
    static ref VISITS: Regex = Regex::new(r#""visits":\s*([0-9]+)"#).unwrap();
}

/// Traffic-estimate client.
#[derive(Debug, Clone)]
pub struct AudienceClient {
    client: Client,
    base_url: String,
    enabled: bool,
}

impl AudienceClient {
    pub fn new(config: &AudienceConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            enabled: config.enabled,
        })
    }

    async fn fetch_page(&self, domain: &str) -> Option<String> {
        let url = format!("{}/website/{}/", self.base_url, domain);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(domain = %domain, error = %e, "Visitor lookup request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(
                domain = %domain,
                status = response.status().as_u16(),
                "Visitor lookup returned error status"
            );
            return None;
        }
        response.text().await.ok()
    }
}

#[async_trait]
impl AudienceMetrics for AudienceClient {
    async fn lookup(&self, domain: &str) -> String {
        if !self.enabled || domain.is_empty() {
            return VISITORS_UNAVAILABLE.to_string();
        }
        let visitors = match self.fetch_page(domain).await {
            Some(body) => visitors_from_body(&body),
            None => None,
        };
        debug!(domain = %domain, found = visitors.is_some(), "Visitor lookup finished");
        visitors.unwrap_or_else(|| VISITORS_UNAVAILABLE.to_string())
    }
}

/// Formats the first `"visits":<n>` value in the page.
pub fn visitors_from_body(body: &str) -> Option<String> {
    let visits: u64 = VISITS.captures(body)?.get(1)?.as_str().parse().ok()?;
    Some(format!("{} visitors/month", with_thousands_separators(visits)))
}

fn with_thousands_separators(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
