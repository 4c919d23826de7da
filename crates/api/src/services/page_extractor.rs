//! HTTP page extraction.
//!
//! Fetches a page over plain HTTP and pulls the fields the prompts need out
//! of the static markup. Script-rendered content is not executed.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{header, Client, Response};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use domain::models::snapshot::{DesignTokens, Headings, PageSnapshot, SecuritySignals};
use domain::services::{ContentExtractor, ExtractionError};

/// Browser user agent; many sites refuse unknown clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub const NO_TITLE: &str = "No title found";
pub const NO_META_DESCRIPTION: &str = "No meta description found";

/// Largest page body read before extraction gives up.
pub const DEFAULT_MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;

/// Cap on distinct colors and fonts kept from inline styles.
const MAX_DESIGN_TOKENS: usize = 10;

lazy_static! {
    static ref STYLE_COLOR: Regex = Regex::new(
        r"(?:color|background|background-color|border-color):\s*(#[0-9a-fA-F]{3,6}|rgba?\([^)]+\)|[a-zA-Z]+)"
    )
    .unwrap();
    static ref STYLE_FONT: Regex = Regex::new(r"font-family:\s*([^;]+)").unwrap();
}

/// Fetches pages with reqwest and parses them with scraper.
#[derive(Debug, Clone)]
pub struct HttpPageExtractor {
    client: Client,
    timeout_secs: u64,
    max_body_bytes: usize,
}

impl HttpPageExtractor {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
            max_body_bytes: DEFAULT_MAX_PAGE_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    fn body_error(&self, e: reqwest::Error) -> ExtractionError {
        if e.is_timeout() {
            ExtractionError::Timeout(self.timeout_secs)
        } else {
            ExtractionError::InvalidContent(e.to_string())
        }
    }

    /// Reads the body chunk by chunk, failing once it passes the size cap.
    async fn read_body(&self, mut response: Response) -> Result<String, ExtractionError> {
        let too_large = || {
            ExtractionError::InvalidContent(format!(
                "page body exceeds {} bytes",
                self.max_body_bytes
            ))
        };

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(too_large());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.body_error(e))? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl ContentExtractor for HttpPageExtractor {
    async fn fetch(&self, url: &Url) -> Result<PageSnapshot, ExtractionError> {
        let response = self
            .client
            .get(url.as_str())
            .header(header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::Timeout(self.timeout_secs)
                } else {
                    ExtractionError::Fetch(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Page returned non-success status");
            return Err(ExtractionError::Status(status.as_u16()));
        }

        let markup = self.read_body(response).await.map_err(|e| {
            warn!(url = %url, error = %e, "Page body rejected");
            e
        })?;

        let page_url = url.clone();
        let snapshot = tokio::task::spawn_blocking(move || extract_snapshot(&page_url, markup))
            .await
            .map_err(|e| {
                ExtractionError::InvalidContent(format!("extraction task failed: {}", e))
            })?;
        debug!(
            url = %url,
            title = %snapshot.title,
            headings = snapshot.headings.h1.len() + snapshot.headings.h2.len(),
            links = snapshot.links.len(),
            "Page extracted"
        );
        Ok(snapshot)
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty text of every element matching `css`, in document order.
fn texts(root: ElementRef<'_>, css: &str) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    root.select(&sel)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Non-empty values of `attr` on every element matching `css`.
fn attrs(root: ElementRef<'_>, css: &str, attr: &str) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    root.select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// `alt` text of matching images, or `fallback` when absent.
fn image_alts(root: ElementRef<'_>, css: &str, fallback: &str) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    root.select(&sel)
        .map(|img| {
            img.value()
                .attr("alt")
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .unwrap_or(fallback)
                .to_string()
        })
        .collect()
}

fn push_unique(into: &mut Vec<String>, seen: &mut HashSet<String>, value: String) {
    if into.len() < MAX_DESIGN_TOKENS && seen.insert(value.clone()) {
        into.push(value);
    }
}

fn design_tokens(root: ElementRef<'_>) -> DesignTokens {
    let styles = attrs(root, "[style]", "style");
    let mut tokens = DesignTokens::default();
    let mut seen_colors = HashSet::new();
    let mut seen_fonts = HashSet::new();

    for style in &styles {
        for cap in STYLE_COLOR.captures_iter(style) {
            push_unique(&mut tokens.colors, &mut seen_colors, cap[1].to_string());
        }
        for cap in STYLE_FONT.captures_iter(style) {
            for font in cap[1].split(',') {
                let name = font.trim().trim_matches(|c| c == '\'' || c == '"');
                if !name.is_empty() {
                    push_unique(&mut tokens.fonts, &mut seen_fonts, name.to_string());
                }
            }
        }
    }
    tokens
}

/// Builds the snapshot from raw markup.
pub fn extract_snapshot(url: &Url, markup: String) -> PageSnapshot {
    let document = Html::parse_document(&markup);
    let root = document.root_element();

    let title = texts(root, "title")
        .into_iter()
        .next()
        .unwrap_or_else(|| NO_TITLE.to_string());
    let meta_description = attrs(root, r#"meta[name="description"]"#, "content")
        .into_iter()
        .next()
        .unwrap_or_else(|| NO_META_DESCRIPTION.to_string());

    let security = SecuritySignals {
        ssl: url.scheme() == "https",
        certifications: image_alts(
            root,
            r#"img[alt*="secure"], img[alt*="certified"], img[src*="trust"], img[src*="secure"]"#,
            "Certification",
        ),
        payment_methods: image_alts(
            root,
            r#"img[alt*="payment"], img[src*="payment"], img[src*="visa"], img[src*="mastercard"]"#,
            "Payment method",
        ),
    };

    let snapshot = PageSnapshot {
        title,
        meta_description,
        headings: Headings {
            h1: texts(root, "h1"),
            h2: texts(root, "h2"),
        },
        navigation: texts(root, "nav a"),
        buttons: texts(root, "button"),
        links: texts(root, "a"),
        images: attrs(root, "img", "src"),
        prices: texts(root, r#".price, .product-price, [itemprop="price"]"#),
        security,
        design: design_tokens(root),
        markup: String::new(),
    };

    PageSnapshot { markup, ..snapshot }
}
