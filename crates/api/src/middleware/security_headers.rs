//! Security headers middleware.
//!
//! Adds security-related HTTP headers to all responses.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

/// Environment variable that turns on `Strict-Transport-Security`.
pub const HSTS_ENV_VAR: &str = "SI__SECURITY__HSTS_ENABLED";

const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";

/// Security header names as constants for testing and documentation.
pub mod headers {
    pub const X_CONTENT_TYPE_OPTIONS: &str = "x-content-type-options";
    pub const X_FRAME_OPTIONS: &str = "x-frame-options";
    pub const X_XSS_PROTECTION: &str = "x-xss-protection";
    pub const REFERRER_POLICY: &str = "referrer-policy";
}

fn flag_enabled(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

/// HSTS is only sent behind proper TLS termination, so it is opt-in.
fn hsts_enabled() -> bool {
    std::env::var(HSTS_ENV_VAR)
        .map(|v| flag_enabled(&v))
        .unwrap_or(false)
}

/// Middleware that adds security headers to all responses.
///
/// Headers added:
/// - `X-Content-Type-Options: nosniff`
/// - `X-Frame-Options: DENY`
/// - `X-XSS-Protection: 1; mode=block`
/// - `Referrer-Policy: no-referrer`
/// - `Strict-Transport-Security` when [`HSTS_ENV_VAR`] is `true` or `1`
pub async fn security_headers_middleware(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let response_headers = response.headers_mut();

    response_headers.insert(
        header::HeaderName::from_static(headers::X_CONTENT_TYPE_OPTIONS),
        HeaderValue::from_static("nosniff"),
    );
    response_headers.insert(
        header::HeaderName::from_static(headers::X_FRAME_OPTIONS),
        HeaderValue::from_static("DENY"),
    );
    response_headers.insert(
        header::HeaderName::from_static(headers::X_XSS_PROTECTION),
        HeaderValue::from_static("1; mode=block"),
    );
    response_headers.insert(
        header::HeaderName::from_static(headers::REFERRER_POLICY),
        HeaderValue::from_static("no-referrer"),
    );

    if hsts_enabled() {
        response_headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_VALUE),
        );
    }

    response
}
