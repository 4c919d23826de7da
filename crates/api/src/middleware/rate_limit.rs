//! Rate limiting middleware.
//!
//! Per-client limits on the analysis route, keyed by the client address.
//! The first `X-Forwarded-For` hop wins over the connection address so the
//! service can sit behind a reverse proxy.

use std::net::SocketAddr;
use std::num::NonZeroU32;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{clock::Clock, DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde_json::json;

use crate::app::AppState;

/// Header carrying the original client address behind a proxy.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Key used when no client address can be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Tracked keys above which idle entries are dropped.
const PRUNE_THRESHOLD: usize = 10_000;

/// Rate limiter state shared across all requests.
pub struct RateLimiterState {
    limiter: DefaultKeyedRateLimiter<String>,
    rate_limit_per_minute: u32,
}

impl RateLimiterState {
    /// Returns `None` when the limit is 0 (disabled).
    pub fn new(rate_limit_per_minute: u32) -> Option<Self> {
        let per_minute = NonZeroU32::new(rate_limit_per_minute)?;
        Some(Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            rate_limit_per_minute,
        })
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// Check if a request from the given client should be allowed.
    /// Returns Ok(()) if allowed, or Err with retry_after seconds if rate limited.
    pub fn check(&self, client: &str) -> Result<(), u64> {
        if self.limiter.len() > PRUNE_THRESHOLD {
            self.limiter.retain_recent();
        }

        self.limiter.check_key(&client.to_string()).map_err(|not_until| {
            let wait_time = not_until.wait_time_from(self.limiter.clock().now());
            wait_time.as_secs().max(1)
        })
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("tracked_clients", &self.limiter.len())
            .finish()
    }
}

/// Resolves the rate-limit key of a request.
pub fn client_key(req: &Request<Body>) -> String {
    let forwarded = req
        .headers()
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(first_hop) = forwarded {
        return first_hop.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Middleware that applies the per-client limit.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(ref rate_limiter) = state.rate_limiter {
        let client = client_key(&req);
        if let Err(retry_after) = rate_limiter.check(&client) {
            tracing::warn!(client = %client, retry_after = retry_after, "Rate limit exceeded");
            metrics::counter!("rate_limited_requests_total").increment(1);
            return rate_limited_response(rate_limiter.rate_limit_per_minute(), retry_after);
        }
    }

    next.run(req).await
}

/// Create a rate limited response with proper headers and body.
fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "error": "rate_limited",
        "message": format!("Rate limit of {} requests/minute exceeded", limit),
        "retryAfter": retry_after
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/get_suggestions");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_zero_limit_disables() {
        assert!(RateLimiterState::new(0).is_none());
        assert!(RateLimiterState::new(10).is_some());
    }

    #[test]
    fn test_rate_limiter_exhaustion() {
        let state = RateLimiterState::new(1).unwrap();

        assert!(state.check("203.0.113.7").is_ok());

        let result = state.check("203.0.113.7");
        assert!(result.is_err());
        assert!(result.unwrap_err() >= 1);
    }

    #[test]
    fn test_clients_are_independent() {
        let state = RateLimiterState::new(1).unwrap();

        assert!(state.check("203.0.113.7").is_ok());
        assert!(state.check("198.51.100.2").is_ok());
        assert!(state.check("203.0.113.7").is_err());
    }

    #[test]
    fn test_same_client_allowed_up_to_limit() {
        let state = RateLimiterState::new(5).unwrap();
        for i in 0..5 {
            assert!(state.check("client").is_ok(), "Request {} should be allowed", i);
        }
        assert!(state.check("client").is_err());
    }

    #[test]
    fn test_client_key_prefers_first_forwarded_hop() {
        let req = request_with(&[(FORWARDED_FOR_HEADER, "203.0.113.7, 10.0.0.1")]);
        assert_eq!(client_key(&req), "203.0.113.7");
    }

    #[test]
    fn test_client_key_uses_connection_address() {
        let mut req = request_with(&[]);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4711))));
        assert_eq!(client_key(&req), "192.0.2.1");
    }

    #[test]
    fn test_client_key_unknown() {
        let req = request_with(&[(FORWARDED_FOR_HEADER, " ")]);
        assert_eq!(client_key(&req), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_rate_limited_response_format() {
        let response = rate_limited_response(30, 60);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    }

    #[test]
    fn test_debug_reports_limit() {
        let state = RateLimiterState::new(30).unwrap();
        state.check("a").unwrap();
        let debug = format!("{:?}", state);
        assert!(debug.contains("rate_limit_per_minute: 30"));
        assert!(debug.contains("tracked_clients"));
    }
}
