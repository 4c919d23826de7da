//! Request tracing middleware.
//!
//! Reads or generates the request id and runs the request inside a span
//! carrying it, so every log line of an analysis can be correlated.

use axum::{
    body::Body,
    http::{header::HeaderName, Extensions, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Longest client-supplied id that is reused as is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request ID stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn incoming_request_id(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
}

/// Middleware that extracts or generates a request ID.
///
/// The id is stored in request extensions, echoed in the response header
/// and recorded on the request span.
pub async fn trace_id(mut req: Request<Body>, next: Next) -> Response {
    let request_id = incoming_request_id(&req).unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let start = std::time::Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    span.in_scope(|| {
        tracing::info!(
            status = status,
            duration_ms = duration_ms,
            "Request completed"
        )
    });

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-request-id"), header_value);
    }

    response
}

/// Extracts the request ID from request extensions.
pub fn get_request_id(extensions: &Extensions) -> String {
    extensions
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_request_id_missing() {
        let extensions = Extensions::new();
        assert_eq!(get_request_id(&extensions), "unknown");
    }

    #[test]
    fn test_get_request_id_present() {
        let mut extensions = Extensions::new();
        extensions.insert(RequestId("my-request-id".to_string()));
        assert_eq!(get_request_id(&extensions), "my-request-id");
    }

    #[test]
    fn test_incoming_request_id_is_reused() {
        let req = Request::builder()
            .header(REQUEST_ID_HEADER, "  abc-123 ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(incoming_request_id(&req).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_oversized_or_blank_request_id_is_replaced() {
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        let req = Request::builder()
            .header(REQUEST_ID_HEADER, long)
            .body(Body::empty())
            .unwrap();
        assert!(incoming_request_id(&req).is_none());

        let blank = Request::builder()
            .header(REQUEST_ID_HEADER, "   ")
            .body(Body::empty())
            .unwrap();
        assert!(incoming_request_id(&blank).is_none());
    }
}
