//! Integration tests for the analysis endpoint.
//!
//! Tests cover:
//! - POST /get_suggestions for standard, specialized and competitor modes
//! - Input validation before any external call
//! - Quota gating with refund when the pipeline aborts
//! - Rate limiting of the analysis route

mod common;

use axum::http::{Method, StatusCode};
use common::{
    json_request, post_json, random_site_url, send, unique_user_id, TestAppBuilder, TEST_VISITORS,
};
use domain::services::{ExtractionError, MockContentExtractor, MockGenerationBackend};
use serde_json::json;

const SUMMARY_NEEDLE: &str = "Based on the following analyses";
const DESIGN_NEEDLE: &str = "extremely critical";
const SEO_NEEDLE: &str = "experienced SEO specialist";

fn scripted_backend() -> MockGenerationBackend {
    MockGenerationBackend::new()
        .respond_to(SUMMARY_NEEDLE, r#"{"overall_summary": "tighten the copy"}"#)
        .respond_to(
            DESIGN_NEEDLE,
            "```json\n{\"usability\": 0.8, \"aesthetics\": 1.4, \"performance\": \"0.6\", \"comment\": \"clean\"}\n```",
        )
        .respond_to(SEO_NEEDLE, r#"Here you go: {"summary": "titles are fine"}"#)
}

// =============================================================================
// Report shapes
// =============================================================================

#[tokio::test]
async fn test_standard_analysis_returns_full_report() {
    let app = TestAppBuilder::new().generation(scripted_backend()).build();

    let (status, body) = post_json(
        &app.router,
        "/get_suggestions",
        json!({"url": "https://example.com", "query": "ignored"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    for key in [
        "seo_analysis",
        "ux_analysis",
        "content_analysis",
        "designScore",
        "recommendations_summary",
        "visitors_per_month",
        "performance_metrics",
    ] {
        assert!(body.get(key).is_some(), "missing {key}");
    }
    assert_eq!(body["seo_analysis"]["summary"], "titles are fine");
    assert_eq!(body["seo_analysis"]["observations"], json!([]));
    assert_eq!(body["recommendations_summary"]["overall_summary"], "tighten the copy");
    assert_eq!(body["designScore"]["aesthetics"], 1.0);
    assert_eq!(body["designScore"]["performance"], 0.6);
    assert_eq!(body["visitors_per_month"], TEST_VISITORS);
    // 3 primary prompts, design, summary
    assert_eq!(app.generation.call_count(), 5);
}

#[tokio::test]
async fn test_trust_check_runs_single_prompt() {
    let app = TestAppBuilder::new()
        .generation(MockGenerationBackend::new().with_fallback(r#"{"summary": "looks legit"}"#))
        .build();

    let (status, body) = post_json(
        &app.router,
        "/get_suggestions",
        json!({"url": "https://example.com", "analysis_type": "trust_check"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.generation.call_count(), 1);
    assert_eq!(body["analysis_type"], "trust_check");
    assert_eq!(body["specialized_analysis"]["summary"], "looks legit");
    assert_eq!(body["designScore"]["usability"], 0.5);
    assert_eq!(body["designScore"]["aesthetics"], 0.5);
    assert_eq!(body["designScore"]["performance"], 0.5);
}

#[tokio::test]
async fn test_competitor_flag_overrides_mode() {
    let app = TestAppBuilder::new()
        .generation(
            MockGenerationBackend::new()
                .respond_to("Report strengths only", r#"{"overall_strengths": "fast checkout"}"#),
        )
        .build();

    let (status, body) = post_json(
        &app.router,
        "/get_suggestions",
        json!({
            "url": "https://competitor.example",
            "analysis_type": "landing_page",
            "is_competitor": true
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_competitor"], true);
    assert_eq!(body["strengths_summary"]["overall_strengths"], "fast checkout");
    assert!(body.get("recommendations_summary").is_none());
    assert!(body.get("specialized_analysis").is_none());
    // 3 competitor prompts, design, strengths summary
    assert_eq!(app.generation.call_count(), 5);
}

#[tokio::test]
async fn test_failed_generation_slot_still_returns_shaped_report() {
    let app = TestAppBuilder::new()
        .generation(MockGenerationBackend::new().fail_on(SEO_NEEDLE, "upstream 500"))
        .build();

    let (status, body) = post_json(
        &app.router,
        "/get_suggestions",
        json!({"url": "https://example.com"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seo_analysis"]["summary"], "");
    assert_eq!(body["seo_analysis"]["observations"], json!([]));
    assert_eq!(body["seo_analysis"]["recommendations"], "");
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_malformed_url_makes_no_external_calls() {
    let app = TestAppBuilder::new().build();

    let (status, body) = post_json(
        &app.router,
        "/get_suggestions",
        json!({"url": "not-a-url"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(app.extractor.call_count(), 0);
    assert_eq!(app.generation.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_analysis_type_rejected() {
    let app = TestAppBuilder::new().build();

    let (status, body) = post_json(
        &app.router,
        "/get_suggestions",
        json!({"url": "https://example.com", "analysis_type": "astrology"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(app.extractor.call_count(), 0);
}

#[tokio::test]
async fn test_missing_url_rejected() {
    let app = TestAppBuilder::new().build();

    let (status, _) = post_json(&app.router, "/get_suggestions", json!({"url": ""})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.extractor.call_count(), 0);
}

// =============================================================================
// Upstream failures
// =============================================================================

#[tokio::test]
async fn test_extraction_failure_is_bad_gateway() {
    let app = TestAppBuilder::new()
        .extractor(MockContentExtractor::failing(ExtractionError::Status(503)))
        .build();

    let (status, body) = post_json(
        &app.router,
        "/get_suggestions",
        json!({"url": random_site_url()}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "extraction_failed");
    assert_eq!(app.generation.call_count(), 0);
}

#[tokio::test]
async fn test_unconfigured_backend_is_service_unavailable() {
    let app = TestAppBuilder::new()
        .generation(MockGenerationBackend::unconfigured())
        .build();

    let (status, body) = post_json(
        &app.router,
        "/get_suggestions",
        json!({"url": "https://example.com"}),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service_unavailable");
    assert_eq!(app.extractor.call_count(), 0);
}

// =============================================================================
// Quota gating
// =============================================================================

#[tokio::test]
async fn test_trial_user_quota_is_enforced() {
    let app = TestAppBuilder::new().build();
    let user_id = unique_user_id();

    for _ in 0..3 {
        let (status, _) = post_json(
            &app.router,
            "/get_suggestions",
            json!({"url": "https://example.com", "user_id": user_id}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let calls_before = app.extractor.call_count();
    let (status, body) = post_json(
        &app.router,
        "/get_suggestions",
        json!({"url": "https://example.com", "user_id": user_id}),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "quota_exceeded");
    assert_eq!(app.extractor.call_count(), calls_before);
}

#[tokio::test]
async fn test_aborted_analysis_refunds_quota() {
    let app = TestAppBuilder::new()
        .extractor(MockContentExtractor::failing(ExtractionError::Fetch(
            "connection refused".to_string(),
        )))
        .build();
    let user_id = unique_user_id();

    let (status, _) = post_json(
        &app.router,
        "/get_suggestions",
        json!({"url": "https://example.com", "user_id": user_id}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, body) = post_json(&app.router, "/check-usage", json!({"user_id": user_id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining_analyses"], 3);
}

#[tokio::test]
async fn test_anonymous_analysis_is_not_metered() {
    let app = TestAppBuilder::new().build();

    for _ in 0..5 {
        let (status, _) = post_json(
            &app.router,
            "/get_suggestions",
            json!({"url": "https://example.com"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_analysis_route_is_rate_limited() {
    let app = TestAppBuilder::new()
        .config(|c| c.security.rate_limit_per_minute = 1)
        .build();

    let first = json_request(
        Method::POST,
        "/get_suggestions",
        json!({"url": "https://example.com"}),
    );
    let (status, _) = send(&app.router, first).await;
    assert_eq!(status, StatusCode::OK);

    let second = json_request(
        Method::POST,
        "/get_suggestions",
        json!({"url": "https://example.com"}),
    );
    let (status, body) = send(&app.router, second).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    // Other routes are not limited
    let (status, _) = post_json(
        &app.router,
        "/check-usage",
        json!({"user_id": unique_user_id()}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
