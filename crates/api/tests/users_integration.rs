//! Integration tests for subscription, usage and admin endpoints.
//!
//! Tests cover:
//! - POST /user-subscription
//! - POST /check-usage and POST /track-analysis
//! - POST /create-checkout-session
//! - POST /set-admin and POST /check-admin

mod common;

use axum::http::StatusCode;
use common::{
    create_test_app, post_json, unique_email, unique_user_id, TestAppBuilder, TEST_ADMIN_KEY,
};
use domain::models::entitlement::{SubscriptionPlan, Tier};
use serde_json::json;

// =============================================================================
// POST /user-subscription
// =============================================================================

#[tokio::test]
async fn test_first_sight_starts_trial() {
    let app = create_test_app();
    let user_id = unique_user_id();

    let (status, body) = post_json(
        &app.router,
        "/user-subscription",
        json!({"user_id": user_id, "email": unique_email()}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription"], "free-trial");
    assert_eq!(body["is_admin"], false);
    assert!(body["trial_info"]["days_left"].as_i64().unwrap() <= 3);
    assert!(body["trial_info"]["end_date"].as_str().is_some());
    assert!(body.get("basic_info").is_none());
}

#[tokio::test]
async fn test_basic_plan_reports_weekly_allowance() {
    let app = create_test_app();
    let user_id = unique_user_id();
    app.state
        .entitlements
        .set_plan(&user_id, SubscriptionPlan::Basic)
        .await
        .unwrap();

    let (status, _) = post_json(&app.router, "/track-analysis", json!({"user_id": user_id})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app.router,
        "/user-subscription",
        json!({"user_id": user_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription"], "basic");
    assert_eq!(body["basic_info"]["weekly_analyses_left"], 9);
}

#[tokio::test]
async fn test_subscription_rejects_blank_user() {
    let app = create_test_app();

    let (status, body) = post_json(
        &app.router,
        "/user-subscription",
        json!({"user_id": "  "}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

// =============================================================================
// POST /check-usage and /track-analysis
// =============================================================================

#[tokio::test]
async fn test_trial_usage_counts_down_and_denies() {
    let app = create_test_app();
    let user_id = unique_user_id();

    let (_, body) = post_json(&app.router, "/check-usage", json!({"user_id": user_id})).await;
    assert_eq!(body["remaining_analyses"], 3);

    for expected in [2, 1, 0] {
        let (status, body) = post_json(
            &app.router,
            "/track-analysis",
            json!({"user_id": user_id}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["remaining_analyses"], expected);
    }

    let (status, body) = post_json(
        &app.router,
        "/track-analysis",
        json!({"user_id": user_id}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "quota_exceeded");

    let (_, body) = post_json(&app.router, "/check-usage", json!({"user_id": user_id})).await;
    assert_eq!(body["remaining_analyses"], 0);
}

#[tokio::test]
async fn test_pro_plan_is_unlimited() {
    let app = create_test_app();
    let user_id = unique_user_id();
    app.state
        .entitlements
        .set_plan(&user_id, SubscriptionPlan::Pro)
        .await
        .unwrap();

    for _ in 0..5 {
        let (status, body) = post_json(
            &app.router,
            "/track-analysis",
            json!({"user_id": user_id}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"unlimited": true}));
    }

    let (_, body) = post_json(&app.router, "/check-usage", json!({"user_id": user_id})).await;
    assert_eq!(body["remaining_analyses"], "unlimited");
}

#[tokio::test]
async fn test_concurrent_tracking_never_exceeds_trial_cap() {
    let app = create_test_app();
    let user_id = unique_user_id();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let router = app.router.clone();
        let user_id = user_id.clone();
        handles.push(tokio::spawn(async move {
            post_json(&router, "/track-analysis", json!({"user_id": user_id})).await.0
        }));
    }

    let mut ok = 0;
    let mut denied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::FORBIDDEN => denied += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 3);
    assert_eq!(denied, 7);
}

// =============================================================================
// POST /create-checkout-session
// =============================================================================

#[tokio::test]
async fn test_checkout_returns_url_without_changing_plan() {
    let app = create_test_app();
    let user_id = unique_user_id();

    let (status, body) = post_json(
        &app.router,
        "/create-checkout-session",
        json!({"user_id": user_id, "plan": "pro"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["checkout_url"],
        "http://localhost:5173/payment-success?plan=pro"
    );
    assert_eq!(app.state.entitlements.tier(&user_id).await.unwrap(), None);
}

#[tokio::test]
async fn test_checkout_honours_return_url() {
    let app = create_test_app();

    let (status, body) = post_json(
        &app.router,
        "/create-checkout-session",
        json!({
            "user_id": unique_user_id(),
            "plan": "basic",
            "return_url": "https://app.example.com/done"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checkout_url"], "https://app.example.com/done");
}

#[tokio::test]
async fn test_simulated_checkout_confirms_plan() {
    let app = TestAppBuilder::new()
        .config(|c| c.billing.simulate_payments = true)
        .build();
    let user_id = unique_user_id();

    let (status, _) = post_json(
        &app.router,
        "/create-checkout-session",
        json!({"user_id": user_id, "plan": "basic"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.state.entitlements.tier(&user_id).await.unwrap(),
        Some(Tier::Basic)
    );
}

#[tokio::test]
async fn test_simulated_checkout_does_not_downgrade() {
    let app = TestAppBuilder::new()
        .config(|c| c.billing.simulate_payments = true)
        .build();
    let user_id = unique_user_id();
    app.state
        .entitlements
        .set_plan(&user_id, SubscriptionPlan::Pro)
        .await
        .unwrap();

    let (status, _) = post_json(
        &app.router,
        "/create-checkout-session",
        json!({"user_id": user_id, "plan": "basic"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.state.entitlements.tier(&user_id).await.unwrap(),
        Some(Tier::Pro)
    );
}

#[tokio::test]
async fn test_checkout_rejects_unknown_plan() {
    let app = create_test_app();

    let (status, body) = post_json(
        &app.router,
        "/create-checkout-session",
        json!({"user_id": unique_user_id(), "plan": "platinum"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

// =============================================================================
// POST /set-admin and /check-admin
// =============================================================================

#[tokio::test]
async fn test_set_admin_with_valid_key() {
    let app = create_test_app();
    let user_id = unique_user_id();

    let (_, body) = post_json(&app.router, "/check-admin", json!({"user_id": user_id})).await;
    assert_eq!(body["is_admin"], false);

    let (status, body) = post_json(
        &app.router,
        "/set-admin",
        json!({"user_id": user_id, "admin_key": TEST_ADMIN_KEY}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], format!("User {} is now an admin", user_id));

    let (_, body) = post_json(&app.router, "/check-admin", json!({"user_id": user_id})).await;
    assert_eq!(body["is_admin"], true);

    let (_, body) = post_json(&app.router, "/user-subscription", json!({"user_id": user_id})).await;
    assert_eq!(body["subscription"], "pro");
    assert_eq!(body["is_admin"], true);

    let (_, body) = post_json(&app.router, "/check-usage", json!({"user_id": user_id})).await;
    assert_eq!(body["remaining_analyses"], "unlimited");
}

#[tokio::test]
async fn test_set_admin_with_wrong_key() {
    let app = create_test_app();
    let user_id = unique_user_id();

    let (status, body) = post_json(
        &app.router,
        "/set-admin",
        json!({"user_id": user_id, "admin_key": "guess"}),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert!(!app.state.entitlements.is_admin(&user_id).await.unwrap());
}

#[tokio::test]
async fn test_set_admin_disabled_without_configured_key() {
    let app = TestAppBuilder::new()
        .config(|c| c.admin.admin_key.clear())
        .build();

    let (status, _) = post_json(
        &app.router,
        "/set-admin",
        json!({"user_id": unique_user_id(), "admin_key": ""}),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_check_admin_creates_no_state() {
    let app = create_test_app();
    let user_id = unique_user_id();

    let (status, _) = post_json(&app.router, "/check-admin", json!({"user_id": user_id})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.entitlements.tier(&user_id).await.unwrap(), None);
}
