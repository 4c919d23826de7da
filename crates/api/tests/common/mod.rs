//! Common test utilities for integration tests.
//!
//! The router is wired with in-memory stores and scripted collaborators, so
//! no network or database is needed.

// Allow dead code in this module - not every test file uses every helper.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use fake::faker::internet::en::{DomainSuffix, FreeEmail, Username};
use fake::Fake;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use domain::models::entitlement::SubscriptionPlan;
use domain::models::snapshot::{Headings, PageSnapshot};
use domain::services::{
    InMemoryEntitlementStore, InMemoryReportStore, MockAudienceMetrics, MockContentExtractor,
    MockGenerationBackend,
};
use siteinsight_api::app::{create_app, AppState, Collaborators};
use siteinsight_api::config::{
    AdminConfig, AnalysisConfig, AudienceConfig, AuthConfig, BillingConfig, Config,
    DatabaseConfig, IdentityProviderConfig, LoggingConfig, OpenAiConfig, SecurityConfig,
    ServerConfig, StorageConfig,
};
use siteinsight_api::services::{PlanSync, PlanSyncError};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-key-0123456789";
pub const TEST_ADMIN_KEY: &str = "test-admin-key";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const TEST_VISITORS: &str = "12,000 visitors/month";

/// Test configuration: memory storage, no rate limit, HS256 tokens.
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: 30,
        },
        storage: StorageConfig::default(),
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            cors_origins: vec![],
            rate_limit_per_minute: 0, // Disable rate limiting for tests
        },
        analysis: AnalysisConfig::default(),
        openai: OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url: "http://127.0.0.1:9/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            system_prompt: String::new(),
        },
        audience: AudienceConfig {
            enabled: false,
            ..AudienceConfig::default()
        },
        auth: AuthConfig {
            hs256_secret: TEST_JWT_SECRET.to_string(),
            roles_claim: "roles".to_string(),
            ..AuthConfig::default()
        },
        billing: BillingConfig {
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            simulate_payments: false,
            app_base_url: "http://localhost:5173".to_string(),
        },
        admin: AdminConfig {
            admin_key: TEST_ADMIN_KEY.to_string(),
        },
        identity_provider: IdentityProviderConfig::default(),
    }
}

/// Plan sync double that records pushes and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingPlanSync {
    pushed: Mutex<Vec<(String, SubscriptionPlan)>>,
    fail: bool,
}

impl RecordingPlanSync {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn pushed(&self) -> Vec<(String, SubscriptionPlan)> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlanSync for RecordingPlanSync {
    async fn push_plan(&self, user_id: &str, plan: SubscriptionPlan) -> Result<(), PlanSyncError> {
        if self.fail {
            return Err(PlanSyncError::ServiceError("HTTP 500: provider down".to_string()));
        }
        self.pushed.lock().unwrap().push((user_id.to_string(), plan));
        Ok(())
    }
}

/// Router plus handles on its scripted collaborators.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub generation: Arc<MockGenerationBackend>,
    pub extractor: Arc<MockContentExtractor>,
    pub plan_sync: Arc<RecordingPlanSync>,
}

pub struct TestAppBuilder {
    config: Config,
    generation: MockGenerationBackend,
    extractor: MockContentExtractor,
    plan_sync: RecordingPlanSync,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            generation: MockGenerationBackend::new(),
            extractor: MockContentExtractor::returning(test_snapshot()),
            plan_sync: RecordingPlanSync::default(),
        }
    }

    pub fn config(mut self, f: impl FnOnce(&mut Config)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn generation(mut self, backend: MockGenerationBackend) -> Self {
        self.generation = backend;
        self
    }

    pub fn extractor(mut self, extractor: MockContentExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn plan_sync(mut self, plan_sync: RecordingPlanSync) -> Self {
        self.plan_sync = plan_sync;
        self
    }

    pub fn build(self) -> TestApp {
        let generation = Arc::new(self.generation);
        let extractor = Arc::new(self.extractor);
        let plan_sync = Arc::new(self.plan_sync);

        let collaborators = Collaborators {
            entitlement_store: Arc::new(InMemoryEntitlementStore::new()),
            report_store: Arc::new(InMemoryReportStore::new()),
            generation: generation.clone(),
            extractor: extractor.clone(),
            audience: Arc::new(MockAudienceMetrics::new(TEST_VISITORS)),
            plan_sync: plan_sync.clone(),
        };
        let state = AppState::new(self.config, collaborators).expect("valid test state");

        TestApp {
            router: create_app(state.clone()),
            state,
            generation,
            extractor,
            plan_sync,
        }
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test application.
pub fn create_test_app() -> TestApp {
    TestAppBuilder::new().build()
}

pub fn test_snapshot() -> PageSnapshot {
    PageSnapshot {
        title: "Acme Shoes".to_string(),
        meta_description: "Shoes for everyone".to_string(),
        headings: Headings {
            h1: vec!["Best shoes".to_string()],
            h2: vec!["New arrivals".to_string()],
        },
        navigation: vec!["Home".to_string(), "Shop".to_string()],
        buttons: vec!["Buy now".to_string()],
        links: vec!["Home".to_string(), "Shop".to_string(), "About".to_string()],
        markup: "<html><title>Acme Shoes</title></html>".to_string(),
        ..Default::default()
    }
}

/// Random user identifier in the identity provider's format.
pub fn unique_user_id() -> String {
    let name: String = Username().fake();
    format!("auth0|{}-{}", name, uuid::Uuid::new_v4().simple())
}

pub fn unique_email() -> String {
    FreeEmail().fake()
}

pub fn random_site_url() -> String {
    let name: String = Username().fake();
    let label: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase();
    let suffix: String = DomainSuffix().fake();
    format!("https://shop-{}.{}", label, suffix)
}

/// HS256 token with the given subject, plan claim and roles.
pub fn mint_token(subject: &str, plan: Option<&str>, roles: &[&str]) -> String {
    let mut claims = json!({
        "sub": subject,
        "exp": chrono::Utc::now().timestamp() + 3600,
        "roles": roles,
    });
    if let Some(plan) = plan {
        claims["plan"] = json!(plan);
    }
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn json_request_with_auth(
    method: Method,
    uri: &str,
    body: Value,
    token: &str,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get_request_with_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub async fn parse_response_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    }
}

/// Sends a request and returns status and JSON body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, parse_response_body(response).await)
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, json_request(Method::POST, uri, body)).await
}
