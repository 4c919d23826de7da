use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::{
    AnalysisPipeline, AudienceMetrics, ContentExtractor, EntitlementService, EntitlementStore,
    FanOut, GenerationBackend, PromptBuilder, ReportService, ReportStore, DEFAULT_SYSTEM_PROMPT,
};
use shared::jwt::{JwtError, TokenVerifier};

use crate::config::{AuthConfig, Config};
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, security_headers_middleware,
    trace_id, RateLimiterState,
};
use crate::routes::{analysis, billing, health, reports, users};
use crate::services::PlanSync;

/// Outbound collaborators and stores the application is wired with.
pub struct Collaborators {
    pub entitlement_store: Arc<dyn EntitlementStore>,
    pub report_store: Arc<dyn ReportStore>,
    pub generation: Arc<dyn GenerationBackend>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub audience: Arc<dyn AudienceMetrics>,
    pub plan_sync: Arc<dyn PlanSync>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub entitlements: Arc<EntitlementService>,
    pub reports: ReportService,
    pub pipeline: Arc<AnalysisPipeline>,
    pub plan_sync: Arc<dyn PlanSync>,
    pub token_verifier: Option<Arc<TokenVerifier>>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self, JwtError> {
        let system_prompt = if config.openai.system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            config.openai.system_prompt.clone()
        };

        let fanout = FanOut::new(collaborators.generation, system_prompt).with_timeout(
            Duration::from_secs(config.analysis.generation_timeout_secs),
        );
        let pipeline = AnalysisPipeline::new(
            collaborators.extractor,
            collaborators.audience,
            fanout,
            PromptBuilder::new(config.analysis.language.clone()),
        )
        .with_page_timeout(Duration::from_secs(config.analysis.page_timeout_secs));

        let token_verifier = build_token_verifier(&config.auth)?.map(Arc::new);
        if token_verifier.is_none() {
            tracing::warn!(
                "No token verification key configured, report endpoints will reject all requests"
            );
        }

        let rate_limiter =
            RateLimiterState::new(config.security.rate_limit_per_minute).map(Arc::new);

        Ok(Self {
            config: Arc::new(config),
            entitlements: Arc::new(EntitlementService::new(collaborators.entitlement_store)),
            reports: ReportService::new(collaborators.report_store),
            pipeline: Arc::new(pipeline),
            plan_sync: collaborators.plan_sync,
            token_verifier,
            rate_limiter,
        })
    }
}

/// RS256 when a public key is configured, else HS256 with the shared
/// secret, else none.
pub fn build_token_verifier(auth: &AuthConfig) -> Result<Option<TokenVerifier>, JwtError> {
    let verifier = if !auth.public_key.trim().is_empty() {
        TokenVerifier::rs256(&auth.public_key)?
    } else if !auth.hs256_secret.is_empty() {
        TokenVerifier::hs256(&auth.hs256_secret)?
    } else {
        return Ok(None);
    };

    let mut verifier = verifier
        .with_roles_claim(auth.roles_claim.clone())
        .with_leeway(auth.leeway_secs);
    if !auth.issuer.is_empty() {
        verifier = verifier.with_issuer(auth.issuer.clone());
    }
    if !auth.audience.is_empty() {
        verifier = verifier.with_audience(auth.audience.clone());
    }
    Ok(Some(verifier))
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // The analysis route is the expensive one; only it is rate limited
    let analysis_routes = Router::new()
        .route("/get_suggestions", post(analysis::get_suggestions))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let user_routes = Router::new()
        .route("/user-subscription", post(users::user_subscription))
        .route("/check-usage", post(users::check_usage))
        .route("/track-analysis", post(users::track_analysis))
        .route("/create-checkout-session", post(users::create_checkout_session))
        .route("/set-admin", post(users::set_admin))
        .route("/check-admin", post(users::check_admin))
        .route("/webhook", post(billing::payment_webhook));

    // Bearer-token routes; the extractor rejects unauthenticated calls
    let report_routes = Router::new()
        .route(
            "/reports",
            post(reports::save_report).get(reports::list_reports),
        )
        .route("/reports/:id", get(reports::get_report));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/live", get(health::live))
        .route("/api/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(analysis_routes)
        .merge(user_routes)
        .merge(report_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
