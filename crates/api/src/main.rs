use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use domain::services::{
    EntitlementStore, InMemoryEntitlementStore, InMemoryReportStore, ReportStore,
};
use persistence::repositories::{EntitlementRepository, SavedReportRepository};
use siteinsight_api::app::{create_app, AppState, Collaborators};
use siteinsight_api::config::{Config, StorageBackend};
use siteinsight_api::middleware;
use siteinsight_api::services::{
    AudienceClient, HttpPageExtractor, ManagementApiClient, OpenAiClient,
};

async fn open_stores(config: &Config) -> Result<(Arc<dyn EntitlementStore>, Arc<dyn ReportStore>)> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage, entitlements and reports are lost on restart");
            Ok((
                Arc::new(InMemoryEntitlementStore::new()),
                Arc::new(InMemoryReportStore::new()),
            ))
        }
        StorageBackend::Postgres => {
            let pool = persistence::db::create_pool(&config.pool_config()).await?;

            info!("Running database migrations...");
            persistence::db::run_migrations(&pool).await?;
            info!("Migrations completed");

            let metrics_pool = pool.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(60));
                loop {
                    ticker.tick().await;
                    persistence::metrics::record_pool_metrics(&metrics_pool);
                }
            });

            Ok((
                Arc::new(EntitlementRepository::new(pool.clone())),
                Arc::new(SavedReportRepository::new(pool)),
            ))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting SiteInsight API v{}", env!("CARGO_PKG_VERSION"));

    let (entitlement_store, report_store) = open_stores(&config).await?;

    let generation = OpenAiClient::new(
        config.openai.clone(),
        Duration::from_secs(config.analysis.generation_timeout_secs),
    )?;
    let extractor = HttpPageExtractor::new(Duration::from_secs(config.analysis.page_timeout_secs))?;
    let audience = AudienceClient::new(&config.audience)?;
    let plan_sync = ManagementApiClient::new(&config.identity_provider)?;
    if !plan_sync.is_configured() {
        warn!("Identity provider not configured, confirmed plans stay local");
    }

    let collaborators = Collaborators {
        entitlement_store,
        report_store,
        generation: Arc::new(generation),
        extractor: Arc::new(extractor),
        audience: Arc::new(audience),
        plan_sync: Arc::new(plan_sync),
    };

    let addr = config.socket_addr();
    let state = AppState::new(config, collaborators)?;
    let app = create_app(state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
