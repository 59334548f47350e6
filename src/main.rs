use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use kcore_api_rust::config::{config, SecurityConfig};
use kcore_api_rust::database::models::load_registry;
use kcore_api_rust::database::{DatabaseGateway, DatabaseManager, PgGateway};
use kcore_api_rust::handlers::{router, AppState};
use kcore_api_rust::middleware::IdentityHeaders;
use kcore_api_rust::services::ResourceService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, KCORE_CATALOG, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config();
    tracing::info!("Starting kcore API in {:?} mode", config.environment);

    let registry = load_registry(config.api.catalog_path.as_deref()).context("loading descriptor catalog")?;
    tracing::info!(resources = registry.resource_names().len(), "Descriptor catalog loaded");

    let pool = DatabaseManager::connect(&config.database).await?;
    let db: Arc<dyn DatabaseGateway> = Arc::new(PgGateway::new(pool, config.database.clone()));
    let service = ResourceService::new(Arc::new(registry), db.clone(), config.filter.clone());

    let mut app = router(AppState::new(service, db), IdentityHeaders::from_config(&config.security))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));
    if config.security.enable_cors {
        app = app.layer(cors_layer(&config.security));
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("kcore API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server")?;
    Ok(())
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security.cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
