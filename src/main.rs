use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use courier::agent::{LegacyAdapter, ManagementAgent};
use courier::api::{create_management_router, ManagementAppState};
use courier::config::CourierConfig;
use courier::store::EntityStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=info".into()),
        )
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "courier.toml".to_string());
    let config = CourierConfig::load(Path::new(&config_path))?;
    info!(config = %config_path, "Courier starting...");

    let registry = Arc::new(config.build_registry()?);
    let store = Arc::new(EntityStore::new());
    config.seed(&registry, &store)?;

    let state = Arc::new(ManagementAppState {
        agent: ManagementAgent::new(registry.clone(), store.clone()),
        legacy: LegacyAdapter::new(registry, store),
    });
    let app = create_management_router(state);

    let listener = tokio::net::TcpListener::bind(&config.management.listen)
        .await
        .with_context(|| format!("Failed to bind management endpoint {}", config.management.listen))?;
    info!(listen = %config.management.listen, "Management endpoints ready");
    axum::serve(listener, app)
        .await
        .context("Management endpoint server failed")?;

    Ok(())
}
