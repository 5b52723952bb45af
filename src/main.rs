use energy_dashboard::{
    router,
    storage::{JsonFileStore, KeyValueStore},
    AppState, ConsumptionApi, Settings,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::fs;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let settings = Settings::from_env();
    if let Some(parent) = settings.data_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(settings.data_path.clone()).await);
    let api = ConsumptionApi::new(&settings.api_url, settings.cache_ttl, settings.request_timeout)?;
    info!(
        upstream = %settings.api_url,
        cache_ttl_secs = settings.cache_ttl.as_secs(),
        "consumption api configured"
    );

    let app = router(AppState::new(api, store));
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
