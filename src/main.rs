use giofarma_catalog::config::AppConfig;
use giofarma_catalog::{bootstrap, create_router, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing();

    if config.cron_secret.is_none() {
        tracing::warn!("⚠️  CRON_SECRET is not set - /api/sync is open to anyone");
    }

    let state = bootstrap(&config).await?;
    let app = create_router(state, &config.cors_origins);

    let addr = config.server_address();
    tracing::info!("Starting GioFarma catalog server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
