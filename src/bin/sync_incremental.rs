//! Products changed since the last successful run.

use giofarma_catalog::config::AppConfig;
use giofarma_catalog::{bootstrap, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing();

    let state = bootstrap(&config).await?;
    let report = state.catalog_sync.run_incremental().await?;

    tracing::info!(
        "✅ Incremental sync finished: {} products in {}s",
        report.records_processed,
        report.duration_seconds
    );

    Ok(())
}
