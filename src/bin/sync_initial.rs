//! Full catalog refresh: categories plus every sellable product.
//! Meant for the scheduler; exits non-zero when the run ends in error.

use giofarma_catalog::config::AppConfig;
use giofarma_catalog::{bootstrap, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing();

    let state = bootstrap(&config).await?;
    let report = state.catalog_sync.run_full().await?;

    tracing::info!(
        "✅ Full sync finished: {} categories, {} products in {}s",
        report.categories_processed,
        report.records_processed,
        report.duration_seconds
    );

    Ok(())
}
