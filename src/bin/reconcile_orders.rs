//! Restore local records for web orders that exist only in Odoo.
//!
//! Usage: `reconcile_orders [HOURS]` (default 24) looks back that many hours.

use anyhow::Context;
use chrono::{Duration, Utc};

use giofarma_catalog::config::AppConfig;
use giofarma_catalog::{bootstrap, init_tracing};

const DEFAULT_LOOKBACK_HOURS: i64 = 24;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing();

    let hours = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<i64>().with_context(|| format!("invalid lookback hours '{}'", arg))?,
        None => DEFAULT_LOOKBACK_HOURS,
    };
    let since = Utc::now() - Duration::hours(hours.max(1));

    let state = bootstrap(&config).await?;
    let report = state.orders.reconcile_remote_orders(since).await?;

    tracing::info!(
        "✅ Reconciled since {}: {} examined, {} restored, {} skipped without email, {} without lines",
        since,
        report.examined,
        report.restored,
        report.skipped_without_email,
        report.skipped_without_lines
    );
    if report.duplicate_remote_orders > 0 {
        tracing::warn!("{} duplicate Odoo orders need manual review", report.duplicate_remote_orders);
    }

    Ok(())
}
