// Catalog Sync Service
// Pulls categories and products from Odoo into the local catalog.
// Every run is bracketed by exactly one sync_log row that ends in success or error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::SyncSettings;
use crate::models::catalog::{CategoryUpsert, ProductUpsert};
use crate::models::odoo::{OdooCategory, OdooProduct};
use crate::models::sync_log::{SyncReport, SyncRun, SyncType};
use crate::repositories::{CatalogStore, StoreError};
use crate::services::erp::entity_mapper::{self, ImageMode, PRODUCT_MODEL};
use crate::services::erp::{OdooClient, OdooError};
use crate::services::sync_log_service::{RunHandle, SyncRunLog};

const CATEGORY_MODEL: &str = "product.category";

const CATEGORY_FIELDS: &[&str] = &["id", "name", "parent_id"];

const LISTING_FIELDS: &[&str] = &[
    "id", "name", "default_code", "list_price", "qty_available", "virtual_available",
    "description_sale", "categ_id", "uom_id", "write_date",
];

const DETAIL_FIELDS: &[&str] = &[
    "id", "name", "default_code", "list_price", "standard_price", "qty_available",
    "virtual_available", "description_sale", "categ_id", "uom_id", "write_date",
    "active", "image_1920",
];

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Odoo error: {0}")]
    Remote(#[from] OdooError),

    #[error("Local storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

struct RunCounts {
    categories: usize,
    products: usize,
}

pub struct CatalogSyncService {
    odoo: Arc<OdooClient>,
    catalog: Arc<dyn CatalogStore>,
    run_log: SyncRunLog,
    settings: SyncSettings,
}

impl CatalogSyncService {
    pub fn new(
        odoo: Arc<OdooClient>,
        catalog: Arc<dyn CatalogStore>,
        run_log: SyncRunLog,
        settings: SyncSettings,
    ) -> Self {
        Self {
            odoo,
            catalog,
            run_log,
            settings,
        }
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Categories, then every active sellable product, listing-mode images.
    pub async fn run_full(&self) -> Result<SyncReport> {
        let handle = self.run_log.begin(SyncType::Initial).await;
        let outcome = self.pull_full_catalog().await;
        self.finish(SyncType::Initial, handle, outcome).await
    }

    /// Products written since the watermark, detail-mode images.
    pub async fn run_incremental(&self) -> Result<SyncReport> {
        let handle = self.run_log.begin(SyncType::Incremental).await;
        let outcome = self.pull_updated_products().await;
        self.finish(SyncType::Incremental, handle, outcome).await
    }

    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<SyncRun>> {
        Ok(self.run_log.recent_runs(limit).await?)
    }

    async fn finish(
        &self,
        sync_type: SyncType,
        handle: RunHandle,
        outcome: Result<RunCounts>,
    ) -> Result<SyncReport> {
        match outcome {
            Ok(counts) => {
                self.run_log.complete_success(&handle, counts.products).await;
                Ok(SyncReport {
                    sync_type,
                    run_id: handle.id(),
                    categories_processed: counts.categories,
                    records_processed: counts.products,
                    duration_seconds: handle.elapsed_seconds(Utc::now()),
                })
            }
            Err(e) => {
                tracing::error!("{} sync failed: {}", sync_type, e);
                self.run_log.complete_error(&handle, &e.to_string()).await;
                Err(e)
            }
        }
    }

    // ========================================================================
    // Run bodies
    // ========================================================================

    async fn pull_full_catalog(&self) -> Result<RunCounts> {
        let categories = self.sync_categories().await?;

        let mode = ImageMode::Listing {
            base_url: self.odoo.base_url().to_string(),
        };
        let domain = json!([["sale_ok", "=", true], ["active", "=", true]]);
        let products = self
            .sync_products_paged(domain, LISTING_FIELDS, Map::new(), &mode)
            .await?;

        Ok(RunCounts { categories, products })
    }

    async fn pull_updated_products(&self) -> Result<RunCounts> {
        let watermark = self.run_log.latest_watermark().await?;
        tracing::info!("Fetching products modified since {}", watermark);

        let domain = json!([["write_date", ">=", entity_mapper::format_odoo_datetime(watermark)]]);
        // archived products must come through so they are marked inactive
        let mut context = Map::new();
        context.insert("context".to_string(), json!({"active_test": false}));

        let products = self
            .sync_products_paged(domain, DETAIL_FIELDS, context, &ImageMode::Detail)
            .await?;

        if products == 0 {
            tracing::info!("No products changed since {}", watermark);
        }

        Ok(RunCounts { categories: 0, products })
    }

    async fn sync_categories(&self) -> Result<usize> {
        let mut kwargs = Map::new();
        kwargs.insert("fields".to_string(), json!(CATEGORY_FIELDS));

        let records: Vec<OdooCategory> = self
            .odoo
            .search_read(CATEGORY_MODEL, json!([]), kwargs)
            .await?;
        tracing::info!("Fetched {} categories", records.len());

        let rows: Vec<CategoryUpsert> = records.iter().map(entity_mapper::map_category).collect();
        self.catalog.upsert_categories(&rows).await?;

        Ok(rows.len())
    }

    /// Fetch pages of `page_size` until a short or empty page, upserting each
    /// page before requesting the next.
    async fn sync_products_paged(
        &self,
        domain: Value,
        fields: &[&str],
        extra_kwargs: Map<String, Value>,
        mode: &ImageMode,
    ) -> Result<usize> {
        let page_size = self.settings.page_size.max(1);
        let mut offset: i64 = 0;
        let mut processed = 0;

        loop {
            let mut kwargs = extra_kwargs.clone();
            kwargs.insert("fields".to_string(), json!(fields));
            kwargs.insert("limit".to_string(), json!(page_size));
            kwargs.insert("offset".to_string(), json!(offset));
            kwargs.insert("order".to_string(), json!("id asc"));

            let records: Vec<OdooProduct> = self
                .odoo
                .search_read(PRODUCT_MODEL, domain.clone(), kwargs)
                .await?;

            if records.is_empty() {
                break;
            }

            let fetched_at = Utc::now();
            let rows = map_products(&records, mode, fetched_at);
            self.catalog.upsert_products(&rows).await?;

            processed += rows.len();
            tracing::debug!("Product page {}..{} upserted", offset, offset + rows.len() as i64);

            if (records.len() as i64) < page_size {
                break;
            }
            offset += page_size;
        }

        Ok(processed)
    }
}

fn map_products(records: &[OdooProduct], mode: &ImageMode, fetched_at: DateTime<Utc>) -> Vec<ProductUpsert> {
    records
        .iter()
        .map(|record| entity_mapper::map_product(record, mode, fetched_at))
        .collect()
}
