pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::SyncSettings;
use crate::repositories::{
    CatalogRepository, CatalogStore, MemoryStore, OrderRepository, OrderStore, SyncLogRepository, SyncLogStore,
};
use crate::services::erp::OdooClient;
use crate::services::{CatalogSyncService, OrderBridgeService, SyncRunLog};

/// The three stores behind the services, as trait objects.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub sync_log: Arc<dyn SyncLogStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            catalog: Arc::new(CatalogRepository::new(pool.clone())),
            sync_log: Arc::new(SyncLogRepository::new(pool.clone())),
            orders: Arc::new(OrderRepository::new(pool)),
        }
    }

    /// All three backed by one in-process store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            catalog: store.clone(),
            sync_log: store.clone(),
            orders: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub catalog_sync: Arc<CatalogSyncService>,
    pub orders: Arc<OrderBridgeService>,
    pub cron_secret: Option<String>,
}

impl AppState {
    /// One Odoo client and session shared by the sync engine and the order bridge.
    pub fn new(odoo: Arc<OdooClient>, stores: Stores, settings: SyncSettings, cron_secret: Option<String>) -> Self {
        let run_log = SyncRunLog::new(stores.sync_log.clone(), settings.lookback, settings.watermark_margin);
        let catalog_sync = CatalogSyncService::new(odoo.clone(), stores.catalog.clone(), run_log, settings);

        Self {
            catalog: stores.catalog,
            catalog_sync: Arc::new(catalog_sync),
            orders: Arc::new(OrderBridgeService::new(odoo, stores.orders)),
            cron_secret,
        }
    }
}

pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    use crate::handlers::{
        catalog::{list_categories, list_products},
        health::health_check,
        orders::{create_order, list_orders, IDEMPOTENCY_KEY_HEADER},
        sync::{sync_history, trigger_sync},
    };
    use crate::middleware::{cron_auth_middleware, request_id_middleware};

    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(IDEMPOTENCY_KEY_HEADER),
        ]);

    let sync_routes = Router::new()
        .route("/sync", get(trigger_sync))
        .route("/sync/runs", get(sync_history))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), cron_auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api",
            Router::new()
                .route("/products", get(list_products))
                .route("/categories", get(list_categories))
                .route("/orders", get(list_orders).post(create_order))
                .merge(sync_routes),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// `RUST_LOG` wins; otherwise debug for this crate and tower_http.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "giofarma_catalog=debug,tower_http=debug,sqlx=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Database pool, migrations and services for a process started from `config`.
pub async fn bootstrap(config: &config::AppConfig) -> anyhow::Result<AppState> {
    use anyhow::Context;

    let pool = crate::config::database::create_pool(&config.database)
        .await
        .context("connecting to the catalog database")?;
    crate::config::database::run_migrations(&pool).await.context("running migrations")?;
    tracing::info!("✅ Database ready");

    // Odoo settings are checked on first use, so the storefront can serve
    // the mirrored catalog even while the ERP is misconfigured.
    let odoo = Arc::new(OdooClient::from_config(config.odoo.clone())?);

    Ok(AppState::new(
        odoo,
        Stores::postgres(pool),
        config.sync.clone(),
        config.cron_secret.clone(),
    ))
}
