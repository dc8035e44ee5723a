pub mod catalog_repo;
pub mod memory_repo;
pub mod order_repo;
pub mod sync_log_repo;

pub use catalog_repo::*;
pub use memory_repo::*;
pub use order_repo::*;
pub use sync_log_repo::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::catalog::{Category, CategoryUpsert, ProductPage, ProductQuery, ProductUpsert};
use crate::models::order::{Customer, CustomerUpsert, NewOrder, NewOrderLine, Order, OrderWithLines};
use crate::models::sync_log::{RunCompletion, SyncRun, SyncType};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Duplicate {0}")]
    Conflict(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Mirrored catalog. Upserts are keyed by `odoo_id`.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns the number of rows written.
    async fn upsert_categories(&self, rows: &[CategoryUpsert]) -> StoreResult<u64>;

    async fn upsert_products(&self, rows: &[ProductUpsert]) -> StoreResult<u64>;

    /// Active categories ordered by name.
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;

    /// Active products ordered by name, with the total match count.
    async fn search_products(&self, query: &ProductQuery) -> StoreResult<ProductPage>;
}

#[async_trait]
pub trait SyncLogStore: Send + Sync {
    async fn insert_run(&self, sync_type: SyncType, started_at: DateTime<Utc>) -> StoreResult<Uuid>;

    async fn complete_run(&self, id: Uuid, completion: &RunCompletion) -> StoreResult<()>;

    /// `completed_at` of the most recent successful run.
    async fn latest_success(&self) -> StoreResult<Option<DateTime<Utc>>>;

    async fn recent_runs(&self, limit: i64) -> StoreResult<Vec<SyncRun>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert or update by email.
    async fn upsert_customer(&self, customer: &CustomerUpsert) -> StoreResult<Customer>;

    /// Header and lines are written in one transaction.
    async fn insert_order(&self, order: &NewOrder, lines: &[NewOrderLine]) -> StoreResult<Order>;

    async fn find_order_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Order>>;

    async fn find_order_by_remote_id(&self, odoo_id: i64) -> StoreResult<Option<Order>>;

    /// Newest first.
    async fn orders_by_email(&self, email: &str) -> StoreResult<Vec<OrderWithLines>>;
}
