pub mod catalog_sync_service;
pub mod erp;
pub mod order_bridge_service;
pub mod sync_log_service;

pub use catalog_sync_service::{CatalogSyncService, SyncError};
pub use order_bridge_service::{OrderBridgeService, OrderError, ORDER_ORIGIN};
pub use sync_log_service::{RunHandle, SyncRunLog};
