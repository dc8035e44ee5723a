use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::sync_log::{RunCompletion, SyncRun, SyncStatus, SyncType};
use crate::repositories::{StoreResult, SyncLogStore};

/// Token for one sync run. `Detached` means the start row could not be
/// written; completing it is a no-op so the sync itself carries on.
#[derive(Debug, Clone)]
pub enum RunHandle {
    Recorded { id: Uuid, started_at: DateTime<Utc> },
    Detached { started_at: DateTime<Utc> },
}

impl RunHandle {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            RunHandle::Recorded { id, .. } => Some(*id),
            RunHandle::Detached { .. } => None,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        match self {
            RunHandle::Recorded { started_at, .. } | RunHandle::Detached { started_at } => *started_at,
        }
    }

    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at()).num_seconds().max(0)
    }
}

/// Bookkeeping for sync runs, and the source of the incremental watermark.
pub struct SyncRunLog {
    store: Arc<dyn SyncLogStore>,
    lookback: Duration,
    watermark_margin: Duration,
}

impl SyncRunLog {
    pub fn new(store: Arc<dyn SyncLogStore>, lookback: Duration, watermark_margin: Duration) -> Self {
        Self {
            store,
            lookback,
            watermark_margin,
        }
    }

    pub async fn begin(&self, sync_type: SyncType) -> RunHandle {
        let started_at = Utc::now();

        match self.store.insert_run(sync_type, started_at).await {
            Ok(id) => {
                tracing::info!("Sync run {} ({}) started", id, sync_type);
                RunHandle::Recorded { id, started_at }
            }
            Err(e) => {
                tracing::warn!("Could not record start of {} sync run: {}", sync_type, e);
                RunHandle::Detached { started_at }
            }
        }
    }

    pub async fn complete_success(&self, handle: &RunHandle, records_processed: usize) {
        let completed_at = Utc::now();
        self.complete(
            handle,
            RunCompletion {
                status: SyncStatus::Success,
                completed_at,
                duration_seconds: handle.elapsed_seconds(completed_at) as i32,
                records_processed: Some(i32::try_from(records_processed).unwrap_or(i32::MAX)),
                error_message: None,
            },
        )
        .await;
    }

    pub async fn complete_error(&self, handle: &RunHandle, error_message: &str) {
        let completed_at = Utc::now();
        self.complete(
            handle,
            RunCompletion {
                status: SyncStatus::Error,
                completed_at,
                duration_seconds: handle.elapsed_seconds(completed_at) as i32,
                records_processed: None,
                error_message: Some(error_message.to_string()),
            },
        )
        .await;
    }

    async fn complete(&self, handle: &RunHandle, completion: RunCompletion) {
        let RunHandle::Recorded { id, .. } = handle else {
            return;
        };

        match self.store.complete_run(*id, &completion).await {
            Ok(()) => tracing::info!(
                "Sync run {} finished with status {} in {}s",
                id,
                completion.status,
                completion.duration_seconds
            ),
            Err(e) => tracing::error!("Could not record completion of sync run {}: {}", id, e),
        }
    }

    /// Lower bound for the next incremental fetch: the last successful
    /// completion minus the configured margin, or `lookback` before now when
    /// nothing has succeeded yet.
    pub async fn latest_watermark(&self) -> StoreResult<DateTime<Utc>> {
        let watermark = match self.store.latest_success().await? {
            Some(completed_at) => completed_at - self.watermark_margin,
            None => Utc::now() - self.lookback,
        };
        Ok(watermark)
    }

    /// Newest first, at most `limit` runs.
    pub async fn recent_runs(&self, limit: i64) -> StoreResult<Vec<SyncRun>> {
        self.store.recent_runs(limit.clamp(1, 100)).await
    }
}
