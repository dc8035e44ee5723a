use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{query, PgPool, Row};
use uuid::Uuid;

use super::{StoreError, StoreResult, SyncLogStore};
use crate::models::sync_log::{RunCompletion, SyncRun, SyncStatus, SyncType};

pub struct SyncLogRepository {
    pool: PgPool,
}

impl SyncLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn run_from_row(row: &PgRow) -> StoreResult<SyncRun> {
    let sync_type: String = row.try_get("sync_type")?;
    let status: String = row.try_get("status")?;

    Ok(SyncRun {
        id: row.try_get("id")?,
        sync_type: sync_type.parse().map_err(StoreError::Corrupt)?,
        status: status.parse().map_err(StoreError::Corrupt)?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        duration_seconds: row.try_get("duration_seconds")?,
        records_processed: row.try_get("records_processed")?,
        error_message: row.try_get("error_message")?,
    })
}

#[async_trait]
impl SyncLogStore for SyncLogRepository {
    async fn insert_run(&self, sync_type: SyncType, started_at: DateTime<Utc>) -> StoreResult<Uuid> {
        let row = query(
            r#"
            INSERT INTO sync_log (id, sync_type, status, started_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#
        )
        .bind(Uuid::new_v4())
        .bind(sync_type.as_str())
        .bind(SyncStatus::Running.as_str())
        .bind(started_at)
        .fetch_one(&self.pool)
        .await?;

        let id: Uuid = row.try_get("id")?;
        Ok(id)
    }

    async fn complete_run(&self, id: Uuid, completion: &RunCompletion) -> StoreResult<()> {
        let result = query(
            r#"
            UPDATE sync_log
            SET status = $2,
                completed_at = $3,
                duration_seconds = $4,
                records_processed = $5,
                error_message = $6
            WHERE id = $1 AND completed_at IS NULL
            "#
        )
        .bind(id)
        .bind(completion.status.as_str())
        .bind(completion.completed_at)
        .bind(completion.duration_seconds)
        .bind(completion.records_processed)
        .bind(&completion.error_message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("running sync run {}", id)));
        }

        Ok(())
    }

    async fn latest_success(&self) -> StoreResult<Option<DateTime<Utc>>> {
        let row = query(
            r#"
            SELECT completed_at FROM sync_log
            WHERE status = 'success' AND completed_at IS NOT NULL
            ORDER BY completed_at DESC
            LIMIT 1
            "#
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("completed_at")?)),
            None => Ok(None),
        }
    }

    async fn recent_runs(&self, limit: i64) -> StoreResult<Vec<SyncRun>> {
        let rows = query(
            r#"
            SELECT id, sync_type, status, started_at, completed_at, duration_seconds,
                   records_processed, error_message
            FROM sync_log
            ORDER BY started_at DESC
            LIMIT $1
            "#
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(run_from_row).collect()
    }
}
