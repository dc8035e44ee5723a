use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::middleware::error_handling::{AppError, Result};
use crate::models::sync_log::{SyncRun, SyncType};
use crate::AppState;

#[derive(Debug, Default, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Full,
    Incremental,
}

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    #[serde(default)]
    pub mode: SyncMode,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub sync_type: SyncType,
    pub processed: usize,
    pub duration: String,
}

/// Scheduler entry point. Gated by `cron_auth_middleware`.
pub async fn trigger_sync(
    State(state): State<AppState>,
    params: std::result::Result<Query<SyncParams>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<SyncResponse>> {
    let Query(params) = params.map_err(|_| AppError::BadRequest("mode must be full or incremental".to_string()))?;

    let report = match params.mode {
        SyncMode::Full => state.catalog_sync.run_full().await?,
        SyncMode::Incremental => state.catalog_sync.run_incremental().await?,
    };

    Ok(Json(SyncResponse {
        success: true,
        sync_type: report.sync_type,
        processed: report.records_processed,
        duration: format!("{}s", report.duration_seconds),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SyncHistoryParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SyncHistoryResponse {
    pub success: bool,
    pub data: Vec<SyncRun>,
}

/// Recent sync runs for operators, newest first.
pub async fn sync_history(
    State(state): State<AppState>,
    params: std::result::Result<Query<SyncHistoryParams>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<SyncHistoryResponse>> {
    let Query(params) = params.map_err(|_| AppError::BadRequest("limit must be a number".to_string()))?;

    let runs = state.catalog_sync.recent_runs(params.limit.unwrap_or(20)).await?;

    Ok(Json(SyncHistoryResponse {
        success: true,
        data: runs,
    }))
}
