use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Initial,
    Incremental,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::Initial => "initial",
            SyncType::Incremental => "incremental",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(SyncType::Initial),
            "incremental" => Ok(SyncType::Incremental),
            other => Err(format!("unknown sync type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Running => "running",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncStatus::Running)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // older rows written by the web cron use "processing"
            "running" | "processing" => Ok(SyncStatus::Running),
            "success" => Ok(SyncStatus::Success),
            "error" => Ok(SyncStatus::Error),
            other => Err(format!("unknown sync status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i32>,
    pub records_processed: Option<i32>,
    pub error_message: Option<String>,
}

/// The single terminal update applied to a running `SyncRun`.
#[derive(Debug, Clone)]
pub struct RunCompletion {
    pub status: SyncStatus,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: i32,
    pub records_processed: Option<i32>,
    pub error_message: Option<String>,
}

/// Outcome of one catalog sync run, returned to the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub sync_type: SyncType,
    pub run_id: Option<Uuid>,
    pub categories_processed: usize,
    pub records_processed: usize,
    pub duration_seconds: i64,
}
