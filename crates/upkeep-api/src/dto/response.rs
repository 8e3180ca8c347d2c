//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use upkeep_worker::{JobHealth, JobState};

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Process health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable.
    pub status: String,
    /// Version.
    pub version: String,
    /// Uptime.
    pub uptime_seconds: u64,
    /// Database status.
    pub database: String,
}

/// Health of one scheduled job.
#[derive(Debug, Clone, Serialize)]
pub struct JobHealthResponse {
    /// Job name.
    pub name: String,
    /// Cron expression.
    pub schedule: String,
    /// `running`, `stopped` or `unknown`.
    pub state: JobState,
    /// Whether a run is executing in this process.
    pub in_progress: bool,
    /// Start of the most recent run.
    pub last_started_at: Option<DateTime<Utc>>,
    /// End of the most recent run.
    pub last_finished_at: Option<DateTime<Utc>>,
    /// Outcome label of the most recent run.
    pub last_outcome: Option<String>,
    /// Summary or error of the most recent run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_detail: Option<serde_json::Value>,
    /// Finished runs since startup.
    pub runs: u64,
    /// Failed runs since startup.
    pub failures: u64,
}

impl From<JobHealth> for JobHealthResponse {
    fn from(h: JobHealth) -> Self {
        Self {
            name: h.name,
            schedule: h.schedule,
            state: h.state,
            in_progress: h.in_progress,
            last_started_at: h.last_started_at,
            last_finished_at: h.last_finished_at,
            last_outcome: h.last_outcome,
            last_detail: h.last_detail,
            runs: h.runs,
            failures: h.failures,
        }
    }
}
