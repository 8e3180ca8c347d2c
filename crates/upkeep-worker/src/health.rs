//! Per-job liveness published to the health endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

/// Scheduling state of a job as seen from outside the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Scheduled and firing on its cadence.
    Running,
    /// Disabled, or the scheduler has shut down.
    Stopped,
    /// Not registered, or the scheduler has not started yet.
    Unknown,
}

/// Health record for one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobHealth {
    /// Job name.
    pub name: String,
    /// Cron expression.
    pub schedule: String,
    /// Scheduling state.
    pub state: JobState,
    /// Whether a run is executing in this process right now.
    pub in_progress: bool,
    /// Start of the most recent run.
    pub last_started_at: Option<DateTime<Utc>>,
    /// End of the most recent run.
    pub last_finished_at: Option<DateTime<Utc>>,
    /// Outcome label of the most recent run.
    pub last_outcome: Option<String>,
    /// Summary or error detail of the most recent run.
    pub last_detail: Option<Value>,
    /// Runs finished since startup.
    pub runs: u64,
    /// Runs that failed, timed out or panicked since startup.
    pub failures: u64,
}

impl JobHealth {
    fn new(name: &str, schedule: &str, state: JobState) -> Self {
        Self {
            name: name.to_string(),
            schedule: schedule.to_string(),
            state,
            in_progress: false,
            last_started_at: None,
            last_finished_at: None,
            last_outcome: None,
            last_detail: None,
            runs: 0,
            failures: 0,
        }
    }
}

/// Shared registry of [`JobHealth`] records.
#[derive(Debug, Clone, Default)]
pub struct JobHealthRegistry {
    inner: Arc<RwLock<HashMap<String, JobHealth>>>,
}

impl JobHealthRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job. Enabled jobs start as `Unknown` until scheduled.
    pub async fn register(&self, name: &str, schedule: &str, enabled: bool) {
        let state = if enabled {
            JobState::Unknown
        } else {
            JobState::Stopped
        };
        self.inner
            .write()
            .await
            .insert(name.to_string(), JobHealth::new(name, schedule, state));
    }

    /// Mark a job as scheduled.
    pub async fn mark_running(&self, name: &str) {
        if let Some(health) = self.inner.write().await.get_mut(name) {
            health.state = JobState::Running;
        }
    }

    /// Mark every job as stopped.
    pub async fn mark_all_stopped(&self) {
        for health in self.inner.write().await.values_mut() {
            health.state = JobState::Stopped;
        }
    }

    /// Record the start of a run.
    pub async fn run_started(&self, name: &str, at: DateTime<Utc>) {
        if let Some(health) = self.inner.write().await.get_mut(name) {
            health.in_progress = true;
            health.last_started_at = Some(at);
        }
    }

    /// Record the end of a run.
    pub async fn run_finished(
        &self,
        name: &str,
        at: DateTime<Utc>,
        outcome: &str,
        failed: bool,
        detail: Option<Value>,
    ) {
        if let Some(health) = self.inner.write().await.get_mut(name) {
            health.in_progress = false;
            health.last_finished_at = Some(at);
            health.last_outcome = Some(outcome.to_string());
            health.last_detail = detail;
            health.runs += 1;
            if failed {
                health.failures += 1;
            }
        }
    }

    /// Current state of one job; `Unknown` if it is not registered.
    pub async fn state(&self, name: &str) -> JobState {
        self.inner
            .read()
            .await
            .get(name)
            .map(|h| h.state)
            .unwrap_or(JobState::Unknown)
    }

    /// Health record of one job.
    pub async fn get(&self, name: &str) -> Option<JobHealth> {
        self.inner.read().await.get(name).cloned()
    }

    /// All records, ordered by name.
    pub async fn snapshot(&self) -> Vec<JobHealth> {
        let mut jobs: Vec<JobHealth> = self.inner.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        jobs
    }

    /// Whether any run is executing in this process.
    pub async fn any_in_progress(&self) -> bool {
        self.inner.read().await.values().any(|h| h.in_progress)
    }
}
