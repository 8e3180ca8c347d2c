//! Job inspection and one-off runs.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use upkeep_core::config::AppConfig;
use upkeep_core::error::AppError;
use upkeep_worker::{RunOutcome, ScheduledJob, build_worker};

use crate::output::{self, OutputFormat};

/// Arguments for job commands
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Job subcommand
    #[command(subcommand)]
    pub command: JobCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// List registered jobs
    List,
    /// Run one job now, under its lock and timeout
    Run {
        /// Job name (see `job list`)
        name: String,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Schedule")]
    schedule: String,
    #[tabled(rename = "Enabled")]
    enabled: bool,
    #[tabled(rename = "Exclusive")]
    exclusive: bool,
    #[tabled(rename = "Timeout (s)")]
    timeout_seconds: u64,
    #[tabled(rename = "Lease (s)")]
    lease_seconds: u64,
}

impl From<&ScheduledJob> for JobRow {
    fn from(job: &ScheduledJob) -> Self {
        Self {
            name: job.name.clone(),
            schedule: job.schedule.clone(),
            enabled: job.enabled,
            exclusive: job.exclusive,
            timeout_seconds: job.timeout.as_secs(),
            lease_seconds: job.lease.as_secs(),
        }
    }
}

/// Execute job commands
pub async fn execute(args: &JobArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let db = super::connect(config).await?;
    let parts = build_worker(config, &db).await?;

    match &args.command {
        JobCommand::List => {
            let rows: Vec<JobRow> = parts.table.iter().map(JobRow::from).collect();
            output::print_list(&rows, format);
        }
        JobCommand::Run { name } => {
            let job = parts.table.get(name).ok_or_else(|| {
                AppError::not_found(format!(
                    "Unknown job '{name}'; known jobs: {}",
                    parts.table.names().join(", ")
                ))
            })?;

            let outcome = parts.runner.run(job).await;
            db.close().await;
            return report(name, outcome, format);
        }
    }

    db.close().await;
    Ok(())
}

fn report(name: &str, outcome: RunOutcome, format: OutputFormat) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "job": name,
            "outcome": outcome.label(),
            "summary": match &outcome {
                RunOutcome::Completed(summary) => summary.clone(),
                _ => serde_json::Value::Null,
            },
        })),
        OutputFormat::Table => {
            output::print_kv("Job", name);
            output::print_kv("Outcome", outcome.label());
            if let RunOutcome::Completed(summary) = &outcome {
                output::print_json(summary);
            }
        }
    }

    match outcome {
        RunOutcome::Completed(_) => {
            output::print_success(&format!("Job '{name}' completed"));
            Ok(())
        }
        RunOutcome::Skipped(reason) => {
            output::print_warning(&format!("Job '{name}' skipped: {reason}"));
            Ok(())
        }
        RunOutcome::LockNotAcquired => {
            output::print_warning(&format!("Job '{name}' is running elsewhere; nothing done"));
            Ok(())
        }
        RunOutcome::Failed(e) => Err(AppError::internal(format!("Job '{name}' failed: {e}"))),
        RunOutcome::TimedOut => Err(AppError::timeout(format!("Job '{name}' timed out"))),
        RunOutcome::Panicked(msg) => {
            Err(AppError::internal(format!("Job '{name}' panicked: {msg}")))
        }
    }
}
