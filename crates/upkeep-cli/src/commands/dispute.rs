//! Dispute administration commands.

use std::str::FromStr;

use clap::{Args, Subcommand};
use uuid::Uuid;

use upkeep_core::config::AppConfig;
use upkeep_core::error::AppError;
use upkeep_database::repositories::DisputeRepository;
use upkeep_entity::dispute::{DisputeOutcome, Resolution};
use upkeep_worker::disputes::DisputeResolver;

use crate::output::{self, OutputFormat};

/// Arguments for dispute commands
#[derive(Debug, Args)]
pub struct DisputeArgs {
    /// Dispute subcommand
    #[command(subcommand)]
    pub command: DisputeCommand,
}

/// Dispute subcommands
#[derive(Debug, Subcommand)]
pub enum DisputeCommand {
    /// Resolve an open dispute and settle its booking
    Resolve {
        /// Dispute ID
        id: Uuid,
        /// refund_client, release_to_provider, partial_refund or dismissed
        #[arg(long, value_parser = DisputeOutcome::from_str)]
        outcome: DisputeOutcome,
        /// Refund in cents (partial_refund only)
        #[arg(long)]
        refund_cents: Option<i64>,
        /// Resolution note
        #[arg(long)]
        note: Option<String>,
        /// Admin user ID applying the decision
        #[arg(long)]
        resolved_by: Option<Uuid>,
    },
}

/// Execute dispute commands
pub async fn execute(
    args: &DisputeArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        DisputeCommand::Resolve {
            id,
            outcome,
            refund_cents,
            note,
            resolved_by,
        } => {
            let resolution = Resolution {
                outcome: *outcome,
                refund_amount_cents: *refund_cents,
                note: note.clone(),
                resolved_by: *resolved_by,
            };
            // Reject malformed requests before opening a connection.
            resolution.validate()?;

            let db = super::connect(config).await?;
            let resolver = DisputeResolver::new(DisputeRepository::new(db.pool().clone()));
            let result = resolver.resolve(*id, resolution).await;
            db.close().await;
            let resolved = result?;

            match format {
                OutputFormat::Json => output::print_json(&resolved),
                OutputFormat::Table => {
                    output::print_success(&format!("Dispute {id} resolved"));
                    output::print_kv("Dispute status", &resolved.dispute.status.to_string());
                    output::print_kv("Outcome", &outcome.to_string());
                    output::print_kv("Booking", &resolved.booking.id.to_string());
                    output::print_kv("Booking status", &resolved.booking.status.to_string());
                    if let Some(cents) = resolved.dispute.refund_amount_cents {
                        output::print_kv("Refund (cents)", &cents.to_string());
                    }
                }
            }
        }
    }
    Ok(())
}
