//! # upkeep-api
//!
//! HTTP health boundary for Upkeep built on Axum, and the server entry
//! point that wires storage, locks, the job table and the scheduler.

pub mod app;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use app::{build_app, run_server};
pub use state::AppState;
