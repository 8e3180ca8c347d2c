//! Convenience result type alias for Upkeep.

use crate::error::AppError;

/// A specialized `Result` type for Upkeep operations.
pub type AppResult<T> = Result<T, AppError>;
