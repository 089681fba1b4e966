//! Convenience result type alias for MedInsight.

use crate::error::AppError;

/// A specialized `Result` type for MedInsight operations.
pub type AppResult<T> = Result<T, AppError>;
