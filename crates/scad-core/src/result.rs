//! Convenience result type alias for scad-site.

use crate::error::AppError;

/// A specialized `Result` type for scad-site operations.
pub type AppResult<T> = Result<T, AppError>;
