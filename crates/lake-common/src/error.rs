//! Error types shared by the extraction crates.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised by the shared grid and time types.
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Invalid date: {0}. Expected 'YYYY-MM-DD'")]
    InvalidDate(String),

    #[error("Shape mismatch: expected {expected} cells, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

impl CommonError {
    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { expected, actual }
    }
}
