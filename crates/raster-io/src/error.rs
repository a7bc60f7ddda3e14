//! Error types for raster I/O.

use thiserror::Error;

/// Result type for raster operations.
pub type RasterResult<T> = Result<T, RasterError>;

/// Error types for raster I/O.
#[derive(Error, Debug)]
pub enum RasterError {
    /// Error reported by the netCDF library
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset does not exist at the given location
    #[error("Dataset not found: {0}")]
    NotFound(String),

    /// Dataset exists but could not be opened
    #[error("Failed to open {location}: {reason}")]
    Open { location: String, reason: String },

    #[error("Missing variable: {0}")]
    MissingVariable(String),

    #[error("Missing dimension: {0}")]
    MissingDimension(String),

    /// Slab does not match the variable's shape
    #[error("Slab out of bounds for {variable}: {reason}")]
    OutOfBounds { variable: String, reason: String },

    /// Element type or rank the backend cannot handle
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl RasterError {
    pub fn out_of_bounds(variable: &str, reason: impl Into<String>) -> Self {
        Self::OutOfBounds {
            variable: variable.to_string(),
            reason: reason.into(),
        }
    }
}
