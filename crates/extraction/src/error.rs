//! Error types for the extraction crate.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use lake_common::CommonError;
use raster_io::RasterError;

/// Errors that can occur while extracting one region.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Region {region_id} has no cells in the mask")]
    EmptyRegion { region_id: u32 },

    #[error("Unknown variables: {}", .0.join(", "))]
    InvalidVariable(Vec<String>),

    #[error("No input files found between {start} and {end}")]
    NoData { start: NaiveDate, end: NaiveDate },

    #[error("Empty date range: {start} is after {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("Schema mismatch on {day}: {reason}")]
    SchemaMismatch { day: NaiveDate, reason: String },

    #[error("Mask file does not exist: {}", .0.display())]
    MaskFileMissing(PathBuf),

    #[error("At least one of region id and region name must be given")]
    MissingRegion,

    #[error("Region lookup failed: {0}")]
    Lookup(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Raster I/O failed: {0}")]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Coarse classification of an [`ExtractionError`], carried in run outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmptyRegion,
    InvalidVariable,
    NoData,
    EmptyRange,
    SchemaMismatch,
    MaskFileMissing,
    MissingRegion,
    Lookup,
    InvalidConfig,
    Raster,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::EmptyRegion => "empty_region",
            ErrorKind::InvalidVariable => "invalid_variable",
            ErrorKind::NoData => "no_data",
            ErrorKind::EmptyRange => "empty_range",
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::MaskFileMissing => "mask_file_missing",
            ErrorKind::MissingRegion => "missing_region",
            ErrorKind::Lookup => "lookup",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::Raster => "raster",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExtractionError {
    pub fn schema_mismatch(day: NaiveDate, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            day,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::EmptyRegion { .. } => ErrorKind::EmptyRegion,
            ExtractionError::InvalidVariable(_) => ErrorKind::InvalidVariable,
            ExtractionError::NoData { .. } => ErrorKind::NoData,
            ExtractionError::EmptyRange { .. } => ErrorKind::EmptyRange,
            ExtractionError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            ExtractionError::MaskFileMissing(_) => ErrorKind::MaskFileMissing,
            ExtractionError::MissingRegion => ErrorKind::MissingRegion,
            ExtractionError::Lookup(_) => ErrorKind::Lookup,
            ExtractionError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            // Shape errors only arise from malformed rasters
            ExtractionError::Raster(_) | ExtractionError::Common(_) => ErrorKind::Raster,
            ExtractionError::Io(_) => ErrorKind::Io,
        }
    }
}
