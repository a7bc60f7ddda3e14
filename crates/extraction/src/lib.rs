//! Lake subset extraction library.
//!
//! Extracts the cells of one region from a multi-decade archive of daily
//! gridded rasters into a single multi-day output file.
//!
//! # Architecture
//!
//! - [`mask::MaskIndex`] reads the static id-mask and computes the region's
//!   bounding box, cropped membership mask and shoreline distance crop.
//! - [`source::RasterSource`] lists the daily rasters in a date range, either
//!   local files ([`source::LocalFileSource`]) or server-side subset OPeNDAP
//!   requests ([`source::RemoteSubsetSource`]).
//! - [`assembler::SubsetAssembler`] seeds the output from the first day and
//!   appends every following day in place.
//! - [`driver::RegionExtractor`] validates a request, resolves the region and
//!   runs the steps above.

pub mod assembler;
pub mod config;
pub mod driver;
pub mod error;
pub mod lookup;
pub mod mask;
pub mod source;

// Re-exports
pub use assembler::{AssemblyReport, AssemblyRequest, SubsetAssembler};
pub use config::{ExtractionConfig, SourceMode};
pub use driver::{output_filename, ExtractionOutcome, ExtractionRequest, RegionExtractor};
pub use error::{ErrorKind, ExtractionError, Result};
pub use lookup::{
    sanitize_name, AbbreviationTable, Ambiguity, FirstMatchPolicy, RegionEntry, RegionResolver,
    RegionTable, ResolutionPolicy, StrictPolicy,
};
pub use mask::{GeoExtent, MaskIndex, RegionMask};
pub use source::{DayLocation, DayReference, LocalFileSource, RasterSource, RemoteSubsetSource};
