//! Gridded raster I/O for daily dataset extraction.
//!
//! The [`RasterBackend`] trait hands out [`RasterReader`]s and
//! [`RasterWriter`]s over a dataset model of dimensions, typed variables and
//! attributes. Two backends are provided:
//!
//! - [`NetCdfBackend`] (feature `netcdf`, on by default) reads local NetCDF
//!   files and OPeNDAP URLs and writes NetCDF-4 files with deflate compression.
//! - [`MemoryBackend`] keeps datasets in a shared in-process map.

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "netcdf")]
pub mod native;
pub mod types;

pub use backend::{slab_len, RasterBackend, RasterReader, RasterWriter};
pub use error::{RasterError, RasterResult};
pub use memory::{MemoryBackend, MemoryDataset, MemoryReader, MemoryWriter};
#[cfg(feature = "netcdf")]
pub use native::{silence_hdf5_errors, NetCdfBackend, NetCdfReader, NetCdfWriter};
pub use types::{
    i64_from_f64, u64_from_f64, AttrValue, Attribute, Compression, DataType, Dimension,
    VariableInfo, NC_FILL_DOUBLE, NC_FILL_FLOAT, NC_FILL_INT64, NC_FILL_UINT64,
};
