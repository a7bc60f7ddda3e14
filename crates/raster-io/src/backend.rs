//! Backend traits for reading and writing gridded datasets.
//!
//! Values cross the trait boundary as `f64` in row-major order. Backends
//! convert to and from the variable's stored element type, so any integer or
//! float variable can be copied without the caller naming its type.
//!
//! 64-bit integers beyond 2^53 are approximate after that conversion. The
//! default `i64`/`u64` fills are the exception: writers map their nearest
//! doubles back to the exact fill values.

use std::ops::Range;
use std::path::Path;

use crate::error::{RasterError, RasterResult};
use crate::types::{AttrValue, Attribute, Compression, Dimension, VariableInfo};

/// Read access to an open dataset.
///
/// Elements are returned as `f64`, so `i64`/`u64` values outside +-2^53 lose
/// precision.
pub trait RasterReader {
    /// Global attributes in file order.
    fn attributes(&self) -> RasterResult<Vec<Attribute>>;

    fn dimensions(&self) -> Vec<Dimension>;

    fn variables(&self) -> RasterResult<Vec<VariableInfo>>;

    /// Read a hyperslab of `name`. `slab` holds one range per dimension.
    fn read(&self, name: &str, slab: &[Range<usize>]) -> RasterResult<Vec<f64>>;

    fn attribute(&self, name: &str) -> RasterResult<Option<AttrValue>> {
        Ok(self
            .attributes()?
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| a.value))
    }

    fn dimension(&self, name: &str) -> Option<Dimension> {
        self.dimensions().into_iter().find(|d| d.name == name)
    }

    fn variable(&self, name: &str) -> RasterResult<Option<VariableInfo>> {
        Ok(self.variables()?.into_iter().find(|v| v.name == name))
    }

    /// Variable schema, failing when absent.
    fn require_variable(&self, name: &str) -> RasterResult<VariableInfo> {
        self.variable(name)?
            .ok_or_else(|| RasterError::MissingVariable(name.to_string()))
    }

    /// Current length of each of the variable's dimensions.
    fn shape(&self, var: &VariableInfo) -> RasterResult<Vec<usize>> {
        var.dimensions
            .iter()
            .map(|d| {
                self.dimension(d)
                    .map(|dim| dim.len)
                    .ok_or_else(|| RasterError::MissingDimension(d.clone()))
            })
            .collect()
    }

    /// Read every value of `name`.
    fn read_all(&self, name: &str) -> RasterResult<Vec<f64>> {
        let var = self.require_variable(name)?;
        let slab: Vec<Range<usize>> = self.shape(&var)?.into_iter().map(|n| 0..n).collect();
        self.read(name, &slab)
    }
}

/// Write access to a dataset being created or appended to.
///
/// Dropping the writer flushes and closes the underlying file.
pub trait RasterWriter {
    /// Define a dimension; `None` makes it unlimited.
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> RasterResult<()>;

    /// Define a variable together with its attributes.
    fn add_variable(&mut self, var: &VariableInfo, compression: Compression) -> RasterResult<()>;

    /// Set or overwrite a global attribute.
    fn put_attribute(&mut self, attr: &Attribute) -> RasterResult<()>;

    /// Write a hyperslab. Writing past the end of an unlimited dimension grows it.
    fn write(&mut self, name: &str, slab: &[Range<usize>], values: &[f64]) -> RasterResult<()>;
}

/// A storage engine that hands out readers and writers.
///
/// Readers are opened by location, which may be a local path or a remote URL
/// the backend knows how to resolve.
pub trait RasterBackend: Send + Sync {
    type Reader: RasterReader;
    type Writer: RasterWriter;

    fn open(&self, location: &str) -> RasterResult<Self::Reader>;

    /// Create a new dataset, replacing any existing one.
    fn create(&self, path: &Path) -> RasterResult<Self::Writer>;

    /// Reopen an existing dataset for writing.
    fn append(&self, path: &Path) -> RasterResult<Self::Writer>;

    fn exists(&self, location: &str) -> bool;
}

/// Number of elements a slab covers.
pub fn slab_len(slab: &[Range<usize>]) -> usize {
    slab.iter().map(|r| r.len()).product()
}
