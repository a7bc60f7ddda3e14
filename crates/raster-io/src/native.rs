//! NetCDF backend using the native netcdf library.
//!
//! Local paths and OPeNDAP URLs are both opened through `netcdf::open`; the
//! netCDF-C library resolves `http(s)://` locations over DAP when it was built
//! with remote access support.

use std::ops::Range;
use std::path::Path;
use std::sync::Once;

use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::AttributeValue;
use tracing::debug;

use crate::backend::{RasterBackend, RasterReader, RasterWriter};
use crate::error::{RasterError, RasterResult};
use crate::types::{
    i64_from_f64, u64_from_f64, AttrValue, Attribute, Compression, DataType, Dimension,
    VariableInfo,
};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose diagnostics even when a failure is
/// handled on the Rust side (for example probing an attribute that does not
/// exist). Safe to call repeatedly; only the first call has an effect.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Backend reading and writing NetCDF-4 files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfBackend;

impl NetCdfBackend {
    pub fn new() -> Self {
        silence_hdf5_errors();
        Self
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

impl RasterBackend for NetCdfBackend {
    type Reader = NetCdfReader;
    type Writer = NetCdfWriter;

    fn open(&self, location: &str) -> RasterResult<NetCdfReader> {
        if !is_remote(location) && !Path::new(location).exists() {
            return Err(RasterError::NotFound(location.to_string()));
        }
        let file = netcdf::open(location).map_err(|e| RasterError::Open {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
        debug!(location, "Opened NetCDF dataset");
        Ok(NetCdfReader { file })
    }

    fn create(&self, path: &Path) -> RasterResult<NetCdfWriter> {
        let file = netcdf::create(path)?;
        debug!(path = %path.display(), "Created NetCDF dataset");
        Ok(NetCdfWriter { file })
    }

    fn append(&self, path: &Path) -> RasterResult<NetCdfWriter> {
        if !path.exists() {
            return Err(RasterError::NotFound(path.display().to_string()));
        }
        let file = netcdf::append(path)?;
        Ok(NetCdfWriter { file })
    }

    fn exists(&self, location: &str) -> bool {
        is_remote(location) || Path::new(location).exists()
    }
}

/// Read handle over an open NetCDF file. Closed on drop.
pub struct NetCdfReader {
    file: netcdf::File,
}

impl RasterReader for NetCdfReader {
    fn attributes(&self) -> RasterResult<Vec<Attribute>> {
        self.file
            .attributes()
            .map(|attr| -> RasterResult<Attribute> {
                Ok(Attribute {
                    name: attr.name().to_string(),
                    value: from_netcdf_value(attr.value()?)?,
                })
            })
            .collect()
    }

    fn dimensions(&self) -> Vec<Dimension> {
        self.file
            .dimensions()
            .map(|d| Dimension {
                name: d.name(),
                len: d.len(),
                unlimited: d.is_unlimited(),
            })
            .collect()
    }

    fn variables(&self) -> RasterResult<Vec<VariableInfo>> {
        self.file.variables().map(|v| variable_info(&v)).collect()
    }

    fn variable(&self, name: &str) -> RasterResult<Option<VariableInfo>> {
        self.file.variable(name).map(|v| variable_info(&v)).transpose()
    }

    fn read(&self, name: &str, slab: &[Range<usize>]) -> RasterResult<Vec<f64>> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| RasterError::MissingVariable(name.to_string()))?;
        let dtype = data_type_of(name, &var.vartype())?;
        read_values(&var, dtype, slab)
    }
}

/// Write handle over a NetCDF file being created or appended. Closed on drop.
pub struct NetCdfWriter {
    file: netcdf::FileMut,
}

impl RasterWriter for NetCdfWriter {
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> RasterResult<()> {
        match len {
            Some(len) => self.file.add_dimension(name, len)?,
            None => self.file.add_unlimited_dimension(name)?,
        };
        Ok(())
    }

    fn add_variable(&mut self, var: &VariableInfo, compression: Compression) -> RasterResult<()> {
        let dims: Vec<&str> = var.dimensions.iter().map(String::as_str).collect();
        let mut nc_var = match var.dtype {
            DataType::I8 => self.file.add_variable::<i8>(&var.name, &dims)?,
            DataType::U8 => self.file.add_variable::<u8>(&var.name, &dims)?,
            DataType::I16 => self.file.add_variable::<i16>(&var.name, &dims)?,
            DataType::U16 => self.file.add_variable::<u16>(&var.name, &dims)?,
            DataType::I32 => self.file.add_variable::<i32>(&var.name, &dims)?,
            DataType::U32 => self.file.add_variable::<u32>(&var.name, &dims)?,
            DataType::I64 => self.file.add_variable::<i64>(&var.name, &dims)?,
            DataType::U64 => self.file.add_variable::<u64>(&var.name, &dims)?,
            DataType::F32 => self.file.add_variable::<f32>(&var.name, &dims)?,
            DataType::F64 => self.file.add_variable::<f64>(&var.name, &dims)?,
        };

        // Scalars cannot be chunked, so they are never compressed
        if compression.is_enabled() && !dims.is_empty() {
            nc_var.set_compression(i32::from(compression.level), compression.shuffle)?;
        }

        for attr in &var.attributes {
            nc_var.put_attribute(&attr.name, to_netcdf_value(&attr.value))?;
        }
        Ok(())
    }

    fn put_attribute(&mut self, attr: &Attribute) -> RasterResult<()> {
        self.file
            .add_attribute(&attr.name, to_netcdf_value(&attr.value))?;
        Ok(())
    }

    fn write(&mut self, name: &str, slab: &[Range<usize>], values: &[f64]) -> RasterResult<()> {
        let mut var = self
            .file
            .variable_mut(name)
            .ok_or_else(|| RasterError::MissingVariable(name.to_string()))?;
        let dtype = data_type_of(name, &var.vartype())?;
        write_values(&mut var, dtype, slab, values)
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Run `$body` with `$extents` bound to a netcdf extents value for `$slab`.
macro_rules! with_extents {
    ($name:expr, $slab:expr, |$extents:ident| $body:expr) => {
        match $slab {
            [] => {
                let $extents = ..;
                $body
            }
            [a] => {
                let $extents = (a.clone(),);
                $body
            }
            [a, b] => {
                let $extents = (a.clone(), b.clone());
                $body
            }
            [a, b, c] => {
                let $extents = (a.clone(), b.clone(), c.clone());
                $body
            }
            [a, b, c, d] => {
                let $extents = (a.clone(), b.clone(), c.clone(), d.clone());
                $body
            }
            other => {
                return Err(RasterError::Unsupported(format!(
                    "{}: rank {} slab",
                    $name,
                    other.len()
                )))
            }
        }
    };
}

fn read_values(
    var: &netcdf::Variable<'_>,
    dtype: DataType,
    slab: &[Range<usize>],
) -> RasterResult<Vec<f64>> {
    macro_rules! read_as {
        ($t:ty) => {
            with_extents!(var.name(), slab, |extents| var
                .get_values::<$t, _>(extents)?
                .into_iter()
                .map(|v| v as f64)
                .collect())
        };
    }

    Ok(match dtype {
        DataType::I8 => read_as!(i8),
        DataType::U8 => read_as!(u8),
        DataType::I16 => read_as!(i16),
        DataType::U16 => read_as!(u16),
        DataType::I32 => read_as!(i32),
        DataType::U32 => read_as!(u32),
        DataType::I64 => read_as!(i64),
        DataType::U64 => read_as!(u64),
        DataType::F32 => read_as!(f32),
        DataType::F64 => read_as!(f64),
    })
}

fn write_values(
    var: &mut netcdf::VariableMut<'_>,
    dtype: DataType,
    slab: &[Range<usize>],
    values: &[f64],
) -> RasterResult<()> {
    macro_rules! write_as {
        ($t:ty) => {
            write_as!($t, |v: f64| v as $t)
        };
        ($t:ty, $convert:expr) => {{
            let typed: Vec<$t> = values.iter().map(|&v| $convert(v)).collect();
            with_extents!(var.name(), slab, |extents| var
                .put_values::<$t, _>(&typed, extents)?)
        }};
    }

    match dtype {
        DataType::I8 => write_as!(i8),
        DataType::U8 => write_as!(u8),
        DataType::I16 => write_as!(i16),
        DataType::U16 => write_as!(u16),
        DataType::I32 => write_as!(i32),
        DataType::U32 => write_as!(u32),
        DataType::I64 => write_as!(i64, i64_from_f64),
        DataType::U64 => write_as!(u64, u64_from_f64),
        DataType::F32 => write_as!(f32),
        DataType::F64 => write_as!(f64),
    }
    Ok(())
}

fn data_type_of(name: &str, vartype: &NcVariableType) -> RasterResult<DataType> {
    Ok(match vartype {
        NcVariableType::Int(IntType::I8) => DataType::I8,
        NcVariableType::Int(IntType::U8) => DataType::U8,
        NcVariableType::Int(IntType::I16) => DataType::I16,
        NcVariableType::Int(IntType::U16) => DataType::U16,
        NcVariableType::Int(IntType::I32) => DataType::I32,
        NcVariableType::Int(IntType::U32) => DataType::U32,
        NcVariableType::Int(IntType::I64) => DataType::I64,
        NcVariableType::Int(IntType::U64) => DataType::U64,
        NcVariableType::Float(FloatType::F32) => DataType::F32,
        NcVariableType::Float(FloatType::F64) => DataType::F64,
        _ => {
            return Err(RasterError::Unsupported(format!(
                "{}: element type is not numeric",
                name
            )))
        }
    })
}

fn variable_info(var: &netcdf::Variable<'_>) -> RasterResult<VariableInfo> {
    let name = var.name();
    let dtype = data_type_of(&name, &var.vartype())?;
    let attributes = var
        .attributes()
        .map(|attr| -> RasterResult<Attribute> {
            Ok(Attribute {
                name: attr.name().to_string(),
                value: from_netcdf_value(attr.value()?)?,
            })
        })
        .collect::<RasterResult<Vec<_>>>()?;

    Ok(VariableInfo {
        dtype,
        dimensions: var.dimensions().iter().map(|d| d.name()).collect(),
        attributes,
        name,
    })
}

fn from_netcdf_value(value: AttributeValue) -> RasterResult<AttrValue> {
    Ok(match value {
        AttributeValue::Schar(v) => AttrValue::I8(vec![v]),
        AttributeValue::Schars(v) => AttrValue::I8(v),
        AttributeValue::Uchar(v) => AttrValue::U8(vec![v]),
        AttributeValue::Uchars(v) => AttrValue::U8(v),
        AttributeValue::Short(v) => AttrValue::I16(vec![v]),
        AttributeValue::Shorts(v) => AttrValue::I16(v),
        AttributeValue::Ushort(v) => AttrValue::U16(vec![v]),
        AttributeValue::Ushorts(v) => AttrValue::U16(v),
        AttributeValue::Int(v) => AttrValue::I32(vec![v]),
        AttributeValue::Ints(v) => AttrValue::I32(v),
        AttributeValue::Uint(v) => AttrValue::U32(vec![v]),
        AttributeValue::Uints(v) => AttrValue::U32(v),
        AttributeValue::Longlong(v) => AttrValue::I64(vec![v]),
        AttributeValue::Longlongs(v) => AttrValue::I64(v),
        AttributeValue::Ulonglong(v) => AttrValue::U64(vec![v]),
        AttributeValue::Ulonglongs(v) => AttrValue::U64(v),
        AttributeValue::Float(v) => AttrValue::F32(vec![v]),
        AttributeValue::Floats(v) => AttrValue::F32(v),
        AttributeValue::Double(v) => AttrValue::F64(vec![v]),
        AttributeValue::Doubles(v) => AttrValue::F64(v),
        AttributeValue::Str(v) => AttrValue::Str(v),
        AttributeValue::Strs(v) => AttrValue::Strs(v),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(RasterError::Unsupported(
                "attribute value type".to_string(),
            ))
        }
    })
}

/// Single-element vectors are written back as scalars.
fn to_netcdf_value(value: &AttrValue) -> AttributeValue {
    macro_rules! scalar_or_vec {
        ($v:expr, $one:ident, $many:ident) => {
            match $v.as_slice() {
                [x] => AttributeValue::$one(*x),
                _ => AttributeValue::$many($v.clone()),
            }
        };
    }

    match value {
        AttrValue::I8(v) => scalar_or_vec!(v, Schar, Schars),
        AttrValue::U8(v) => scalar_or_vec!(v, Uchar, Uchars),
        AttrValue::I16(v) => scalar_or_vec!(v, Short, Shorts),
        AttrValue::U16(v) => scalar_or_vec!(v, Ushort, Ushorts),
        AttrValue::I32(v) => scalar_or_vec!(v, Int, Ints),
        AttrValue::U32(v) => scalar_or_vec!(v, Uint, Uints),
        AttrValue::I64(v) => scalar_or_vec!(v, Longlong, Longlongs),
        AttrValue::U64(v) => scalar_or_vec!(v, Ulonglong, Ulonglongs),
        AttrValue::F32(v) => scalar_or_vec!(v, Float, Floats),
        AttrValue::F64(v) => scalar_or_vec!(v, Double, Doubles),
        AttrValue::Str(s) => AttributeValue::Str(s.clone()),
        AttrValue::Strs(v) => AttributeValue::Strs(v.clone()),
    }
}
