//! Element, attribute and schema types shared by all backends.

use std::fmt;

/// netCDF default fill for `f32` variables (`NC_FILL_FLOAT`).
pub const NC_FILL_FLOAT: f32 = 9.969_209_968_386_869e36_f32;

/// netCDF default fill for `f64` variables (`NC_FILL_DOUBLE`).
pub const NC_FILL_DOUBLE: f64 = 9.969_209_968_386_869e36;

/// netCDF default fill for `i64` variables (`NC_FILL_INT64`).
pub const NC_FILL_INT64: i64 = -9_223_372_036_854_775_806;

/// netCDF default fill for `u64` variables (`NC_FILL_UINT64`).
pub const NC_FILL_UINT64: u64 = 18_446_744_073_709_551_614;

/// Convert an element to `i64`.
///
/// [`NC_FILL_INT64`] has no exact `f64`; its nearest double maps back to the
/// fill instead of saturating to `i64::MIN`.
pub fn i64_from_f64(value: f64) -> i64 {
    if value == NC_FILL_INT64 as f64 {
        NC_FILL_INT64
    } else {
        value as i64
    }
}

/// Convert an element to `u64`, mapping the nearest double of
/// [`NC_FILL_UINT64`] back to the fill.
pub fn u64_from_f64(value: f64) -> u64 {
    if value == NC_FILL_UINT64 as f64 {
        NC_FILL_UINT64
    } else {
        value as u64
    }
}

/// Numeric element type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl DataType {
    /// The netCDF default fill value for this type.
    pub fn default_fill(&self) -> f64 {
        match self {
            DataType::I8 => -127.0,
            DataType::U8 => 255.0,
            DataType::I16 => -32767.0,
            DataType::U16 => 65535.0,
            DataType::I32 => -2147483647.0,
            DataType::U32 => 4294967295.0,
            DataType::I64 => NC_FILL_INT64 as f64,
            DataType::U64 => NC_FILL_UINT64 as f64,
            DataType::F32 => NC_FILL_FLOAT as f64,
            DataType::F64 => NC_FILL_DOUBLE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::I8 => "i8",
            DataType::U8 => "u8",
            DataType::I16 => "i16",
            DataType::U16 => "u16",
            DataType::I32 => "i32",
            DataType::U32 => "u32",
            DataType::I64 => "i64",
            DataType::U64 => "u64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        }
    }

    /// Round-trip a value through this element type.
    pub fn coerce(&self, value: f64) -> f64 {
        match self {
            DataType::I8 => value as i8 as f64,
            DataType::U8 => value as u8 as f64,
            DataType::I16 => value as i16 as f64,
            DataType::U16 => value as u16 as f64,
            DataType::I32 => value as i32 as f64,
            DataType::U32 => value as u32 as f64,
            DataType::I64 => value as i64 as f64,
            DataType::U64 => value as u64 as f64,
            DataType::F32 => value as f32 as f64,
            DataType::F64 => value,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a global or variable attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Str(String),
    Strs(Vec<String>),
}

impl AttrValue {
    /// A single-element numeric attribute of the given type.
    pub fn scalar(dtype: DataType, value: f64) -> Self {
        match dtype {
            DataType::I8 => AttrValue::I8(vec![value as i8]),
            DataType::U8 => AttrValue::U8(vec![value as u8]),
            DataType::I16 => AttrValue::I16(vec![value as i16]),
            DataType::U16 => AttrValue::U16(vec![value as u16]),
            DataType::I32 => AttrValue::I32(vec![value as i32]),
            DataType::U32 => AttrValue::U32(vec![value as u32]),
            DataType::I64 => AttrValue::I64(vec![i64_from_f64(value)]),
            DataType::U64 => AttrValue::U64(vec![u64_from_f64(value)]),
            DataType::F32 => AttrValue::F32(vec![value as f32]),
            DataType::F64 => AttrValue::F64(vec![value]),
        }
    }

    /// First numeric element, if this is a non-empty numeric attribute.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::I8(v) => v.first().map(|&x| x as f64),
            AttrValue::U8(v) => v.first().map(|&x| x as f64),
            AttrValue::I16(v) => v.first().map(|&x| x as f64),
            AttrValue::U16(v) => v.first().map(|&x| x as f64),
            AttrValue::I32(v) => v.first().map(|&x| x as f64),
            AttrValue::U32(v) => v.first().map(|&x| x as f64),
            AttrValue::I64(v) => v.first().map(|&x| x as f64),
            AttrValue::U64(v) => v.first().map(|&x| x as f64),
            AttrValue::F32(v) => v.first().map(|&x| x as f64),
            AttrValue::F64(v) => v.first().copied(),
            AttrValue::Str(_) | AttrValue::Strs(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            AttrValue::Strs(v) => v.first().map(String::as_str),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<u32> for AttrValue {
    fn from(value: u32) -> Self {
        AttrValue::U32(vec![value])
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::I32(vec![value])
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        AttrValue::U64(vec![value])
    }
}

impl From<f32> for AttrValue {
    fn from(value: f32) -> Self {
        AttrValue::F32(vec![value])
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::F64(vec![value])
    }
}

/// A named attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A named dimension. Unlimited dimensions grow as records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
    pub unlimited: bool,
}

/// Schema of one variable: name, element type, dimension names and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub dtype: DataType,
    pub dimensions: Vec<String>,
    pub attributes: Vec<Attribute>,
}

impl VariableInfo {
    pub fn new(name: impl Into<String>, dtype: DataType, dimensions: &[&str]) -> Self {
        Self {
            name: name.into(),
            dtype,
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Insert or replace an attribute.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttrValue>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    /// The `_FillValue` attribute if present, else the type's default fill.
    pub fn fill_value(&self) -> f64 {
        self.attribute("_FillValue")
            .and_then(AttrValue::as_f64)
            .unwrap_or_else(|| self.dtype.default_fill())
    }
}

/// Deflate settings for newly created variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    /// Deflate level, 0 disables compression.
    pub level: u8,
    pub shuffle: bool,
}

impl Compression {
    pub fn none() -> Self {
        Self {
            level: 0,
            shuffle: false,
        }
    }

    pub fn deflate(level: u8) -> Self {
        Self {
            level: level.min(9),
            shuffle: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.level > 0
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_64bit_default_fills_survive_f64() {
        assert_eq!(i64_from_f64(DataType::I64.default_fill()), NC_FILL_INT64);
        assert_eq!(u64_from_f64(DataType::U64.default_fill()), NC_FILL_UINT64);
        assert_eq!(
            AttrValue::scalar(DataType::I64, DataType::I64.default_fill()),
            AttrValue::I64(vec![NC_FILL_INT64])
        );
        assert_eq!(
            AttrValue::scalar(DataType::U64, DataType::U64.default_fill()),
            AttrValue::U64(vec![NC_FILL_UINT64])
        );

        assert_eq!(i64_from_f64(-42.0), -42);
        assert_eq!(u64_from_f64(1_000_000.0), 1_000_000);
    }

    #[test]
    fn test_fill_value_prefers_attribute() {
        let var = VariableInfo::new("lake_surface_water_temperature", DataType::I16, &["time", "lat", "lon"])
            .with_attribute("_FillValue", AttrValue::I16(vec![-32768]));
        assert_eq!(var.fill_value(), -32768.0);

        let bare = VariableInfo::new("distance_to_land", DataType::F32, &["lat", "lon"]);
        assert_eq!(bare.fill_value(), NC_FILL_FLOAT as f64);
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut var = VariableInfo::new("t", DataType::F64, &[]).with_attribute("units", "K");
        var.set_attribute("units", "degC");
        assert_eq!(var.attributes.len(), 1);
        assert_eq!(var.attribute("units").and_then(AttrValue::as_str), Some("degC"));
    }

    #[test]
    fn test_compression_clamps_level() {
        assert_eq!(Compression::deflate(12).level, 9);
        assert!(!Compression::none().is_enabled());
        assert!(Compression::deflate(4).shuffle);
    }

    #[test]
    fn test_coerce() {
        assert_eq!(DataType::U8.coerce(255.0), 255.0);
        assert_eq!(DataType::I16.coerce(12.7), 12.0);
        assert_eq!(DataType::F64.coerce(0.1), 0.1);
    }
}
