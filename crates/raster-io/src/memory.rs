//! In-memory raster backend.
//!
//! Datasets live in a shared map keyed by location, so a path written through
//! [`MemoryBackend::create`] can be reopened by [`MemoryBackend::open`] from any
//! clone of the backend. Writers mutate the stored dataset directly, which
//! mirrors a file that is complete after every write call.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{slab_len, RasterBackend, RasterReader, RasterWriter};
use crate::error::{RasterError, RasterResult};
use crate::types::{AttrValue, Attribute, Compression, Dimension, VariableInfo};

#[derive(Debug, Clone)]
struct MemoryVariable {
    info: VariableInfo,
    compression: Compression,
    data: Vec<f64>,
}

/// A complete dataset held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    dimensions: Vec<Dimension>,
    attributes: Vec<Attribute>,
    variables: Vec<MemoryVariable>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, name: &str, len: usize) -> Self {
        self.dimensions.push(Dimension {
            name: name.to_string(),
            len,
            unlimited: false,
        });
        self
    }

    pub fn with_unlimited_dimension(mut self, name: &str, len: usize) -> Self {
        self.dimensions.push(Dimension {
            name: name.to_string(),
            len,
            unlimited: true,
        });
        self
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        set_attribute(&mut self.attributes, Attribute::new(name, value));
        self
    }

    /// Add a variable with its full row-major contents.
    ///
    /// Values are coerced to the variable's element type.
    pub fn with_variable(mut self, info: VariableInfo, data: Vec<f64>) -> Self {
        let data = data.into_iter().map(|v| info.dtype.coerce(v)).collect();
        self.variables.push(MemoryVariable {
            info,
            compression: Compression::none(),
            data,
        });
        self
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableInfo> {
        self.find(name).map(|v| &v.info)
    }

    /// Full row-major contents of a variable.
    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.find(name).map(|v| v.data.as_slice())
    }

    pub fn compression(&self, name: &str) -> Option<Compression> {
        self.find(name).map(|v| v.compression)
    }

    pub fn shape(&self, name: &str) -> RasterResult<Vec<usize>> {
        let var = self
            .find(name)
            .ok_or_else(|| RasterError::MissingVariable(name.to_string()))?;
        self.shape_of(&var.info)
    }

    fn find(&self, name: &str) -> Option<&MemoryVariable> {
        self.variables.iter().find(|v| v.info.name == name)
    }

    fn shape_of(&self, info: &VariableInfo) -> RasterResult<Vec<usize>> {
        info.dimensions
            .iter()
            .map(|d| {
                self.dimension(d)
                    .map(|dim| dim.len)
                    .ok_or_else(|| RasterError::MissingDimension(d.clone()))
            })
            .collect()
    }

    fn read(&self, name: &str, slab: &[Range<usize>]) -> RasterResult<Vec<f64>> {
        let var = self
            .find(name)
            .ok_or_else(|| RasterError::MissingVariable(name.to_string()))?;
        let shape = self.shape_of(&var.info)?;
        check_slab(name, &shape, slab)?;

        let mut out = Vec::with_capacity(slab_len(slab));
        for_each_offset(&shape, slab, |offset| out.push(var.data[offset]));
        Ok(out)
    }

    fn write(&mut self, name: &str, slab: &[Range<usize>], values: &[f64]) -> RasterResult<()> {
        if values.len() != slab_len(slab) {
            return Err(RasterError::out_of_bounds(
                name,
                format!("{} values for a slab of {}", values.len(), slab_len(slab)),
            ));
        }
        let info = self
            .variable(name)
            .cloned()
            .ok_or_else(|| RasterError::MissingVariable(name.to_string()))?;
        if slab.len() != info.dimensions.len() {
            return Err(RasterError::out_of_bounds(
                name,
                format!("rank {} slab for rank {} variable", slab.len(), info.dimensions.len()),
            ));
        }

        // Records past the end of a leading unlimited dimension grow it
        if let (Some(first), Some(range)) = (info.dimensions.first(), slab.first()) {
            self.grow_unlimited(first, range.end);
        }

        let shape = self.shape_of(&info)?;
        check_slab(name, &shape, slab)?;

        let dtype = info.dtype;
        let var = self
            .variables
            .iter_mut()
            .find(|v| v.info.name == name)
            .ok_or_else(|| RasterError::MissingVariable(name.to_string()))?;
        let mut values = values.iter();
        for_each_offset(&shape, slab, |offset| {
            if let Some(&v) = values.next() {
                var.data[offset] = dtype.coerce(v);
            }
        });
        Ok(())
    }

    fn grow_unlimited(&mut self, dim_name: &str, new_len: usize) {
        let Some(dim) = self
            .dimensions
            .iter_mut()
            .find(|d| d.name == dim_name && d.unlimited)
        else {
            return;
        };
        if new_len <= dim.len {
            return;
        }
        dim.len = new_len;

        let dims = self.dimensions.clone();
        for var in &mut self.variables {
            if var.info.dimensions.first().map(String::as_str) != Some(dim_name) {
                continue;
            }
            let record: usize = var.info.dimensions[1..]
                .iter()
                .filter_map(|d| dims.iter().find(|dim| &dim.name == d))
                .map(|d| d.len)
                .product();
            let fill = var.info.fill_value();
            var.data.resize(new_len * record, fill);
        }
    }
}

fn set_attribute(attributes: &mut Vec<Attribute>, attr: Attribute) {
    match attributes.iter_mut().find(|a| a.name == attr.name) {
        Some(existing) => existing.value = attr.value,
        None => attributes.push(attr),
    }
}

fn check_slab(name: &str, shape: &[usize], slab: &[Range<usize>]) -> RasterResult<()> {
    if shape.len() != slab.len() {
        return Err(RasterError::out_of_bounds(
            name,
            format!("rank {} slab for rank {} variable", slab.len(), shape.len()),
        ));
    }
    for (axis, (range, &len)) in slab.iter().zip(shape).enumerate() {
        if range.start > range.end || range.end > len {
            return Err(RasterError::out_of_bounds(
                name,
                format!("axis {} range {:?} exceeds length {}", axis, range, len),
            ));
        }
    }
    Ok(())
}

/// Call `f` with the row-major offset of every element in `slab`.
fn for_each_offset(shape: &[usize], slab: &[Range<usize>], mut f: impl FnMut(usize)) {
    if slab.iter().any(|r| r.is_empty()) {
        return;
    }

    let mut strides = vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }

    let mut index: Vec<usize> = slab.iter().map(|r| r.start).collect();
    loop {
        f(index.iter().zip(&strides).map(|(i, s)| i * s).sum());

        let mut axis = slab.len();
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < slab[axis].end {
                break;
            }
            index[axis] = slab[axis].start;
        }
    }
}

type Store = Arc<Mutex<HashMap<String, MemoryDataset>>>;

fn lock(store: &Store) -> MutexGuard<'_, HashMap<String, MemoryDataset>> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn key_of(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Backend storing datasets in a shared in-process map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: Store,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset under `location`, replacing any existing one.
    pub fn insert(&self, location: impl Into<String>, dataset: MemoryDataset) {
        lock(&self.store).insert(location.into(), dataset);
    }

    /// Snapshot of the dataset at `location`.
    pub fn get(&self, location: &str) -> Option<MemoryDataset> {
        lock(&self.store).get(location).cloned()
    }

    pub fn get_path(&self, path: &Path) -> Option<MemoryDataset> {
        self.get(&key_of(path))
    }

    pub fn contains(&self, location: &str) -> bool {
        lock(&self.store).contains_key(location)
    }

    /// Locations of all stored datasets, sorted.
    pub fn locations(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.store).keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl RasterBackend for MemoryBackend {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn open(&self, location: &str) -> RasterResult<MemoryReader> {
        let dataset = self
            .get(location)
            .ok_or_else(|| RasterError::NotFound(location.to_string()))?;
        Ok(MemoryReader { dataset })
    }

    fn create(&self, path: &Path) -> RasterResult<MemoryWriter> {
        let key = key_of(path);
        self.insert(key.clone(), MemoryDataset::new());
        Ok(MemoryWriter {
            store: Arc::clone(&self.store),
            key,
        })
    }

    fn append(&self, path: &Path) -> RasterResult<MemoryWriter> {
        let key = key_of(path);
        if !self.contains(&key) {
            return Err(RasterError::NotFound(key));
        }
        Ok(MemoryWriter {
            store: Arc::clone(&self.store),
            key,
        })
    }

    fn exists(&self, location: &str) -> bool {
        self.contains(location)
    }
}

/// Reader over a snapshot taken when the dataset was opened.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    dataset: MemoryDataset,
}

impl RasterReader for MemoryReader {
    fn attributes(&self) -> RasterResult<Vec<Attribute>> {
        Ok(self.dataset.attributes.clone())
    }

    fn dimensions(&self) -> Vec<Dimension> {
        self.dataset.dimensions.clone()
    }

    fn variables(&self) -> RasterResult<Vec<VariableInfo>> {
        Ok(self.dataset.variables.iter().map(|v| v.info.clone()).collect())
    }

    fn read(&self, name: &str, slab: &[Range<usize>]) -> RasterResult<Vec<f64>> {
        self.dataset.read(name, slab)
    }
}

/// Writer that mutates the stored dataset in place.
#[derive(Debug)]
pub struct MemoryWriter {
    store: Store,
    key: String,
}

impl MemoryWriter {
    fn with_dataset<T>(
        &self,
        f: impl FnOnce(&mut MemoryDataset) -> RasterResult<T>,
    ) -> RasterResult<T> {
        let mut store = lock(&self.store);
        let dataset = store
            .get_mut(&self.key)
            .ok_or_else(|| RasterError::NotFound(self.key.clone()))?;
        f(dataset)
    }
}

impl RasterWriter for MemoryWriter {
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> RasterResult<()> {
        self.with_dataset(|ds| {
            if ds.dimension(name).is_some() {
                return Err(RasterError::Unsupported(format!(
                    "dimension {} already defined",
                    name
                )));
            }
            ds.dimensions.push(Dimension {
                name: name.to_string(),
                len: len.unwrap_or(0),
                unlimited: len.is_none(),
            });
            Ok(())
        })
    }

    fn add_variable(&mut self, var: &VariableInfo, compression: Compression) -> RasterResult<()> {
        self.with_dataset(|ds| {
            if ds.find(&var.name).is_some() {
                return Err(RasterError::Unsupported(format!(
                    "variable {} already defined",
                    var.name
                )));
            }
            let len = ds.shape_of(var)?.iter().product();
            ds.variables.push(MemoryVariable {
                info: var.clone(),
                compression,
                data: vec![var.fill_value(); len],
            });
            Ok(())
        })
    }

    fn put_attribute(&mut self, attr: &Attribute) -> RasterResult<()> {
        self.with_dataset(|ds| {
            set_attribute(&mut ds.attributes, attr.clone());
            Ok(())
        })
    }

    fn write(&mut self, name: &str, slab: &[Range<usize>], values: &[f64]) -> RasterResult<()> {
        self.with_dataset(|ds| ds.write(name, slab, values))
    }
}
