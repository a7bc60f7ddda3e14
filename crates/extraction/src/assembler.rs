//! Subset assembler: builds one multi-day output from daily rasters.
//!
//! The first day seeds the output schema (dimensions, variables, attributes)
//! and writes its data at time index 0. Every later day is appended at its
//! own index by reopening the output, so the file on disk is complete up to
//! the last day that finished.

use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use lake_common::BoundingBox;
use raster_io::{
    AttrValue, Attribute, Compression, DataType, RasterBackend, RasterReader, RasterWriter,
    VariableInfo, NC_FILL_FLOAT,
};

use crate::error::{ExtractionError, Result};
use crate::mask::RegionMask;
use crate::source::DayReference;

pub const LAT_DIM: &str = "lat";
pub const LON_DIM: &str = "lon";
pub const TIME_DIM: &str = "time";

pub const LAKEMASK_VARIABLE: &str = "lakemask";
pub const DISTANCE_VARIABLE: &str = "distance_to_land";

/// Global attribute updated from each appended day.
pub const COVERAGE_END_ATTRIBUTE: &str = "time_coverage_end";

/// Inputs for assembling one region's output.
#[derive(Debug, Clone)]
pub struct AssemblyRequest<'a> {
    /// Days in ascending order; the first one seeds the schema
    pub days: &'a [DayReference],
    pub variables: &'a [String],
    pub region: &'a RegionMask,
    pub region_name: &'a str,
    /// Window of each day's raster holding the region
    pub window: BoundingBox,
    pub compression: Compression,
    pub output: &'a Path,
}

/// Summary of a finished assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub days_written: usize,
}

/// Schema recorded at seed time, checked against every appended day.
#[derive(Debug, Clone)]
struct SeededSchema {
    variables: Vec<VariableInfo>,
    time: Option<VariableInfo>,
}

pub struct SubsetAssembler<'a, B: RasterBackend> {
    backend: &'a B,
}

impl<'a, B: RasterBackend> SubsetAssembler<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    pub fn assemble(&self, request: &AssemblyRequest<'_>) -> Result<AssemblyReport> {
        let first = request.days.first().ok_or_else(|| {
            ExtractionError::InvalidConfig("no days to assemble".to_string())
        })?;

        let schema = self.seed(first, request)?;
        info!(
            region_id = request.region.region_id,
            output = %request.output.display(),
            day = %first.date,
            "Seeded output"
        );

        for (index, day) in request.days.iter().enumerate().skip(1) {
            self.append(index, day, &schema, request)?;
        }

        Ok(AssemblyReport {
            output: request.output.to_path_buf(),
            days_written: request.days.len(),
        })
    }

    fn seed(&self, day: &DayReference, request: &AssemblyRequest<'_>) -> Result<SeededSchema> {
        let reader = self.backend.open(&day.location.as_location())?;
        let window = request.window;
        check_grid(&reader, day, &window)?;

        let variables = reader.variables()?;
        let mut requested = Vec::with_capacity(request.variables.len());
        for name in request.variables {
            let var = variables
                .iter()
                .find(|v| &v.name == name)
                .ok_or_else(|| {
                    ExtractionError::schema_mismatch(day.date, format!("missing variable {}", name))
                })?;
            check_gridded(var, day)?;
            requested.push(var.clone());
        }

        let dimensions = reader.dimensions();
        let mut writer = self.backend.create(request.output)?;

        // Global attributes, then the region's own
        for attr in reader.attributes()? {
            writer.put_attribute(&attr)?;
        }
        writer.put_attribute(&Attribute::new("lakename", request.region_name))?;
        writer.put_attribute(&Attribute::new(
            "lakeid",
            AttrValue::I64(vec![i64::from(request.region.region_id)]),
        ))?;
        writer.put_attribute(&Attribute::new(
            "lakecells",
            AttrValue::I64(vec![request.region.cell_count as i64]),
        ))?;

        for dim in &dimensions {
            let len = match dim.name.as_str() {
                LAT_DIM => Some(window.height()),
                LON_DIM => Some(window.width()),
                // The record axis always grows as days are appended
                TIME_DIM => None,
                _ if dim.unlimited => None,
                _ => Some(dim.len),
            };
            writer.add_dimension(&dim.name, len)?;
        }

        let is_dimension = |name: &str| dimensions.iter().any(|d| d.name == name);
        let coordinates: Vec<&VariableInfo> = variables
            .iter()
            .filter(|v| is_dimension(&v.name) && !request.variables.contains(&v.name))
            .collect();

        for var in &coordinates {
            writer.add_variable(var, request.compression)?;
            copy_slab(&reader, &mut writer, var, &window, None, 0)?;
        }
        for var in &requested {
            writer.add_variable(var, request.compression)?;
            copy_slab(&reader, &mut writer, var, &window, Some(request.region), 0)?;
        }

        write_derived_layers(&mut writer, request)?;

        Ok(SeededSchema {
            variables: requested,
            time: variables.into_iter().find(|v| v.name == TIME_DIM),
        })
    }

    fn append(
        &self,
        index: usize,
        day: &DayReference,
        schema: &SeededSchema,
        request: &AssemblyRequest<'_>,
    ) -> Result<()> {
        let reader = self.backend.open(&day.location.as_location())?;
        let window = request.window;
        check_grid(&reader, day, &window)?;

        let mut day_vars = Vec::with_capacity(schema.variables.len());
        for seeded in &schema.variables {
            let var = reader.variable(&seeded.name)?.ok_or_else(|| {
                ExtractionError::schema_mismatch(
                    day.date,
                    format!("missing variable {}", seeded.name),
                )
            })?;
            check_matches(seeded, &var, day)?;
            day_vars.push(var);
        }
        let day_time = match &schema.time {
            Some(seeded) => {
                let var = reader.variable(TIME_DIM)?.ok_or_else(|| {
                    ExtractionError::schema_mismatch(day.date, "missing time variable")
                })?;
                check_matches(seeded, &var, day)?;
                Some(var)
            }
            None => None,
        };

        // Output handle scoped to this day
        let mut writer = self.backend.append(request.output)?;
        for var in &day_vars {
            copy_slab(&reader, &mut writer, var, &window, Some(request.region), index)?;
        }
        if let Some(time) = &day_time {
            copy_slab(&reader, &mut writer, time, &window, None, index)?;
        }

        match reader.attribute(COVERAGE_END_ATTRIBUTE)? {
            Some(value) => {
                writer.put_attribute(&Attribute {
                    name: COVERAGE_END_ATTRIBUTE.to_string(),
                    value,
                })?;
            }
            None => warn!(
                day = %day.date,
                source = %day.location,
                "Day has no time_coverage_end attribute"
            ),
        }

        debug!(day = %day.date, index, "Appended day");
        Ok(())
    }
}

/// The source grid must have lat/lon dimensions large enough for the window.
fn check_grid<R: RasterReader>(reader: &R, day: &DayReference, window: &BoundingBox) -> Result<()> {
    let lat = reader
        .dimension(LAT_DIM)
        .ok_or_else(|| ExtractionError::schema_mismatch(day.date, "missing lat dimension"))?;
    let lon = reader
        .dimension(LON_DIM)
        .ok_or_else(|| ExtractionError::schema_mismatch(day.date, "missing lon dimension"))?;
    if !window.fits_within(lat.len, lon.len) {
        return Err(ExtractionError::schema_mismatch(
            day.date,
            format!("grid {}x{} does not contain {}", lat.len, lon.len, window),
        ));
    }
    Ok(())
}

/// Data variables must be gridded on trailing (lat, lon) dimensions.
fn check_gridded(var: &VariableInfo, day: &DayReference) -> Result<()> {
    let dims: Vec<&str> = var.dimensions.iter().map(String::as_str).collect();
    if !dims.ends_with(&[LAT_DIM, LON_DIM]) {
        return Err(ExtractionError::schema_mismatch(
            day.date,
            format!("{} is not gridded on (lat, lon): {:?}", var.name, dims),
        ));
    }
    Ok(())
}

fn check_matches(seeded: &VariableInfo, var: &VariableInfo, day: &DayReference) -> Result<()> {
    if seeded.dtype != var.dtype {
        return Err(ExtractionError::schema_mismatch(
            day.date,
            format!("{} is {} but was seeded as {}", var.name, var.dtype, seeded.dtype),
        ));
    }
    if seeded.dimensions != var.dimensions {
        return Err(ExtractionError::schema_mismatch(
            day.date,
            format!(
                "{} has dimensions {:?} but was seeded with {:?}",
                var.name, var.dimensions, seeded.dimensions
            ),
        ));
    }
    Ok(())
}

/// Copy one record of `var` from a day's raster into the output at `index`.
///
/// lat/lon axes are cut to `window`, the record axis reads index 0 and writes
/// `index`, any other axis is copied whole. With a region the cells outside it
/// are replaced by the variable's fill value.
fn copy_slab<R: RasterReader, W: RasterWriter>(
    reader: &R,
    writer: &mut W,
    var: &VariableInfo,
    window: &BoundingBox,
    region: Option<&RegionMask>,
    index: usize,
) -> Result<()> {
    let shape = reader.shape(var)?;
    let mut source: Vec<Range<usize>> = Vec::with_capacity(shape.len());
    let mut target: Vec<Range<usize>> = Vec::with_capacity(shape.len());
    for (dim, &len) in var.dimensions.iter().zip(&shape) {
        match dim.as_str() {
            LAT_DIM => {
                source.push(window.rows());
                target.push(0..window.height());
            }
            LON_DIM => {
                source.push(window.cols());
                target.push(0..window.width());
            }
            TIME_DIM => {
                source.push(0..1);
                target.push(index..index + 1);
            }
            _ => {
                source.push(0..len);
                target.push(0..len);
            }
        }
    }

    let mut values = reader.read(&var.name, &source)?;
    if let Some(region) = region {
        let fill = var.fill_value();
        let plane = region.mask.len().max(1);
        for chunk in values.chunks_mut(plane) {
            region.mask.apply(chunk, fill)?;
        }
    }
    writer.write(&var.name, &target, &values)?;
    Ok(())
}

fn write_derived_layers<W: RasterWriter>(writer: &mut W, request: &AssemblyRequest<'_>) -> Result<()> {
    let region = request.region;
    let plane = [0..region.bbox.height(), 0..region.bbox.width()];

    let lakemask = VariableInfo::new(LAKEMASK_VARIABLE, DataType::U8, &[LAT_DIM, LON_DIM])
        .with_attribute("_FillValue", AttrValue::U8(vec![lake_common::mask::MASK_FILL]))
        .with_attribute("long_name", "lakemask")
        .with_attribute(
            "description",
            "Lakemask extracted from the CCI Lakes maskfile.",
        );
    writer.add_variable(&lakemask, request.compression)?;
    let layer: Vec<f64> = region.mask.to_layer().into_iter().map(f64::from).collect();
    writer.write(LAKEMASK_VARIABLE, &plane, &layer)?;

    let distance = VariableInfo::new(DISTANCE_VARIABLE, DataType::F32, &[LAT_DIM, LON_DIM])
        .with_attribute("_FillValue", NC_FILL_FLOAT)
        .with_attribute("long_name", "distance to land")
        .with_attribute("units", "km")
        .with_attribute(
            "description",
            "Distance to shoreline extracted from the CCI Lakes maskfile.",
        );
    writer.add_variable(&distance, request.compression)?;
    writer.write(DISTANCE_VARIABLE, &plane, &region.distance)?;
    Ok(())
}
