//! Region mask index over the static id-mask raster.

use std::ops::Range;

use tracing::{debug, instrument};

use lake_common::{BoundingBox, CommonError, CroppedMask};
use raster_io::{RasterBackend, RasterReader, NC_FILL_FLOAT};

use crate::config::{MASK_DISTANCE_VARIABLE, MASK_ID_VARIABLE};
use crate::error::{ExtractionError, Result};

/// Geographic corners of a bounding box, from the mask's coordinate vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoExtent {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

/// Everything the assembler needs to know about one region.
#[derive(Debug, Clone)]
pub struct RegionMask {
    pub region_id: u32,
    pub bbox: BoundingBox,
    pub mask: CroppedMask,
    /// Shoreline distance at box extent, fill outside the region
    pub distance: Vec<f64>,
    pub cell_count: usize,
    pub extent: Option<GeoExtent>,
}

/// Reads region membership from the static mask file.
pub struct MaskIndex<'a, B: RasterBackend> {
    backend: &'a B,
    location: String,
}

impl<'a, B: RasterBackend> MaskIndex<'a, B> {
    pub fn new(backend: &'a B, location: impl Into<String>) -> Self {
        Self {
            backend,
            location: location.into(),
        }
    }

    /// Compute the box, cropped mask and distance crop for a region.
    ///
    /// Cells holding any of `auxiliary` ids are merged into the region. The
    /// mask file is opened and closed within the call.
    #[instrument(skip(self), fields(location = %self.location))]
    pub fn compute(&self, region_id: u32, auxiliary: &[u32]) -> Result<RegionMask> {
        let reader = self.backend.open(&self.location)?;

        let (ids, cols) = read_grid(&reader, MASK_ID_VARIABLE)?;
        let full = membership(&ids, region_id, auxiliary);

        let bbox = BoundingBox::from_mask(&full, cols)
            .ok_or(ExtractionError::EmptyRegion { region_id })?;
        let mask = CroppedMask::crop(&full, cols, &bbox);
        let cell_count = mask.member_count();

        let (distance_full, distance_cols) = read_grid(&reader, MASK_DISTANCE_VARIABLE)?;
        if distance_cols != cols || distance_full.len() != full.len() {
            return Err(CommonError::shape_mismatch(full.len(), distance_full.len()).into());
        }
        let mut distance = crop_values(&distance_full, cols, &bbox);
        mask.apply(&mut distance, NC_FILL_FLOAT as f64)?;

        let extent = geo_extent(&reader, &bbox);
        if let Some(e) = extent {
            debug!(
                lat_min = e.lat_min,
                lat_max = e.lat_max,
                lon_min = e.lon_min,
                lon_max = e.lon_max,
                "Computed region extent"
            );
        }
        debug!(%bbox, cell_count, "Computed region bounding box");

        Ok(RegionMask {
            region_id,
            bbox,
            mask,
            distance,
            cell_count,
            extent,
        })
    }
}

/// Cell-wise membership of `region_id` or any auxiliary id.
pub fn membership(ids: &[f64], region_id: u32, auxiliary: &[u32]) -> Vec<bool> {
    let wanted: Vec<f64> = std::iter::once(region_id)
        .chain(auxiliary.iter().copied())
        .map(f64::from)
        .collect();
    ids.iter().map(|id| wanted.contains(id)).collect()
}

/// Read the trailing two dimensions of a grid variable as a row-major slice.
///
/// Leading dimensions (such as a length-1 time axis) are read at index 0.
fn read_grid<R: RasterReader>(reader: &R, name: &str) -> Result<(Vec<f64>, usize)> {
    let var = reader.require_variable(name)?;
    let shape = reader.shape(&var)?;
    if shape.len() < 2 {
        return Err(raster_io::RasterError::Unsupported(format!(
            "{} has rank {}, expected a 2D grid",
            name,
            shape.len()
        ))
        .into());
    }

    let rank = shape.len();
    let slab: Vec<Range<usize>> = shape
        .iter()
        .enumerate()
        .map(|(axis, &len)| if axis < rank - 2 { 0..len.min(1) } else { 0..len })
        .collect();
    let values = reader.read(name, &slab)?;
    Ok((values, shape[rank - 1]))
}

fn crop_values(full: &[f64], cols: usize, bbox: &BoundingBox) -> Vec<f64> {
    let mut out = Vec::with_capacity(bbox.cell_count());
    for row in bbox.rows() {
        let offset = row * cols;
        out.extend_from_slice(&full[offset + bbox.col_min..offset + bbox.col_max]);
    }
    out
}

fn geo_extent<R: RasterReader>(reader: &R, bbox: &BoundingBox) -> Option<GeoExtent> {
    let lat = reader.read_all("lat").ok()?;
    let lon = reader.read_all("lon").ok()?;
    Some(GeoExtent {
        lat_min: *lat.get(bbox.row_min)?,
        lat_max: *lat.get(bbox.row_max - 1)?,
        lon_min: *lon.get(bbox.col_min)?,
        lon_max: *lon.get(bbox.col_max - 1)?,
    })
}
