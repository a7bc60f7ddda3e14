//! Synthetic dataset generators for the in-memory raster backend.
//!
//! Grids are row-major with `lat` as the slow axis, matching the layout of
//! the daily products and the static mask file.

use std::ops::Range;
use std::path::Path;

use chrono::NaiveDate;
use raster_io::{
    Compression, DataType, MemoryBackend, MemoryDataset, RasterBackend, RasterReader,
    RasterResult, RasterWriter, VariableInfo,
};

/// Dataset id used in generated daily file names.
pub const TEST_DATASET_ID: &str = "ESACCI-LAKES-L3S-LK_PRODUCTS-MERGED";

/// Daily variable used by most tests.
pub const TEMPERATURE: &str = "lake_surface_water_temperature";

/// Daily file name for `date`, in the layout of the published archive.
pub fn day_filename(date: NaiveDate, version: &str) -> String {
    format!(
        "{}-{}-fv{}.nc",
        TEST_DATASET_ID,
        date.format("%Y%m%d"),
        version
    )
}

/// Seconds since 1970-01-01 at midnight of `date`.
pub fn seconds_since_epoch(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    (date - epoch).num_days() as f64 * 86_400.0
}

/// Cell-centre latitudes for a global grid with `rows` rows.
pub fn lat_values(rows: usize) -> Vec<f64> {
    let step = 180.0 / rows as f64;
    (0..rows).map(|i| -90.0 + (i as f64 + 0.5) * step).collect()
}

/// Cell-centre longitudes for a global grid with `cols` columns.
pub fn lon_values(cols: usize) -> Vec<f64> {
    let step = 360.0 / cols as f64;
    (0..cols).map(|j| -180.0 + (j as f64 + 0.5) * step).collect()
}

/// Build a grid by evaluating `f(row, col)` for every cell.
pub fn grid_with(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Vec<f64> {
    let mut grid = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            grid.push(f(row, col));
        }
    }
    grid
}

/// Grid with every cell set to `value`.
pub fn constant_grid(rows: usize, cols: usize, value: f64) -> Vec<f64> {
    vec![value; rows * cols]
}

/// Region-id grid with each `(id, rows, cols)` block painted over zeros.
///
/// Later blocks overwrite earlier ones where they overlap.
pub fn block_ids(
    rows: usize,
    cols: usize,
    blocks: &[(u32, Range<usize>, Range<usize>)],
) -> Vec<f64> {
    let mut grid = vec![0.0; rows * cols];
    for (id, block_rows, block_cols) in blocks {
        for row in block_rows.clone() {
            for col in block_cols.clone() {
                grid[row * cols + col] = f64::from(*id);
            }
        }
    }
    grid
}

/// Static mask dataset holding `ids` and a distance-to-land layer.
///
/// Distance at `(row, col)` is `row * cols + col` kilometres, so a cropped
/// distance value identifies the cell it came from.
pub fn mask_dataset(rows: usize, cols: usize, ids: Vec<f64>) -> MemoryDataset {
    assert_eq!(ids.len(), rows * cols, "id grid does not match {}x{}", rows, cols);
    MemoryDataset::new()
        .with_dimension("lat", rows)
        .with_dimension("lon", cols)
        .with_attribute("title", "ESA CCI static lake mask")
        .with_variable(
            VariableInfo::new("lat", DataType::F32, &["lat"]).with_attribute("units", "degrees_north"),
            lat_values(rows),
        )
        .with_variable(
            VariableInfo::new("lon", DataType::F32, &["lon"]).with_attribute("units", "degrees_east"),
            lon_values(cols),
        )
        .with_variable(
            VariableInfo::new("CCI_lakeid", DataType::I32, &["lat", "lon"]),
            ids,
        )
        .with_variable(
            VariableInfo::new("distance_to_land", DataType::F32, &["lat", "lon"])
                .with_attribute("units", "km"),
            grid_with(rows, cols, |r, c| (r * cols + c) as f64),
        )
}

/// A `(time, lat, lon)` float variable with the given units.
pub fn gridded_variable(name: &str, dtype: DataType) -> VariableInfo {
    VariableInfo::new(name, dtype, &["time", "lat", "lon"])
}

/// One day's dataset with `time`, `lat`, `lon` and each `(variable, grid)`.
///
/// Each grid holds the single record for `date`. Global attributes carry the
/// coverage period of the day.
pub fn day_dataset(
    date: NaiveDate,
    rows: usize,
    cols: usize,
    variables: Vec<(VariableInfo, Vec<f64>)>,
) -> MemoryDataset {
    let stamp = date.format("%Y%m%d");
    let mut dataset = MemoryDataset::new()
        .with_unlimited_dimension("time", 1)
        .with_dimension("lat", rows)
        .with_dimension("lon", cols)
        .with_attribute("title", "ESA CCI Lakes daily product")
        .with_attribute("time_coverage_start", format!("{}T000000Z", stamp))
        .with_attribute("time_coverage_end", format!("{}T235959Z", stamp))
        .with_variable(
            VariableInfo::new("time", DataType::F64, &["time"])
                .with_attribute("units", "seconds since 1970-01-01 00:00:00"),
            vec![seconds_since_epoch(date)],
        )
        .with_variable(
            VariableInfo::new("lat", DataType::F32, &["lat"]),
            lat_values(rows),
        )
        .with_variable(
            VariableInfo::new("lon", DataType::F32, &["lon"]),
            lon_values(cols),
        );
    for (info, grid) in variables {
        dataset = dataset.with_variable(info, grid);
    }
    dataset
}

/// Day dataset with a single temperature grid of `value` everywhere.
pub fn temperature_day(date: NaiveDate, rows: usize, cols: usize, value: f64) -> MemoryDataset {
    day_dataset(
        date,
        rows,
        cols,
        vec![(
            gridded_variable(TEMPERATURE, DataType::F32).with_attribute("units", "K"),
            constant_grid(rows, cols, value),
        )],
    )
}

/// Write a generated dataset to `path` through `backend`, uncompressed.
///
/// Used to turn the generators above into real files for backends that read
/// from disk.
pub fn write_dataset<B: RasterBackend>(
    backend: &B,
    path: &Path,
    dataset: MemoryDataset,
) -> RasterResult<()> {
    let staging = MemoryBackend::new();
    staging.insert("staging", dataset);
    let reader = staging.open("staging")?;

    let mut writer = backend.create(path)?;
    for attr in reader.attributes()? {
        writer.put_attribute(&attr)?;
    }
    for dim in reader.dimensions() {
        writer.add_dimension(&dim.name, (!dim.unlimited).then_some(dim.len))?;
    }
    for var in reader.variables()? {
        writer.add_variable(&var, Compression::none())?;
        let slab: Vec<Range<usize>> = reader.shape(&var)?.into_iter().map(|len| 0..len).collect();
        let values = reader.read(&var.name, &slab)?;
        writer.write(&var.name, &slab, &values)?;
    }
    Ok(())
}
