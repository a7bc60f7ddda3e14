//! Raster sources: where each day's raster comes from.
//!
//! A source turns a date range into an ordered list of [`DayReference`]s and
//! tells the assembler which window of each day's raster holds the region.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use tracing::debug;
use walkdir::WalkDir;

use lake_common::time::parse_compact_date;
use lake_common::{BoundingBox, DateRange};

use crate::error::{ExtractionError, Result};

/// Location of one day's raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayLocation {
    Local(PathBuf),
    Remote(String),
}

impl DayLocation {
    /// Location string understood by a raster backend.
    pub fn as_location(&self) -> String {
        match self {
            DayLocation::Local(path) => path.to_string_lossy().into_owned(),
            DayLocation::Remote(url) => url.clone(),
        }
    }
}

impl fmt::Display for DayLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayLocation::Local(path) => write!(f, "{}", path.display()),
            DayLocation::Remote(url) => f.write_str(url),
        }
    }
}

/// A date-stamped pointer to one day's raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayReference {
    pub date: NaiveDate,
    pub location: DayLocation,
}

/// Strategy for locating daily rasters.
pub trait RasterSource: Send + Sync {
    /// Day references within `range`, strictly ascending by date.
    fn enumerate(&self, range: &DateRange) -> Result<Vec<DayReference>>;

    /// Window of a day's raster that covers `bbox`.
    fn crop_window(&self, bbox: &BoundingBox) -> BoundingBox;

    fn name(&self) -> &'static str;
}

/// Daily files under a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    root: PathBuf,
    suffix: String,
}

impl LocalFileSource {
    pub fn new(root: impl Into<PathBuf>, version: &str) -> Self {
        Self {
            root: root.into(),
            suffix: format!("-fv{}.nc", version),
        }
    }

    /// Date of a dataset file, from the second-to-last `-`-separated token.
    fn file_date(&self, path: &Path) -> Option<NaiveDate> {
        let name = path.file_name()?.to_str()?;
        if !name.ends_with(&self.suffix) {
            return None;
        }
        let mut tokens = name.rsplit('-');
        tokens.next()?;
        let token = tokens.next()?;
        match parse_compact_date(token) {
            Ok(date) => Some(date),
            Err(_) => {
                debug!(file = %path.display(), "Skipping file without a date token");
                None
            }
        }
    }
}

impl RasterSource for LocalFileSource {
    fn enumerate(&self, range: &DateRange) -> Result<Vec<DayReference>> {
        let mut days: Vec<DayReference> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let date = self.file_date(entry.path())?;
                range.contains(&date).then(|| DayReference {
                    date,
                    location: DayLocation::Local(entry.into_path()),
                })
            })
            .collect();

        days.sort_by(|a, b| a.date.cmp(&b.date));
        // One file per day
        days.dedup_by(|later, earlier| later.date == earlier.date);

        if days.is_empty() {
            return Err(ExtractionError::NoData {
                start: range.start,
                end: range.end,
            });
        }
        debug!(root = %self.root.display(), days = days.len(), "Enumerated local files");
        Ok(days)
    }

    fn crop_window(&self, bbox: &BoundingBox) -> BoundingBox {
        *bbox
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Per-day OPeNDAP requests subset server-side to the region's box.
#[derive(Debug, Clone)]
pub struct RemoteSubsetSource {
    base_url: String,
    version: String,
    dataset_id: String,
    bbox: BoundingBox,
    variables: Vec<String>,
}

impl RemoteSubsetSource {
    pub fn new(
        base_url: &str,
        version: &str,
        dataset_id: &str,
        bbox: BoundingBox,
        variables: &[String],
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            version: version.to_string(),
            dataset_id: dataset_id.to_string(),
            bbox,
            variables: variables.to_vec(),
        }
    }

    /// Constraint-expression URL for one day.
    pub fn day_url(&self, date: NaiveDate) -> String {
        let rows = self.bbox.row_constraint();
        let cols = self.bbox.col_constraint();

        let mut url = format!(
            "{base}/v{version}/{year:04}/{month:02}/{dataset}-{stamp}-fv{version}.nc?lat{rows},lon{cols},time[0:1:0]",
            base = self.base_url,
            version = self.version,
            year = date.year(),
            month = date.month(),
            dataset = self.dataset_id,
            stamp = date.format("%Y%m%d"),
            rows = rows,
            cols = cols,
        );
        for var in &self.variables {
            url.push_str(&format!(",{}[0:1:0]{}{}", var, rows, cols));
        }
        url
    }
}

impl RasterSource for RemoteSubsetSource {
    fn enumerate(&self, range: &DateRange) -> Result<Vec<DayReference>> {
        if range.is_empty() {
            return Err(ExtractionError::EmptyRange {
                start: range.start,
                end: range.end,
            });
        }
        Ok(range
            .days()
            .map(|date| DayReference {
                date,
                location: DayLocation::Remote(self.day_url(date)),
            })
            .collect())
    }

    fn crop_window(&self, bbox: &BoundingBox) -> BoundingBox {
        bbox.at_origin()
    }

    fn name(&self) -> &'static str {
        "opendap"
    }
}
