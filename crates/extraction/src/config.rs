//! Extraction configuration.
//!
//! Defaults mirror the published lake product layout. Values can be loaded
//! from a YAML file and then overridden from the environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lake_common::time::parse_date;
use lake_common::DateRange;
use raster_io::Compression;

use crate::error::{ExtractionError, Result};

/// Product version of the daily dataset.
pub const DEFAULT_VERSION: &str = "2.0.2";

/// Variables extracted when none are requested.
pub const DEFAULT_VARIABLES: [&str; 3] = [
    "lake_surface_water_temperature",
    "lswt_quality_level",
    "lake_ice_cover_class",
];

pub const DEFAULT_START: &str = "1992-09-26";
pub const DEFAULT_END: &str = "2020-12-31";

pub const DEFAULT_COMPRESSION_LEVEL: u8 = 4;
pub const DEFAULT_PROCESSES: usize = 4;

pub const DEFAULT_OPENDAP_BASE_URL: &str =
    "https://data.cci.ceda.ac.uk/thredds/dodsC/esacci/lakes/data/lake_products/L3S";
pub const DEFAULT_DATASET_ID: &str = "ESACCI-LAKES-L3S-LK_PRODUCTS-MERGED";
pub const DEFAULT_TABLE_BASE_URL: &str = "https://climate.esa.int/documents/1637";

/// Name of the id-mask variable in the static mask file.
pub const MASK_ID_VARIABLE: &str = "CCI_lakeid";
/// Name of the shoreline distance variable in the static mask file.
pub const MASK_DISTANCE_VARIABLE: &str = "distance_to_land";

/// Where daily rasters are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Files under the raw data directory
    #[default]
    Local,
    /// Per-day OPeNDAP subset requests
    Opendap,
}

impl FromStr for SourceMode {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(SourceMode::Local),
            "opendap" | "remote" => Ok(SourceMode::Opendap),
            other => Err(ExtractionError::InvalidConfig(format!(
                "unknown source mode '{}'",
                other
            ))),
        }
    }
}

/// Settings shared by every region in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Root holding `raw/`, `extracted/` and `auxiliary/`
    pub data_root: PathBuf,
    pub version: String,
    pub variables: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub source: SourceMode,
    pub compress: bool,
    pub compression_level: u8,
    pub opendap_base_url: String,
    pub dataset_id: String,
    pub table_base_url: String,
    /// Number of regions extracted concurrently
    pub processes: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            version: DEFAULT_VERSION.to_string(),
            variables: DEFAULT_VARIABLES.iter().map(|v| v.to_string()).collect(),
            start_date: parse_date(DEFAULT_START).unwrap_or_default(),
            end_date: parse_date(DEFAULT_END).unwrap_or_default(),
            source: SourceMode::Local,
            compress: true,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            opendap_base_url: DEFAULT_OPENDAP_BASE_URL.to_string(),
            dataset_id: DEFAULT_DATASET_ID.to_string(),
            table_base_url: DEFAULT_TABLE_BASE_URL.to_string(),
            processes: DEFAULT_PROCESSES,
        }
    }
}

impl ExtractionConfig {
    /// Load configuration from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            ExtractionError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded extraction config");
        Ok(config)
    }

    /// Defaults overridden from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `LAKES_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("LAKES_DATA_ROOT") {
            self.data_root = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("LAKES_VERSION") {
            self.version = val;
        }

        if let Ok(val) = std::env::var("LAKES_SOURCE") {
            if let Ok(mode) = val.parse() {
                self.source = mode;
            }
        }

        if let Ok(val) = std::env::var("LAKES_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                self.compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("LAKES_PROCESSES") {
            if let Ok(n) = val.parse() {
                self.processes = n;
            }
        }

        if let Ok(val) = std::env::var("LAKES_OPENDAP_BASE_URL") {
            self.opendap_base_url = val;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(ExtractionError::InvalidConfig(format!(
                "compression level {} is outside 0-9",
                self.compression_level
            )));
        }
        if self.start_date > self.end_date {
            return Err(ExtractionError::InvalidConfig(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if self.processes == 0 {
            return Err(ExtractionError::InvalidConfig(
                "processes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn compression(&self) -> Compression {
        if self.compress && self.compression_level > 0 {
            Compression::deflate(self.compression_level)
        } else {
            Compression::none()
        }
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    /// Directory of the daily input rasters.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_root.join("raw").join(format!("v{}", self.version))
    }

    pub fn auxiliary_dir(&self) -> PathBuf {
        self.data_root.join("auxiliary")
    }

    pub fn mask_path(&self) -> PathBuf {
        self.auxiliary_dir()
            .join(format!("ESA_CCI_static_lake_mask_{}.nc", self.version))
    }

    pub fn abbreviations_path(&self) -> PathBuf {
        self.auxiliary_dir().join("abbreviations.json")
    }

    pub fn table_filename(&self) -> String {
        format!("lakescci_v{}_data-availability.csv", self.version)
    }

    pub fn table_path(&self) -> PathBuf {
        self.auxiliary_dir().join(self.table_filename())
    }

    /// Published location of the region table.
    pub fn table_url(&self) -> String {
        format!(
            "{}/{}",
            self.table_base_url.trim_end_matches('/'),
            self.table_filename()
        )
    }

    /// Output directory, optionally the temporary subdirectory.
    pub fn extracted_dir(&self, temp: bool) -> PathBuf {
        let dir = self.data_root.join("extracted");
        if temp {
            dir.join("temp")
        } else {
            dir
        }
    }
}
