//! Common test fixtures for lake extraction tests.
//!
//! This module provides pre-defined test data for the scenarios the
//! extraction tests share, plus a temporary archive directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tempfile::TempDir;

use crate::generators::day_filename;

/// The 10x10 grid scenario shared by the extraction tests.
pub mod scenario {
    use std::ops::Range;

    pub const ROWS: usize = 10;
    pub const COLS: usize = 10;

    /// Region occupying rows 2-4 and columns 5-7
    pub const REGION_ID: u32 = 3;
    pub const REGION_ROWS: Range<usize> = 2..5;
    pub const REGION_COLS: Range<usize> = 5..8;

    /// Small region in the opposite corner, used for merges
    pub const NEIGHBOUR_ID: u32 = 9;
    pub const NEIGHBOUR_ROWS: Range<usize> = 7..9;
    pub const NEIGHBOUR_COLS: Range<usize> = 0..2;

    /// Id that is absent from the mask
    pub const MISSING_ID: u32 = 42;

    /// Region-id grid for the scenario.
    pub fn ids() -> Vec<f64> {
        crate::generators::block_ids(
            ROWS,
            COLS,
            &[
                (REGION_ID, REGION_ROWS, REGION_COLS),
                (NEIGHBOUR_ID, NEIGHBOUR_ROWS, NEIGHBOUR_COLS),
            ],
        )
    }
}

/// Lookup table contents.
pub mod tables {
    /// Region availability table, with a duplicated name.
    pub const REGION_TABLE_CSV: &str = "\
id,name,country,lat,lon
3,Tana,Ethiopia,12.0,37.3
9,Victoria,Kenya,-1.0,33.0
12,Victoria,Uganda,-1.2,32.8
";

    /// Abbreviation table for the variables used in tests.
    pub const ABBREVIATIONS_JSON: &str = r#"{
    "lake_surface_water_temperature": "LSWT",
    "lswt_quality_level": "QL",
    "lake_ice_cover_class": "LIC"
}"#;
}

/// A temporary data root laid out as `raw/v<version>/YYYY/MM/` plus
/// `auxiliary/`.
///
/// Daily files are empty placeholders: directory walks find them while the
/// data itself lives in a memory backend under the same path.
pub struct TestArchive {
    dir: TempDir,
    version: String,
}

impl TestArchive {
    pub fn new(version: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("auxiliary")).expect("Failed to create auxiliary dir");
        Self {
            dir,
            version: version.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root().join("raw").join(format!("v{}", self.version))
    }

    pub fn auxiliary_dir(&self) -> PathBuf {
        self.root().join("auxiliary")
    }

    /// Create the placeholder file for `date` and return its path.
    pub fn add_day(&self, date: NaiveDate) -> PathBuf {
        let dir = self
            .raw_dir()
            .join(date.format("%Y").to_string())
            .join(date.format("%m").to_string());
        fs::create_dir_all(&dir).expect("Failed to create day dir");
        let path = dir.join(day_filename(date, &self.version));
        fs::write(&path, b"").expect("Failed to write day placeholder");
        path
    }

    /// Write a file under `auxiliary/` and return its path.
    pub fn write_auxiliary(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.auxiliary_dir().join(name);
        fs::write(&path, contents).expect("Failed to write auxiliary file");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_ids() {
        let ids = scenario::ids();
        assert_eq!(ids.len(), scenario::ROWS * scenario::COLS);
        assert_eq!(ids.iter().filter(|&&id| id == 3.0).count(), 9);
        assert_eq!(ids.iter().filter(|&&id| id == 9.0).count(), 4);
    }

    #[test]
    fn test_archive_layout() {
        let archive = TestArchive::new("2.0.2");
        let date = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let path = archive.add_day(date);
        assert!(path.exists());
        assert!(path.starts_with(archive.raw_dir().join("2020").join("03")));
    }
}
