//! Region extraction driver: validation, lookup, naming and the subsetting run.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use lake_common::DateRange;
use raster_io::{Compression, RasterBackend};

use crate::assembler::{AssemblyRequest, SubsetAssembler};
use crate::config::{ExtractionConfig, SourceMode};
use crate::error::{ExtractionError, Result};
use crate::lookup::{sanitize_name, AbbreviationTable, RegionResolver};
use crate::mask::MaskIndex;
use crate::source::{LocalFileSource, RasterSource, RemoteSubsetSource};

/// One region to extract.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub region_id: Option<u32>,
    pub region_name: Option<String>,
    pub variables: Vec<String>,
    pub range: DateRange,
    pub mode: SourceMode,
    pub compression: Compression,
    /// Extra region ids merged into the mask
    pub merge_with: Vec<u32>,
    /// Write under the temporary output directory
    pub temp: bool,
}

impl ExtractionRequest {
    /// Request for `region_id` using the run-wide settings of `config`.
    pub fn from_config(config: &ExtractionConfig, region_id: u32) -> Self {
        Self {
            region_id: Some(region_id),
            region_name: None,
            variables: config.variables.clone(),
            range: config.date_range(),
            mode: config.source,
            compression: config.compression(),
            merge_with: Vec::new(),
            temp: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.region_name = Some(name.into());
        self
    }
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub region_id: u32,
    pub region_name: String,
    pub filename: String,
    pub path: PathBuf,
    pub days: usize,
    pub cell_count: usize,
    pub elapsed: Duration,
}

/// Output file name for a region extraction.
///
/// `ID<id>-<name>-<codes>-<start>_<end>-v<version>.extracted.nc`, with the name
/// lowercased and the dates in compact form.
pub fn output_filename(
    region_id: u32,
    region_name: &str,
    shortnames: &str,
    range: &DateRange,
    version: &str,
) -> String {
    format!(
        "ID{}-{}-{}-{}_{}-v{}.extracted.nc",
        region_id,
        region_name.to_lowercase(),
        shortnames,
        range.start_compact(),
        range.end_compact(),
        version
    )
}

/// Runs extractions for single regions against one backend.
pub struct RegionExtractor<'a, B: RasterBackend> {
    backend: &'a B,
    config: &'a ExtractionConfig,
    abbreviations: &'a AbbreviationTable,
    resolver: Option<RegionResolver<'a>>,
}

impl<'a, B: RasterBackend> RegionExtractor<'a, B> {
    pub fn new(
        backend: &'a B,
        config: &'a ExtractionConfig,
        abbreviations: &'a AbbreviationTable,
    ) -> Self {
        Self {
            backend,
            config,
            abbreviations,
            resolver: None,
        }
    }

    /// Resolve missing ids or names through `resolver`.
    pub fn with_resolver(mut self, resolver: RegionResolver<'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Extract one region into its output file.
    #[instrument(skip(self, request), fields(region_id = ?request.region_id))]
    pub fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionOutcome> {
        let started = Instant::now();

        self.abbreviations.validate(&request.variables)?;
        let (region_id, region_name) = self.resolve(request)?;

        info!(
            region_id,
            region = %region_name,
            variables = ?request.variables,
            start = %request.range.start,
            end = %request.range.end,
            source = ?request.mode,
            "Extracting region"
        );

        let mask_path = self.config.mask_path();
        let mask_location = mask_path.to_string_lossy().into_owned();
        if !self.backend.exists(&mask_location) {
            return Err(ExtractionError::MaskFileMissing(mask_path));
        }

        let region = MaskIndex::new(self.backend, mask_location)
            .compute(region_id, &request.merge_with)?;

        let shortnames = self.abbreviations.joined_shortnames(&request.variables)?;
        let filename = output_filename(
            region_id,
            &region_name,
            &shortnames,
            &request.range,
            &self.config.version,
        );
        let dir = self.config.extracted_dir(request.temp);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(&filename);

        let source: Box<dyn RasterSource> = match request.mode {
            SourceMode::Local => Box::new(LocalFileSource::new(
                self.config.raw_dir(),
                &self.config.version,
            )),
            SourceMode::Opendap => Box::new(RemoteSubsetSource::new(
                &self.config.opendap_base_url,
                &self.config.version,
                &self.config.dataset_id,
                region.bbox,
                &request.variables,
            )),
        };
        let days = source.enumerate(&request.range)?;

        let report = SubsetAssembler::new(self.backend).assemble(&AssemblyRequest {
            days: &days,
            variables: &request.variables,
            region: &region,
            region_name: &region_name,
            window: source.crop_window(&region.bbox),
            compression: request.compression,
            output: &path,
        })?;

        let elapsed = started.elapsed();
        info!(
            region_id,
            days = report.days_written,
            elapsed_secs = elapsed.as_secs_f64(),
            output = %path.display(),
            "Finished extraction and masking"
        );

        Ok(ExtractionOutcome {
            region_id,
            region_name,
            filename,
            path,
            days: report.days_written,
            cell_count: region.cell_count,
            elapsed,
        })
    }

    fn resolve(&self, request: &ExtractionRequest) -> Result<(u32, String)> {
        match (&self.resolver, request.region_id, request.region_name.as_deref()) {
            (_, None, None) => Err(ExtractionError::MissingRegion),
            (Some(resolver), id, name) => resolver.resolve(id, name),
            (None, Some(id), Some(name)) => Ok((id, sanitize_name(name))),
            (None, _, _) => Err(ExtractionError::Lookup(
                "region id and name are both required without a lookup table".to_string(),
            )),
        }
    }
}
