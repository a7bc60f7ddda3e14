//! End-to-end extraction tests against the in-memory raster backend.
//!
//! Daily inputs are placeholder files in a temporary archive (so the local
//! source can walk them) whose contents are registered in a
//! [`MemoryBackend`] under the same path.

use chrono::NaiveDate;

use extraction::{
    AbbreviationTable, ExtractionConfig, ExtractionError, ExtractionOutcome, ExtractionRequest,
    RegionExtractor, RegionResolver, RegionTable, RemoteSubsetSource, SourceMode, StrictPolicy,
};
use lake_common::{BoundingBox, DateRange};
use raster_io::{AttrValue, Compression, DataType, MemoryBackend, MemoryDataset, NC_FILL_FLOAT};
use test_utils::{
    assert_approx_eq, assert_masked_plane, day_dataset, gridded_variable, grid_with,
    mask_dataset, scenario, tables, temperature_day, TestArchive, TEMPERATURE,
};

const VERSION: &str = "2.0.2";
const FILL: f64 = NC_FILL_FLOAT as f64;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

struct Harness {
    archive: TestArchive,
    backend: MemoryBackend,
    config: ExtractionConfig,
    abbreviations: AbbreviationTable,
}

impl Harness {
    /// Archive with the scenario mask registered.
    fn new() -> Self {
        let harness = Self::without_mask();
        harness.backend.insert(
            harness.config.mask_path().to_string_lossy(),
            mask_dataset(scenario::ROWS, scenario::COLS, scenario::ids()),
        );
        harness
    }

    fn without_mask() -> Self {
        let archive = TestArchive::new(VERSION);
        let config = ExtractionConfig {
            data_root: archive.root().to_path_buf(),
            version: VERSION.to_string(),
            variables: vec![TEMPERATURE.to_string()],
            compress: false,
            ..ExtractionConfig::default()
        };
        let abbreviations = AbbreviationTable::from_path(
            &archive.write_auxiliary("abbreviations.json", tables::ABBREVIATIONS_JSON),
        )
        .unwrap();
        Self {
            archive,
            backend: MemoryBackend::new(),
            config,
            abbreviations,
        }
    }

    /// Register a local day file holding `dataset`.
    fn add_local_day(&self, day: NaiveDate, dataset: MemoryDataset) {
        let path = self.archive.add_day(day);
        self.backend.insert(path.to_string_lossy(), dataset);
    }

    fn request(&self, start: &str, end: &str) -> ExtractionRequest {
        let mut request =
            ExtractionRequest::from_config(&self.config, scenario::REGION_ID).with_name("Tana");
        request.range = DateRange::parse(start, end).unwrap();
        request
    }

    fn extract(&self, request: &ExtractionRequest) -> extraction::Result<ExtractionOutcome> {
        RegionExtractor::new(&self.backend, &self.config, &self.abbreviations).extract(request)
    }

    fn output(&self, outcome: &ExtractionOutcome) -> MemoryDataset {
        self.backend
            .get_path(&outcome.path)
            .expect("output registered in backend")
    }

    fn outputs(&self) -> Vec<String> {
        self.backend
            .locations()
            .into_iter()
            .filter(|l| l.ends_with(".extracted.nc"))
            .collect()
    }
}

/// Temperature grid that is fill everywhere except `value` at `(row, col)`.
fn single_cell_day(day: NaiveDate, row: usize, col: usize, value: f64) -> MemoryDataset {
    day_dataset(
        day,
        scenario::ROWS,
        scenario::COLS,
        vec![(
            gridded_variable(TEMPERATURE, DataType::F32),
            grid_with(scenario::ROWS, scenario::COLS, |r, c| {
                if (r, c) == (row, col) {
                    value
                } else {
                    FILL
                }
            }),
        )],
    )
}

/// Temperature grid whose value at `(row, col)` encodes the cell and the day.
fn encoded_grid(offset: f64) -> Vec<f64> {
    grid_with(scenario::ROWS, scenario::COLS, |r, c| {
        offset + (r * scenario::COLS + c) as f64
    })
}

fn encoded_day(day: NaiveDate, offset: f64) -> MemoryDataset {
    day_dataset(
        day,
        scenario::ROWS,
        scenario::COLS,
        vec![(
            gridded_variable(TEMPERATURE, DataType::F32),
            encoded_grid(offset),
        )],
    )
}

// ============================================================================
// Masked subset contents
// ============================================================================

#[test]
fn test_two_day_single_cell_scenario() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), single_cell_day(date("2020-01-01"), 3, 6, 10.0));
    h.add_local_day(date("2020-01-02"), single_cell_day(date("2020-01-02"), 3, 6, 12.0));

    let outcome = h.extract(&h.request("2020-01-01", "2020-01-02")).unwrap();
    assert_eq!(outcome.days, 2);
    assert_eq!(outcome.cell_count, 9);
    assert_eq!(
        outcome.filename,
        "ID3-tana-LSWT-20200101_20200102-v2.0.2.extracted.nc"
    );
    assert!(outcome.path.starts_with(h.config.extracted_dir(false)));

    let out = h.output(&outcome);
    assert_eq!(out.shape(TEMPERATURE).unwrap(), vec![2, 3, 3]);
    let values = out.values(TEMPERATURE).unwrap();
    for (idx, &value) in values.iter().enumerate() {
        match idx {
            // [0, 1, 1] and [1, 1, 1]
            4 => assert_eq!(value, 10.0),
            13 => assert_eq!(value, 12.0),
            _ => assert_eq!(value, FILL, "cell {} is not fill", idx),
        }
    }
}

#[test]
fn test_bounding_box_and_region_attributes() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));

    let outcome = h.extract(&h.request("2020-01-01", "2020-01-01")).unwrap();
    let out = h.output(&outcome);

    assert_eq!(out.dimension("lat").unwrap().len, 3);
    assert_eq!(out.dimension("lon").unwrap().len, 3);
    assert!(out.dimension("time").unwrap().unlimited);

    // Cropped cells come from rows 2-4, cols 5-7 of the source grid
    let values = out.values(TEMPERATURE).unwrap();
    assert_eq!(values[0], 25.0);
    assert_eq!(values[8], 47.0);

    let lat = out.values("lat").unwrap();
    let full_lat = test_utils::lat_values(scenario::ROWS);
    assert_approx_eq!(lat[0], full_lat[2], 1e-4);
    assert_approx_eq!(lat[2], full_lat[4], 1e-4);

    assert_eq!(out.attribute("lakename").and_then(AttrValue::as_str), Some("Tana"));
    assert_eq!(out.attribute("lakeid"), Some(&AttrValue::I64(vec![3])));
    assert_eq!(out.attribute("lakecells"), Some(&AttrValue::I64(vec![9])));
    assert_eq!(
        out.attribute("title").and_then(AttrValue::as_str),
        Some("ESA CCI Lakes daily product")
    );
}

#[test]
fn test_derived_layers() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));

    let outcome = h.extract(&h.request("2020-01-01", "2020-01-01")).unwrap();
    let out = h.output(&outcome);

    assert_eq!(out.values("lakemask").unwrap(), &[1.0; 9]);
    let distance = out.values("distance_to_land").unwrap();
    // Distance encodes row * 10 + col in the mask grid
    assert_eq!(distance[0], 25.0);
    assert_eq!(distance[4], 36.0);
    assert_eq!(out.variable("lakemask").unwrap().dtype, DataType::U8);
}

#[test]
fn test_zero_variables_writes_only_derived_layers() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));
    h.add_local_day(date("2020-01-02"), encoded_day(date("2020-01-02"), 100.0));

    let mut request = h.request("2020-01-01", "2020-01-02");
    request.variables = vec![];
    let outcome = h.extract(&request).unwrap();
    assert_eq!(outcome.days, 2);
    assert_eq!(
        outcome.filename,
        "ID3-tana--20200101_20200102-v2.0.2.extracted.nc"
    );

    let out = h.output(&outcome);
    assert!(out.variable(TEMPERATURE).is_none());
    assert_eq!(out.values("lakemask").unwrap(), &[1.0; 9]);
    assert!(out.values("distance_to_land").is_some());
    assert_eq!(out.dimension("time").unwrap().len, 2);
    assert_eq!(out.values("time").unwrap().len(), 2);
}

#[test]
fn test_merged_regions_fill_non_members() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));

    let mut request = h.request("2020-01-01", "2020-01-01");
    request.merge_with = vec![scenario::NEIGHBOUR_ID];
    let outcome = h.extract(&request).unwrap();
    assert_eq!(outcome.cell_count, 13);

    let out = h.output(&outcome);
    // Rows 2-8, cols 0-7
    assert_eq!(out.shape(TEMPERATURE).unwrap(), vec![1, 7, 8]);

    let ids = scenario::ids();
    let source = |idx: usize| (idx / 8 + 2) * scenario::COLS + idx % 8;
    let membership: Vec<bool> = (0..7 * 8).map(|idx| ids[source(idx)] != 0.0).collect();

    assert_masked_plane!(out.values(TEMPERATURE).unwrap(), &membership, FILL, |idx| {
        source(idx) as f64
    });
    assert_masked_plane!(out.values("lakemask").unwrap(), &membership, 255.0, |_| 1.0);
}

#[test]
fn test_declared_fill_value_is_used() {
    let h = Harness::new();
    let day = date("2020-01-01");
    h.add_local_day(
        day,
        day_dataset(
            day,
            scenario::ROWS,
            scenario::COLS,
            vec![(
                gridded_variable(TEMPERATURE, DataType::I16).with_attribute(
                    "_FillValue",
                    AttrValue::I16(vec![-999]),
                ),
                encoded_grid(0.0),
            )],
        ),
    );

    let mut request = h.request("2020-01-01", "2020-01-01");
    request.merge_with = vec![scenario::NEIGHBOUR_ID];
    let outcome = h.extract(&request).unwrap();
    let values = h.output(&outcome).values(TEMPERATURE).unwrap().to_vec();
    // Row 2, col 0 of the source lies in neither region
    assert_eq!(values[0], -999.0);
}

// ============================================================================
// Time axis
// ============================================================================

#[test]
fn test_time_axis_and_coverage_end() {
    let h = Harness::new();
    // Registered out of order on purpose
    for (day, offset) in [("2020-01-03", 300.0), ("2020-01-01", 100.0), ("2020-01-02", 200.0)] {
        h.add_local_day(date(day), encoded_day(date(day), offset));
    }

    let outcome = h.extract(&h.request("2020-01-01", "2020-01-31")).unwrap();
    assert_eq!(outcome.days, 3);

    let out = h.output(&outcome);
    assert_eq!(out.dimension("time").unwrap().len, 3);
    let time = out.values("time").unwrap();
    assert_eq!(
        time,
        &[
            test_utils::seconds_since_epoch(date("2020-01-01")),
            test_utils::seconds_since_epoch(date("2020-01-02")),
            test_utils::seconds_since_epoch(date("2020-01-03")),
        ]
    );
    assert!(time.windows(2).all(|w| w[0] < w[1]));

    // Centre cell (3, 6) per day
    let values = out.values(TEMPERATURE).unwrap();
    assert_eq!(values[4], 136.0);
    assert_eq!(values[13], 236.0);
    assert_eq!(values[22], 336.0);

    assert_eq!(
        out.attribute("time_coverage_end").and_then(AttrValue::as_str),
        Some("20200103T235959Z")
    );
    assert_eq!(
        out.attribute("time_coverage_start").and_then(AttrValue::as_str),
        Some("20200101T000000Z")
    );
}

#[test]
fn test_range_filters_local_days() {
    let h = Harness::new();
    for day in ["2019-12-31", "2020-01-01", "2020-01-02", "2020-01-03"] {
        h.add_local_day(date(day), temperature_day(date(day), 10, 10, 280.0));
    }

    let outcome = h.extract(&h.request("2020-01-01", "2020-01-02")).unwrap();
    assert_eq!(outcome.days, 2);
}

#[test]
fn test_missing_coverage_end_keeps_previous_value() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));

    // A dataset without time_coverage_end
    let second = date("2020-01-02");
    let bare = MemoryDataset::new()
        .with_unlimited_dimension("time", 1)
        .with_dimension("lat", scenario::ROWS)
        .with_dimension("lon", scenario::COLS)
        .with_variable(
            raster_io::VariableInfo::new("time", DataType::F64, &["time"]),
            vec![test_utils::seconds_since_epoch(second)],
        )
        .with_variable(
            raster_io::VariableInfo::new("lat", DataType::F32, &["lat"]),
            test_utils::lat_values(scenario::ROWS),
        )
        .with_variable(
            raster_io::VariableInfo::new("lon", DataType::F32, &["lon"]),
            test_utils::lon_values(scenario::COLS),
        )
        .with_variable(
            gridded_variable(TEMPERATURE, DataType::F32),
            encoded_grid(0.0),
        );
    h.add_local_day(second, bare);

    let outcome = h.extract(&h.request("2020-01-01", "2020-01-02")).unwrap();
    let out = h.output(&outcome);
    assert_eq!(out.dimension("time").unwrap().len, 2);
    assert_eq!(
        out.attribute("time_coverage_end").and_then(AttrValue::as_str),
        Some("20200101T235959Z")
    );
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_empty_region_creates_no_output() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));

    let mut request = h.request("2020-01-01", "2020-01-01");
    request.region_id = Some(scenario::MISSING_ID);
    let err = h.extract(&request).unwrap_err();

    assert!(matches!(err, ExtractionError::EmptyRegion { region_id: 42 }));
    assert!(h.outputs().is_empty());
}

#[test]
fn test_no_local_data_creates_no_output() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));

    let err = h.extract(&h.request("2021-01-01", "2021-12-31")).unwrap_err();
    assert!(matches!(err, ExtractionError::NoData { .. }));
    assert!(h.outputs().is_empty());
}

#[test]
fn test_empty_remote_range_creates_no_output() {
    let h = Harness::new();
    let mut request = h.request("2020-02-01", "2020-01-01");
    request.mode = SourceMode::Opendap;

    let err = h.extract(&request).unwrap_err();
    assert!(matches!(err, ExtractionError::EmptyRange { .. }));
    assert!(h.outputs().is_empty());
}

#[test]
fn test_unknown_variable_fails_before_any_work() {
    let h = Harness::without_mask();
    let mut request = h.request("2020-01-01", "2020-01-01");
    request.variables = vec![TEMPERATURE.to_string(), "chlorophyll_a".to_string()];

    match h.extract(&request) {
        Err(ExtractionError::InvalidVariable(unknown)) => {
            assert_eq!(unknown, vec!["chlorophyll_a".to_string()])
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_missing_mask_file() {
    let h = Harness::without_mask();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));

    let err = h.extract(&h.request("2020-01-01", "2020-01-01")).unwrap_err();
    match err {
        ExtractionError::MaskFileMissing(path) => assert_eq!(path, h.config.mask_path()),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(h.outputs().is_empty());
}

#[test]
fn test_schema_mismatch_keeps_completed_days() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));
    h.add_local_day(date("2020-01-02"), encoded_day(date("2020-01-02"), 100.0));
    h.add_local_day(
        date("2020-01-03"),
        day_dataset(date("2020-01-03"), scenario::ROWS, scenario::COLS, Vec::new()),
    );

    let err = h.extract(&h.request("2020-01-01", "2020-01-03")).unwrap_err();
    match &err {
        ExtractionError::SchemaMismatch { day, reason } => {
            assert_eq!(*day, date("2020-01-03"));
            assert!(reason.contains(TEMPERATURE));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.kind(), extraction::ErrorKind::SchemaMismatch);

    // Days appended before the failure remain in the output
    let outputs = h.outputs();
    assert_eq!(outputs.len(), 1);
    let partial = h.backend.get(&outputs[0]).unwrap();
    assert_eq!(partial.dimension("time").unwrap().len, 2);
}

#[test]
fn test_changed_dtype_is_a_schema_mismatch() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));
    h.add_local_day(
        date("2020-01-02"),
        day_dataset(
            date("2020-01-02"),
            scenario::ROWS,
            scenario::COLS,
            vec![(gridded_variable(TEMPERATURE, DataType::F64), encoded_grid(0.0))],
        ),
    );

    let err = h.extract(&h.request("2020-01-01", "2020-01-02")).unwrap_err();
    assert!(matches!(err, ExtractionError::SchemaMismatch { .. }));
}

// ============================================================================
// Sources and options
// ============================================================================

#[test]
fn test_local_and_remote_outputs_match() {
    let h = Harness::new();
    let days = [date("2020-01-01"), date("2020-01-02")];
    let bbox = BoundingBox::new(2, 5, 5, 8);
    let remote = RemoteSubsetSource::new(
        &h.config.opendap_base_url,
        VERSION,
        &h.config.dataset_id,
        bbox,
        &h.config.variables,
    );

    for (i, &day) in days.iter().enumerate() {
        let offset = 100.0 * i as f64;
        h.add_local_day(day, encoded_day(day, offset));

        // The server returns only the requested window
        let full = encoded_grid(offset);
        let window: Vec<f64> = bbox
            .rows()
            .flat_map(|r| bbox.cols().map(move |c| (r, c)))
            .map(|(r, c)| full[r * scenario::COLS + c])
            .collect();
        h.backend.insert(
            remote.day_url(day),
            day_dataset(
                day,
                bbox.height(),
                bbox.width(),
                vec![(gridded_variable(TEMPERATURE, DataType::F32), window)],
            ),
        );
    }

    let local = h.extract(&h.request("2020-01-01", "2020-01-02")).unwrap();
    let local_out = h.output(&local);

    let mut request = h.request("2020-01-01", "2020-01-02");
    request.mode = SourceMode::Opendap;
    request.temp = true;
    let remote_outcome = h.extract(&request).unwrap();
    let remote_out = h.output(&remote_outcome);

    assert_eq!(local.filename, remote_outcome.filename);
    assert_ne!(local.path, remote_outcome.path);
    for name in [TEMPERATURE, "lakemask", "distance_to_land", "time"] {
        assert_eq!(local_out.shape(name).unwrap(), remote_out.shape(name).unwrap(), "{}", name);
        assert_eq!(local_out.values(name), remote_out.values(name), "{}", name);
    }
}

#[test]
fn test_temp_output_directory() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));

    let mut request = h.request("2020-01-01", "2020-01-01");
    request.temp = true;
    let outcome = h.extract(&request).unwrap();
    assert_eq!(outcome.path.parent(), Some(h.config.extracted_dir(true).as_path()));
    assert!(h.config.extracted_dir(true).is_dir());
}

#[test]
fn test_compression_applies_to_every_variable() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));

    let mut request = h.request("2020-01-01", "2020-01-01");
    request.compression = Compression::deflate(4);
    let outcome = h.extract(&request).unwrap();
    let out = h.output(&outcome);

    for name in [TEMPERATURE, "lakemask", "distance_to_land"] {
        assert_eq!(out.compression(name), Some(Compression::deflate(4)), "{}", name);
    }
}

#[test]
fn test_name_resolved_from_region_table() {
    let h = Harness::new();
    h.add_local_day(date("2020-01-01"), encoded_day(date("2020-01-01"), 0.0));
    let table = RegionTable::from_reader(tables::REGION_TABLE_CSV.as_bytes()).unwrap();

    let mut request = h.request("2020-01-01", "2020-01-01");
    request.region_name = None;
    let outcome = RegionExtractor::new(&h.backend, &h.config, &h.abbreviations)
        .with_resolver(RegionResolver::new(Some(&table), &StrictPolicy))
        .extract(&request)
        .unwrap();

    assert_eq!(outcome.region_name, "Tana");
    assert!(outcome.filename.starts_with("ID3-tana-LSWT-"));
}

#[test]
fn test_name_required_without_resolver() {
    let h = Harness::new();
    let mut request = h.request("2020-01-01", "2020-01-01");
    request.region_name = None;
    assert!(matches!(h.extract(&request), Err(ExtractionError::Lookup(_))));
}
