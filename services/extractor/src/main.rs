//! Lake subset extractor
//!
//! Extracts the cells of selected lakes from the daily ESA CCI Lakes archive
//! into one NetCDF file per lake.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use extraction::{
    AbbreviationTable, ExtractionConfig, ExtractionRequest, ResolutionPolicy, SourceMode,
    StrictPolicy,
};
use extractor::logging::{self, DEFAULT_LOG_FILE};
use extractor::table::{load_region_table, resolve_targets};
use extractor::{Dispatcher, InteractivePolicy, RegionOutcome};
use lake_common::time::parse_date;
use raster_io::NetCdfBackend;

/// Lake subset extractor
#[derive(Parser, Debug)]
#[command(name = "lake-extractor")]
#[command(about = "Extract single lakes from the ESA CCI Lakes daily archive")]
struct Args {
    /// Region ids to extract
    ids: Vec<u32>,

    /// Region names to extract, looked up in the region table
    #[arg(short, long = "name")]
    names: Vec<String>,

    /// Extract every region in the region table
    #[arg(long, conflicts_with_all = ["ids", "names"])]
    all: bool,

    /// Configuration file (YAML)
    #[arg(short, long, env = "LAKES_CONFIG")]
    config: Option<PathBuf>,

    /// Data root holding raw/, extracted/ and auxiliary/
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Read each day through OPeNDAP instead of local files
    #[arg(long)]
    opendap: bool,

    /// First day (YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,

    /// Last day (YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,

    /// Variables to extract
    #[arg(long, value_delimiter = ',')]
    vars: Vec<String>,

    /// Write uncompressed output
    #[arg(long)]
    no_compress: bool,

    /// Deflate level (0-9)
    #[arg(long)]
    complevel: Option<u8>,

    /// Number of regions extracted concurrently
    #[arg(short, long)]
    processes: Option<usize>,

    /// Region ids merged into every extracted region
    #[arg(long, value_delimiter = ',')]
    merge_with: Vec<u32>,

    /// Write under extracted/temp
    #[arg(long)]
    temp: bool,

    /// Process log file
    #[arg(long, default_value = DEFAULT_LOG_FILE, env = "LAKES_LOG_FILE")]
    log_file: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Fail lookups that miss or match several regions instead of prompting
    #[arg(long)]
    non_interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    logging::init(&args.log_level, Some(&args.log_file))?;

    let config = load_config(&args)?;
    let abbreviations = AbbreviationTable::from_path(&config.abbreviations_path())
        .with_context(|| {
            format!(
                "Failed to load abbreviations from {}",
                config.abbreviations_path().display()
            )
        })?;
    abbreviations.validate(&config.variables)?;

    let table = match load_region_table(&config).await {
        Ok(table) => Some(table),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Region table unavailable");
            None
        }
    };

    let ids = if args.all {
        match &table {
            Some(table) => table.ids(),
            None => bail!("--all needs the region table"),
        }
    } else {
        args.ids.clone()
    };

    // Prompts block on stdin, keep them off the runtime workers.
    let names = args.names.clone();
    let non_interactive = args.non_interactive;
    let targets = tokio::task::spawn_blocking(move || {
        let policy: Box<dyn ResolutionPolicy> = if non_interactive {
            Box::new(StrictPolicy)
        } else {
            Box::new(InteractivePolicy::stdio())
        };
        resolve_targets(table.as_ref(), policy.as_ref(), &ids, &names)
    })
    .await
    .context("Region lookup task failed")?;
    if targets.is_empty() {
        bail!("No regions to extract");
    }

    let requests: Vec<ExtractionRequest> = targets
        .into_iter()
        .map(|(id, name)| {
            let mut request = ExtractionRequest::from_config(&config, id).with_name(name);
            request.merge_with = args.merge_with.clone();
            request.temp = args.temp;
            request
        })
        .collect();

    match config.source {
        SourceMode::Local => println!("Start extracting {} lakes from local dataset..", requests.len()),
        SourceMode::Opendap => println!(
            "Start extracting {} lakes using OPeNDAP (slow)..",
            requests.len()
        ),
    }

    let dispatcher = Dispatcher::new(NetCdfBackend::new(), config, abbreviations);
    let summary = dispatcher.run(requests).await;

    for outcome in &summary.outcomes {
        match outcome {
            RegionOutcome::Extracted(o) => println!(
                "  ID{:<8} {} ({} days, {:.1}s)",
                o.region_id,
                o.filename,
                o.days,
                o.elapsed.as_secs_f64()
            ),
            RegionOutcome::Failed {
                region_id,
                kind,
                message,
            } => println!("  ID{:<8} failed [{}]: {}", region_id, kind, message),
        }
    }
    println!(
        "Extracted {} of {} lakes in {:.1}s",
        summary.succeeded(),
        summary.outcomes.len(),
        summary.elapsed.as_secs_f64()
    );
    info!(failures = ?summary.failures_by_kind(), "Run complete");

    if summary.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Configuration file (or defaults), then environment, then command line.
fn load_config(args: &Args) -> Result<ExtractionConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractionConfig::from_yaml(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExtractionConfig::from_env(),
    };
    if args.config.is_some() {
        config.apply_env();
    }
    apply_args(args, &mut config)?;
    config.validate()?;
    Ok(config)
}

fn apply_args(args: &Args, config: &mut ExtractionConfig) -> Result<()> {
    if let Some(root) = &args.data_root {
        config.data_root = root.clone();
    }
    if args.opendap {
        config.source = SourceMode::Opendap;
    }
    if let Some(start) = &args.start {
        config.start_date = parse_date(start).context("Invalid --start")?;
    }
    if let Some(end) = &args.end {
        config.end_date = parse_date(end).context("Invalid --end")?;
    }
    if !args.vars.is_empty() {
        config.variables = args.vars.clone();
    }
    if args.no_compress {
        config.compress = false;
    }
    if let Some(level) = args.complevel {
        config.compression_level = level;
    }
    if let Some(processes) = args.processes {
        config.processes = processes;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_args_override_config() {
        let args = Args::try_parse_from([
            "lake-extractor",
            "2",
            "6",
            "--opendap",
            "--start",
            "2000-01-01",
            "--vars",
            "lake_surface_water_temperature,lake_ice_cover_class",
            "--complevel",
            "7",
            "--processes",
            "2",
            "--merge-with",
            "11,12",
        ])
        .unwrap();
        assert_eq!(args.ids, vec![2, 6]);
        assert_eq!(args.merge_with, vec![11, 12]);

        let mut config = ExtractionConfig::default();
        apply_args(&args, &mut config).unwrap();
        assert_eq!(config.source, SourceMode::Opendap);
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert_eq!(config.variables.len(), 2);
        assert_eq!(config.compression_level, 7);
        assert_eq!(config.processes, 2);
        assert!(config.compress);
    }

    #[test]
    fn test_all_conflicts_with_ids() {
        assert!(Args::try_parse_from(["lake-extractor", "--all", "3"]).is_err());
        assert!(Args::try_parse_from(["lake-extractor", "--all"]).is_ok());
    }

    #[test]
    fn test_invalid_date_rejected() {
        let args = Args::try_parse_from(["lake-extractor", "1", "--end", "2020-13-01"]).unwrap();
        let mut config = ExtractionConfig::default();
        assert!(apply_args(&args, &mut config).is_err());
    }
}
