//! Region table loading (the local copy first, else the published one) and
//! resolution of the requested regions against it.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{error, info, warn};

use extraction::{ExtractionConfig, RegionResolver, RegionTable, ResolutionPolicy};

/// Load the region table for `config`.
///
/// A fetched table is saved under the auxiliary directory so later runs read
/// it locally; failing to save it is only logged.
pub async fn load_region_table(config: &ExtractionConfig) -> Result<RegionTable> {
    let path = config.table_path();
    if path.is_file() {
        info!(path = %path.display(), "Loading local region table");
        return RegionTable::from_path(&path)
            .with_context(|| format!("Failed to read region table {}", path.display()));
    }

    let url = config.table_url();
    info!(url = %url, "Fetching region table");
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")?;
    let body = client
        .get(&url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to fetch {}", url))?
        .text()
        .await
        .with_context(|| format!("Failed to read {}", url))?;

    let table = RegionTable::from_reader(body.as_bytes())
        .with_context(|| format!("Failed to parse region table from {}", url))?;

    let saved = std::fs::create_dir_all(config.auxiliary_dir())
        .and_then(|_| std::fs::write(&path, &body));
    if let Err(e) = saved {
        warn!(path = %path.display(), error = %e, "Failed to cache region table");
    }
    Ok(table)
}

/// Resolve requested ids, then names, to `(id, name)` targets.
///
/// Regions that fail to resolve are logged and skipped. A region requested
/// twice is kept once, in first-requested order.
pub fn resolve_targets(
    table: Option<&RegionTable>,
    policy: &dyn ResolutionPolicy,
    ids: &[u32],
    names: &[String],
) -> Vec<(u32, String)> {
    let resolver = RegionResolver::new(table, policy);
    let mut targets: Vec<(u32, String)> = Vec::new();
    let lookups = ids
        .iter()
        .map(|&id| (Some(id), None))
        .chain(names.iter().map(|name| (None, Some(name.as_str()))));
    for (id, name) in lookups {
        match resolver.resolve(id, name) {
            Ok(target) if targets.iter().any(|(known, _)| *known == target.0) => {
                warn!(region_id = target.0, "Region requested twice");
            }
            Ok(target) => targets.push(target),
            Err(e) => error!(region_id = ?id, name = ?name, error = %e, "Skipping region"),
        }
    }
    targets
}
