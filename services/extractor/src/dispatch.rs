//! Region dispatcher: one blocking extraction per region on a bounded pool.
//!
//! Every region yields a [`RegionOutcome`]. A failed or panicked worker is
//! recorded and its siblings keep running.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument};

use extraction::{
    AbbreviationTable, ErrorKind, ExtractionConfig, ExtractionOutcome, ExtractionRequest,
    RegionExtractor,
};
use raster_io::RasterBackend;

/// Why a region produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The extraction returned an error
    Extraction(ErrorKind),
    /// The worker panicked or was cancelled
    Aborted,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Extraction(kind) => write!(f, "{}", kind),
            FailureKind::Aborted => f.write_str("aborted"),
        }
    }
}

/// Result of one region's extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionOutcome {
    Extracted(ExtractionOutcome),
    Failed {
        region_id: u32,
        kind: FailureKind,
        message: String,
    },
}

impl RegionOutcome {
    pub fn region_id(&self) -> u32 {
        match self {
            RegionOutcome::Extracted(outcome) => outcome.region_id,
            RegionOutcome::Failed { region_id, .. } => *region_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RegionOutcome::Extracted(_))
    }
}

/// Receives progress of a dispatch run.
pub trait RunObserver: Send + Sync {
    fn run_started(&self, regions: usize, source: &str);

    fn region_started(&self, region_id: u32);

    fn region_finished(&self, outcome: &RegionOutcome);

    fn run_finished(&self, summary: &DispatchSummary);
}

/// Observer writing the process log through `tracing`.
///
/// Messages carry an `indent` field: 0 for the run, 1 for a region and 2 for
/// a region's failure detail.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn run_started(&self, regions: usize, source: &str) {
        info!(indent = 0, regions, source, "Start extracting regions");
    }

    fn region_started(&self, region_id: u32) {
        info!(indent = 1, region_id, "Extracting region");
    }

    fn region_finished(&self, outcome: &RegionOutcome) {
        match outcome {
            RegionOutcome::Extracted(o) => info!(
                indent = 1,
                region_id = o.region_id,
                file = %o.filename,
                days = o.days,
                cells = o.cell_count,
                elapsed_secs = o.elapsed.as_secs_f64(),
                "Region extracted"
            ),
            RegionOutcome::Failed {
                region_id,
                kind,
                message,
            } => error!(
                indent = 2,
                region_id,
                kind = %kind,
                error = %message,
                "Region failed"
            ),
        }
    }

    fn run_finished(&self, summary: &DispatchSummary) {
        info!(
            indent = 0,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Finished extracting regions"
        );
    }
}

/// Aggregated outcomes of a dispatch run, in completion order.
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub outcomes: Vec<RegionOutcome>,
    pub elapsed: Duration,
}

impl DispatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Failure counts per kind, most frequent first.
    pub fn failures_by_kind(&self) -> Vec<(FailureKind, usize)> {
        let mut counts: Vec<(FailureKind, usize)> = Vec::new();
        for outcome in &self.outcomes {
            if let RegionOutcome::Failed { kind, .. } = outcome {
                match counts.iter_mut().find(|(k, _)| k == kind) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((*kind, 1)),
                }
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }

    pub fn outcome(&self, region_id: u32) -> Option<&RegionOutcome> {
        self.outcomes.iter().find(|o| o.region_id() == region_id)
    }
}

/// Runs region extractions concurrently.
pub struct Dispatcher<B> {
    backend: B,
    config: Arc<ExtractionConfig>,
    abbreviations: Arc<AbbreviationTable>,
    observer: Arc<dyn RunObserver>,
    pool_size: usize,
}

impl<B> Dispatcher<B>
where
    B: RasterBackend + Clone + 'static,
{
    pub fn new(backend: B, config: ExtractionConfig, abbreviations: AbbreviationTable) -> Self {
        let pool_size = config.processes.max(1);
        Self {
            backend,
            config: Arc::new(config),
            abbreviations: Arc::new(abbreviations),
            observer: Arc::new(TracingObserver),
            pool_size,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Extract every request, at most `pool_size` at a time.
    ///
    /// Requests must carry both the region id and name.
    #[instrument(skip(self, requests), fields(regions = requests.len(), pool = self.pool_size))]
    pub async fn run(&self, requests: Vec<ExtractionRequest>) -> DispatchSummary {
        let started = Instant::now();
        let source = requests
            .first()
            .map(|r| format!("{:?}", r.mode).to_lowercase())
            .unwrap_or_default();
        self.observer.run_started(requests.len(), &source);

        let outcomes: Vec<RegionOutcome> = stream::iter(requests)
            .map(|request| self.spawn(request))
            .buffer_unordered(self.pool_size)
            .collect()
            .await;

        let summary = DispatchSummary {
            outcomes,
            elapsed: started.elapsed(),
        };
        self.observer.run_finished(&summary);
        summary
    }

    async fn spawn(&self, request: ExtractionRequest) -> RegionOutcome {
        let region_id = request.region_id.unwrap_or_default();
        let backend = self.backend.clone();
        let config = Arc::clone(&self.config);
        let abbreviations = Arc::clone(&self.abbreviations);
        let observer = Arc::clone(&self.observer);

        observer.region_started(region_id);
        let joined = tokio::task::spawn_blocking(move || {
            RegionExtractor::new(&backend, &config, &abbreviations).extract(&request)
        })
        .await;

        let outcome = match joined {
            Ok(Ok(outcome)) => RegionOutcome::Extracted(outcome),
            Ok(Err(e)) => RegionOutcome::Failed {
                region_id,
                kind: FailureKind::Extraction(e.kind()),
                message: e.to_string(),
            },
            Err(e) => RegionOutcome::Failed {
                region_id,
                kind: FailureKind::Aborted,
                message: e.to_string(),
            },
        };
        observer.region_finished(&outcome);
        outcome
    }
}
