//! End-to-end research pipeline: resolve → fetch → extract → aggregate →
//! validate → (bounded supplemental loop) → write.
//!
//! One controlling task owns the [`ResearchBundle`] for the whole run and
//! fans fetch work out to the fetcher's worker pool; aggregation,
//! validation, and writing are single-threaded fan-in points, so no
//! partial-result races are possible. The run deadline aborts in-flight
//! fetches but never discards completed results — the bundle always
//! proceeds to validation and writing with whatever was collected.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use docscout_cache::FetchCache;
use docscout_fetcher::Fetcher;
pub use docscout_fetcher::FetchSummary;
use docscout_resolver::{Resolver, TargetTable};
use docscout_shared::{
    BundleStatus, DocScoutError, FetchConfig, FetchResult, FetchTarget, ResearchBundle,
    ResearchRequest, Result, ValidationConfig,
};

use crate::{aggregate, validate, writer};

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// The (domain, pattern) request under research.
    pub request: ResearchRequest,
    /// Directory the bundle is written into.
    pub output_dir: PathBuf,
    /// Fetch policies (concurrency, retries, cache TTL).
    pub fetch: FetchConfig,
    /// Completeness gate settings.
    pub validation: ValidationConfig,
    /// Overall run timeout in seconds.
    pub run_timeout_secs: u64,
    /// Path of the persistent URL cache; `None` disables persistence.
    pub cache_path: Option<PathBuf>,
    /// Custom target table; `None` uses the built-in table.
    pub table: Option<TargetTable>,
}

/// Result of a completed pipeline run.
#[derive(Debug)]
pub struct ResearchOutcome {
    /// The finalized bundle (coverage included).
    pub bundle: ResearchBundle,
    /// Where the bundle was written.
    pub bundle_dir: PathBuf,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl ResearchOutcome {
    pub fn status(&self) -> BundleStatus {
        self.bundle.status()
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each fetch fan-out completes.
    fn fetched(&self, summary: &FetchSummary);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &ResearchOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn fetched(&self, _summary: &FetchSummary) {}
    fn done(&self, _outcome: &ResearchOutcome) {}
}

/// Run the full research pipeline for a request.
#[instrument(skip_all, fields(domain = %config.request.domain, pattern = %config.request.pattern))]
pub async fn run_research(
    config: &ResearchConfig,
    progress: &dyn ProgressReporter,
) -> Result<ResearchOutcome> {
    let start = Instant::now();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(config.run_timeout_secs);

    // Probe the output path up front: an unwritable destination must abort
    // before any fetch begins.
    prepare_output_dir(&config.output_dir)?;

    let resolver = match &config.table {
        Some(table) => Resolver::with_table(table.clone()),
        None => Resolver::new(),
    };

    let mut bundle = ResearchBundle::new(config.request.clone());
    info!(run_id = %bundle.run_id, "starting research run");

    progress.phase("Resolving targets");
    let mut pending = resolver.resolve(&config.request)?;

    let cache = open_cache(config).await;
    let fetcher = Fetcher::new(config.fetch.clone(), cache)?;

    let mut pass: u32 = 0;
    loop {
        bundle.targets.extend(pending.iter().cloned());

        progress.phase(if pass == 0 {
            "Fetching documentation"
        } else {
            "Fetching supplemental targets"
        });
        let (summary, results) = fetcher.fetch_all(&pending, Some(deadline)).await;
        progress.fetched(&summary);

        // Fan-in: results are unordered; fix extraction order to the
        // resolution order so bundle content is deterministic.
        let ordered = order_results(&pending, results);
        bundle.fetch_results.extend(ordered.iter().cloned());

        progress.phase("Extracting patterns and gotchas");
        for result in &ordered {
            if result.is_ok() {
                let extraction = docscout_extractor::extract(result);
                aggregate::admit(&mut bundle, extraction);
            }
        }

        progress.phase("Validating coverage");
        let report = validate::validate(&bundle, &config.validation);
        let under = validate::under_covered(&report, &config.validation);
        debug!(
            overall = report.overall_score,
            status = %report.status,
            under_covered = under.len(),
            "coverage computed"
        );
        bundle.coverage = Some(report);

        if bundle.status() == BundleStatus::Complete || under.is_empty() {
            break;
        }
        if pass >= config.validation.max_supplemental_passes {
            info!(
                passes = pass,
                "supplemental pass bound reached with categories still under threshold"
            );
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("run deadline reached, finalizing with collected results");
            break;
        }

        let resolved: HashSet<String> =
            bundle.targets.iter().map(|t| t.url.to_string()).collect();
        pending = resolver.supplemental(&config.request, &under, &resolved);
        if pending.is_empty() {
            debug!("resolver has no further targets for the missing categories");
            break;
        }

        pass += 1;
        bundle.supplemental_passes = pass;
    }

    progress.phase("Writing bundle");
    let write_result = writer::write_bundle(&bundle, &config.output_dir)?;

    let outcome = ResearchOutcome {
        bundle,
        bundle_dir: write_result.bundle_dir,
        elapsed: start.elapsed(),
    };
    progress.done(&outcome);

    info!(
        run_id = %outcome.bundle.run_id,
        status = %outcome.status(),
        targets = outcome.bundle.targets.len(),
        patterns = outcome.bundle.patterns.len(),
        gotchas = outcome.bundle.gotchas.len(),
        supplemental_passes = outcome.bundle.supplemental_passes,
        elapsed_ms = outcome.elapsed.as_millis(),
        "research run complete"
    );

    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create the output directory and verify it is writable.
fn prepare_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        DocScoutError::config(format!(
            "output directory {} cannot be created: {e}",
            dir.display()
        ))
    })?;

    let probe = dir.join(".write-probe");
    std::fs::write(&probe, b"probe").map_err(|e| {
        DocScoutError::config(format!(
            "output directory {} is not writable: {e}",
            dir.display()
        ))
    })?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

/// Open the persistent cache, degrading to cacheless operation on failure.
async fn open_cache(config: &ResearchConfig) -> Option<Arc<FetchCache>> {
    let path = config.cache_path.as_ref()?;
    if !config.fetch.use_cache {
        return None;
    }
    match FetchCache::open(path).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cache unavailable, fetching without it");
            None
        }
    }
}

/// Sort fetch results into target-resolution order.
fn order_results(targets: &[FetchTarget], mut results: Vec<FetchResult>) -> Vec<FetchResult> {
    let index: std::collections::HashMap<String, usize> = targets
        .iter()
        .enumerate()
        .map(|(i, t)| (t.url.to_string(), i))
        .collect();
    results.sort_by_key(|r| {
        index
            .get(&r.target.url.to_string())
            .copied()
            .unwrap_or(usize::MAX)
    });
    results
}
