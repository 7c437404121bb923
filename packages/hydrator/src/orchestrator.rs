//! Hydration orchestrator: a single sequential pass over the remaining ids.
//!
//! ```text
//! Idle -> Loading -> BatchLoop -> Finalizing -> Done
//!            \__________ nothing to do __________/
//! ```

use indicatif::ProgressBar;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::HydrateConfig;
use crate::error::{HydrateError, Result};
use crate::fetcher::{BatchFetcher, TweetLookup};
use crate::ledger::PersistenceLedger;
use crate::source::{read_result_store, IdentifierSource};
use crate::types::TweetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Loading,
    BatchLoop,
    Finalizing,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Loading => "loading",
            RunPhase::BatchLoop => "batch-loop",
            RunPhase::Finalizing => "finalizing",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why a run stopped before covering all remaining ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// Batch `batch` (0-based) stayed rate limited for `attempts` requests.
    RateLimited { batch: usize, attempts: u32 },
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_unique: usize,
    pub already_hydrated: usize,
    /// Ids whose fetch attempt concluded this run.
    pub attempted: usize,
    pub hydrated: usize,
    pub missing: usize,
    /// Ids left for a later run because the loop halted.
    pub pending: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub rate_limit_waits: u32,
    pub halted: Option<HaltReason>,
}

/// Split `ids` into consecutive batches of at most `size`.
pub fn partition_batches(ids: &[TweetId], size: usize) -> impl Iterator<Item = &[TweetId]> {
    ids.chunks(size.max(1))
}

pub struct HydrationOrchestrator<L: TweetLookup> {
    config: HydrateConfig,
    fetcher: BatchFetcher<L>,
    progress: ProgressBar,
}

impl<L: TweetLookup> HydrationOrchestrator<L> {
    pub fn new(config: HydrateConfig, lookup: L) -> Self {
        let fetcher = BatchFetcher::from_config(lookup, &config);
        Self {
            config,
            fetcher,
            progress: ProgressBar::hidden(),
        }
    }

    /// Drive `progress` one tick per batch.
    pub fn with_progress_bar(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &HydrateConfig {
        &self.config
    }

    fn enter(&self, phase: RunPhase) {
        debug!(phase = %phase, "Hydration phase");
    }

    /// Run one pass over the remaining work.
    ///
    /// Partially resolved and fully resolved runs both return `Ok`; check
    /// [`RunSummary::halted`] for a rate-limit halt.
    ///
    /// The missing list is only rewritten when this run leaves something
    /// unresolved. A run that resolves everything (or has nothing to do)
    /// keeps the previous list, which may then name ids that are now in
    /// the result store.
    pub async fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;
        self.enter(RunPhase::Idle);

        self.enter(RunPhase::Loading);
        let workload = IdentifierSource::from_config(&self.config).load()?;
        let mut summary = RunSummary {
            total_unique: workload.total_unique,
            already_hydrated: workload.already_hydrated.len(),
            ..Default::default()
        };

        if workload.remaining.is_empty() {
            info!("No tweets left to hydrate. Exiting.");
            self.enter(RunPhase::Done);
            return Ok(summary);
        }

        let mut ledger = PersistenceLedger::open(&self.config, workload.existing);
        let remaining = workload.remaining;
        let batch_count = remaining.len().div_ceil(self.config.batch_size);

        info!("Starting hydration process...");
        self.enter(RunPhase::BatchLoop);
        self.progress.set_length(batch_count as u64);
        self.progress.set_message("Hydrating tweets");

        let mut missing: Vec<TweetId> = Vec::new();
        for (index, batch) in partition_batches(&remaining, self.config.batch_size).enumerate() {
            let outcome = match self.fetcher.fetch(batch).await {
                Ok(outcome) => outcome,
                Err(HydrateError::RateLimitExhausted { attempts }) => {
                    warn!(
                        batch = index + 1,
                        attempts,
                        "Stopping: still rate limited. Remaining tweets stay pending for the next run."
                    );
                    summary.halted = Some(HaltReason::RateLimited {
                        batch: index,
                        attempts,
                    });
                    break;
                }
                Err(e) => return Err(e),
            };

            if !outcome.resolved.is_empty() {
                ledger.append_records(&outcome.resolved)?;
            }
            ledger.append_progress(batch)?;

            summary.batches += 1;
            summary.attempted += batch.len();
            summary.hydrated += outcome.resolved.len();
            summary.rate_limit_waits += outcome.rate_limit_waits;
            if outcome.failure.is_some() {
                summary.failed_batches += 1;
            }
            missing.extend(outcome.unresolved);
            self.progress.inc(1);

            if index + 1 < batch_count && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }
        self.progress.finish_and_clear();

        self.enter(RunPhase::Finalizing);
        summary.missing = missing.len();
        summary.pending = remaining.len() - summary.attempted;
        if !missing.is_empty() {
            info!("Saving {} missing tweet IDs...", missing.len());
            ledger.write_missing(&missing)?;
        }

        info!(
            hydrated = summary.hydrated,
            missing = summary.missing,
            pending = summary.pending,
            failed_batches = summary.failed_batches,
            rate_limit_waits = summary.rate_limit_waits,
            "Process completed. Results saved to {}",
            ledger.result_path().display()
        );
        if !missing.is_empty() {
            info!("Missing tweets saved to {}", ledger.missing_path().display());
        }

        self.enter(RunPhase::Done);
        Ok(summary)
    }
}

/// Snapshot of on-disk progress, computed without any API call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub total_unique: usize,
    /// Input ids present in the result store.
    pub hydrated: usize,
    /// Rows in the result store, including ids not in the input.
    pub result_rows: usize,
    pub remaining: usize,
    pub progress_entries: usize,
    pub missing_entries: usize,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "unique tweet ids:  {}", self.total_unique)?;
        writeln!(f, "hydrated:          {}", self.hydrated)?;
        writeln!(f, "result rows:       {}", self.result_rows)?;
        writeln!(f, "remaining:         {}", self.remaining)?;
        writeln!(f, "progress entries:  {}", self.progress_entries)?;
        write!(f, "missing (last run): {}", self.missing_entries)
    }
}

/// Report progress from the files named in `config`.
pub fn status(config: &HydrateConfig) -> Result<StatusReport> {
    let source = IdentifierSource::from_config(config);
    let input = source.read_identifiers()?;
    let rows = read_result_store(&config.output_path)?;

    let hydrated_ids: HashSet<&TweetId> = rows.iter().map(|r| &r.tweet_id).collect();
    let hydrated = input.iter().filter(|id| hydrated_ids.contains(id)).count();

    Ok(StatusReport {
        total_unique: input.len(),
        hydrated,
        result_rows: rows.len(),
        remaining: input.len() - hydrated,
        progress_entries: count_lines(&config.progress_path)?,
        missing_entries: count_lines(&config.missing_path)?,
    })
}

fn count_lines(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let contents = fs::read_to_string(path).map_err(|source| HydrateError::RunFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(contents.lines().filter(|l| !l.trim().is_empty()).count())
}
