//! Run progress: statistics, resume bookkeeping and checkpoints.
//!
//! The orchestrator is the only writer. Every category outcome goes through
//! one `record_*` call, which persists it and updates [`RunStatistics`].
//! Persistence failures are logged and the run goes on with in-memory state.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::time::Instant;

use crate::catalog::Category;
use crate::error::{PersistenceError, StageError};
use crate::model::CategoryResult;
use crate::pipeline::config::CheckpointConfig;
use crate::quality::QualityIssue;
use crate::storage::{write_snapshot, CheckpointStore, StatusSnapshot};

/// Counters for the current run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStatistics {
    /// Categories that went through generation (accepted or not).
    pub processed: usize,
    pub succeeded: usize,
    /// Rejected by the quality gate or aborted by a stage failure.
    pub failed: usize,
    /// Already accepted by an earlier run.
    pub skipped: usize,
    /// Selections in categories accepted by this run.
    pub selections: usize,
    pub total_cost: f64,
    /// Share of processed categories that were accepted, in percent.
    pub pass_rate: f64,
}

impl RunStatistics {
    fn record(&mut self, accepted: bool, cost: f64) {
        self.processed += 1;
        if accepted {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.total_cost += cost;
        self.pass_rate = self.succeeded as f64 / self.processed as f64 * 100.0;
    }
}

/// Tracks one run against a checkpoint store.
pub struct ProgressTracker {
    store: CheckpointStore,
    status_path: PathBuf,
    checkpoint_every: usize,
    force: bool,
    completed: HashSet<String>,
    stats: RunStatistics,
    run_id: String,
    total_categories: usize,
    accepted_since_checkpoint: usize,
    started: Instant,
}

impl ProgressTracker {
    /// Load the already-accepted paths from `store`.
    ///
    /// With `force` set, prior results are still loaded but never cause a skip.
    pub async fn open(
        store: CheckpointStore,
        config: &CheckpointConfig,
        total_categories: usize,
        force: bool,
    ) -> Result<Self, PersistenceError> {
        let completed = store.accepted_paths().await?;
        let run_id = uuid::Uuid::new_v4().to_string();

        tracing::info!(
            run_id = %run_id,
            total = total_categories,
            already_accepted = completed.len(),
            force = force,
            "Progress tracker ready"
        );

        Ok(Self {
            store,
            status_path: config.status_path.clone(),
            checkpoint_every: config.checkpoint_every.max(1),
            force,
            completed,
            stats: RunStatistics::default(),
            run_id,
            total_categories,
            accepted_since_checkpoint: 0,
            started: Instant::now(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Whether an earlier run already accepted `category`.
    pub fn is_already_processed(&self, category: &Category) -> bool {
        !self.force && self.completed.contains(&category.path())
    }

    pub async fn record_accepted(&mut self, result: &CategoryResult) {
        if let Err(e) = self.store.upsert_accepted(result).await {
            tracing::error!(
                category = %result.category,
                error = %e,
                "Failed to persist accepted result"
            );
        }

        self.completed.insert(result.category.path());
        self.stats.record(true, result.cost);
        self.stats.selections += result.selections.len();
        self.accepted_since_checkpoint += 1;

        if self.accepted_since_checkpoint >= self.checkpoint_every {
            self.write_checkpoint();
        }
    }

    pub async fn record_rejected(&mut self, result: &CategoryResult, issues: &[QualityIssue]) {
        self.log_failure(result, issues, "quality gate").await;
        self.stats.record(false, result.cost);
    }

    /// Record a category aborted by `error`. `partial` holds whatever was
    /// generated before the failure.
    pub async fn record_stage_failure(&mut self, partial: &CategoryResult, error: &StageError) {
        self.log_failure(partial, &[], &error.to_string()).await;
        self.stats.record(false, partial.cost);
    }

    pub fn record_skipped(&mut self, category: &Category) {
        tracing::debug!(category = %category, "Already accepted, skipping");
        self.stats.skipped += 1;
    }

    pub fn snapshot(&self) -> RunStatistics {
        self.stats.clone()
    }

    /// Status document for external monitors.
    pub fn status(&self) -> StatusSnapshot {
        let elapsed = self.started.elapsed().as_secs_f64();
        let throughput = if elapsed > 0.0 {
            self.stats.succeeded as f64 / elapsed * 3600.0
        } else {
            0.0
        };

        let remaining = self
            .total_categories
            .saturating_sub(self.stats.processed + self.stats.skipped);
        let eta_seconds = if self.stats.processed > 0 {
            let per_category = elapsed / self.stats.processed as f64;
            Some((per_category * remaining as f64).round() as u64)
        } else {
            None
        };

        StatusSnapshot {
            run_id: self.run_id.clone(),
            total_categories: self.total_categories,
            completed_categories: self.stats.succeeded + self.stats.skipped,
            failed_categories: self.stats.failed,
            skipped_categories: self.stats.skipped,
            best_products_count: self.stats.selections,
            total_cost: self.stats.total_cost,
            throughput,
            pass_rate: self.stats.pass_rate,
            eta_seconds,
            last_updated: Utc::now(),
        }
    }

    /// Overwrite the status snapshot file.
    pub fn write_checkpoint(&mut self) {
        self.accepted_since_checkpoint = 0;
        let status = self.status();
        match write_snapshot(&self.status_path, &status) {
            Ok(()) => tracing::info!(
                path = %self.status_path.display(),
                completed = status.completed_categories,
                total = status.total_categories,
                pass_rate = format!("{:.1}", status.pass_rate),
                cost = format!("{:.4}", status.total_cost),
                "Checkpoint written"
            ),
            Err(e) => tracing::error!(
                path = %self.status_path.display(),
                error = %e,
                "Failed to write status snapshot"
            ),
        }
    }

    /// Write the final snapshot and return the run's statistics.
    pub fn finish(mut self) -> RunStatistics {
        self.write_checkpoint();
        self.stats
    }

    async fn log_failure(&self, result: &CategoryResult, issues: &[QualityIssue], reason: &str) {
        if let Err(e) = self.store.append_failure(result, issues, reason).await {
            tracing::error!(
                category = %result.category,
                error = %e,
                "Failed to append to failure log"
            );
        }
    }
}
