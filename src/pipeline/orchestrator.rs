//! Pipeline orchestrator.
//!
//! Drives categories strictly one after another. For each category:
//! - price tiers, then dimensions (either failing aborts the category)
//! - product selection for every (tier, dimension) pair, fanned out in waves
//! - the quality gate over the assembled result
//! - the outcome handed to the [`ProgressTracker`]
//!
//! A run stops starting new categories on Ctrl-C, on reaching the category
//! limit, or once the cost budget is spent. In-flight calls are never aborted.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use super::config::{ConfigError, PipelineConfig};
use super::progress::{ProgressTracker, RunStatistics};
use crate::brands::BrandAuthority;
use crate::catalog::Category;
use crate::error::StageError;
use crate::llm::{
    CompletionClient, CompletionSettings, CostAccumulator, CostReport, LlmProvider,
};
use crate::model::CategoryResult;
use crate::quality::{QualityFamily, QualityIssue, QualityValidator};
use crate::scheduler::WaveScheduler;
use crate::stages::dimension::DimensionGenerator;
use crate::stages::price_range::PriceRangeGenerator;
use crate::stages::product_selector::ProductSelector;

/// Errors that prevent an orchestrator from being built.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Initialization failed.
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

/// How one category ended.
#[derive(Debug, Clone)]
pub enum CategoryOutcome {
    Accepted(CategoryResult),
    Rejected {
        result: CategoryResult,
        issues: Vec<QualityIssue>,
    },
    /// Price-range or dimension generation failed; `partial` holds what was
    /// generated before.
    StageFailed {
        partial: CategoryResult,
        error: StageError,
    },
}

impl CategoryOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CategoryOutcome::Accepted(_))
    }

    pub fn result(&self) -> &CategoryResult {
        match self {
            CategoryOutcome::Accepted(result) => result,
            CategoryOutcome::Rejected { result, .. } => result,
            CategoryOutcome::StageFailed { partial, .. } => partial,
        }
    }
}

/// Why the category loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    LimitReached,
    BudgetExhausted,
    Interrupted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Completed => "completed",
            StopReason::LimitReached => "limit reached",
            StopReason::BudgetExhausted => "budget exhausted",
            StopReason::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// Final report of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub statistics: RunStatistics,
    pub costs: CostReport,
    pub duration_secs: f64,
    /// Accepted categories per hour.
    pub throughput: f64,
    pub stop_reason: StopReason,
}

/// Drives the staged generation over a catalog.
pub struct Orchestrator {
    price_ranges: PriceRangeGenerator,
    dimensions: DimensionGenerator,
    selector: ProductSelector,
    validator: QualityValidator,
    scheduler: WaveScheduler,
    costs: Arc<CostAccumulator>,
    model: String,
    inter_category_delay: Duration,
    limit: Option<usize>,
    stop: Arc<AtomicBool>,
}

impl Orchestrator {
    /// All stages share `client` and therefore its cost accumulator.
    pub fn new(
        client: CompletionClient,
        validator: QualityValidator,
        scheduler: WaveScheduler,
    ) -> Self {
        let selector = ProductSelector::new(client.clone())
            .with_min_reason_chars(validator.thresholds().min_reason_chars);
        Self {
            price_ranges: PriceRangeGenerator::new(client.clone()),
            dimensions: DimensionGenerator::new(client.clone()),
            selector,
            validator,
            scheduler,
            costs: client.costs().clone(),
            model: client.model().to_string(),
            inter_category_delay: Duration::ZERO,
            limit: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build every component from a validated configuration.
    pub fn from_config(
        config: &PipelineConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let costs = Arc::new(
            CostAccumulator::new(config.llm.pricing).with_budget(config.budget_limit),
        );
        let settings = CompletionSettings {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        };
        let client = CompletionClient::new(provider, settings, config.retry, costs);

        let authority: Arc<dyn BrandAuthority> =
            Arc::new(config.brands.clone().unwrap_or_default());
        let validator = QualityValidator::new(config.quality.clone(), authority)
            .map_err(|e| PipelineError::InitializationFailed(e.to_string()))?;
        let scheduler = WaveScheduler::from_config(&config.scheduling.wave_config());

        Ok(Self::new(client, validator, scheduler)
            .with_inter_category_delay(config.scheduling.inter_category_delay()))
    }

    /// Pause between two processed categories. Never applied after the last.
    pub fn with_inter_category_delay(mut self, delay: Duration) -> Self {
        self.inter_category_delay = delay;
        self
    }

    /// Stop after this many categories went through generation.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Share an externally owned stop flag, e.g. one set by a signal handler.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn costs(&self) -> &Arc<CostAccumulator> {
        &self.costs
    }

    pub fn validator(&self) -> &QualityValidator {
        &self.validator
    }

    /// Generate and judge one category. Persists nothing.
    pub async fn process_category(&self, category: &Category) -> CategoryOutcome {
        let cost_before = self.costs.total();
        let mut result = CategoryResult::new(category.clone(), self.model.clone());

        let price_ranges = match self.price_ranges.generate(category).await {
            Ok(generated) => generated.value,
            Err(error) => {
                result.cost = self.costs.total() - cost_before;
                return CategoryOutcome::StageFailed {
                    partial: result,
                    error,
                };
            }
        };
        result.price_ranges = price_ranges;

        let dimensions = match self.dimensions.generate(category).await {
            Ok(generated) => generated.value,
            Err(error) => {
                result.cost = self.costs.total() - cost_before;
                return CategoryOutcome::StageFailed {
                    partial: result,
                    error,
                };
            }
        };
        result.dimensions = dimensions;

        let brands = self.validator.authority().suggested_brands(category);
        let mut pairs = Vec::with_capacity(result.expected_pairs());
        for r in 0..result.price_ranges.len() {
            pairs.extend((0..result.dimensions.len()).map(|d| (r, d)));
        }

        let report = {
            let ranges = &result.price_ranges;
            let dims = &result.dimensions;
            let brands = &brands;
            self.scheduler
                .run(&pairs, |_, &(r, d)| {
                    self.selector.select(category, &ranges[r], &dims[d], brands)
                })
                .await
        };

        if !report.failed.is_empty() {
            tracing::warn!(
                category = %category,
                dropped = report.failed.len(),
                pairs = result.expected_pairs(),
                "Dropped product selection pairs"
            );
        }
        result.selections = report
            .succeeded
            .into_iter()
            .map(|(_, generated)| generated.value)
            .collect();
        result.cost = self.costs.total() - cost_before;

        if result.selections.is_empty() {
            let issue = QualityIssue::new(
                QualityFamily::Structural,
                "no product selection survived generation",
            );
            return CategoryOutcome::Rejected {
                result,
                issues: vec![issue],
            };
        }

        let verdict = self.validator.validate(&result);
        if verdict.is_valid {
            CategoryOutcome::Accepted(result)
        } else {
            CategoryOutcome::Rejected {
                result,
                issues: verdict.issues,
            }
        }
    }

    /// Process `categories` in order and return the run summary.
    pub async fn run(&self, categories: &[Category], mut tracker: ProgressTracker) -> RunSummary {
        let started = Instant::now();
        let mut processed = 0usize;
        let mut stop_reason = StopReason::Completed;

        tracing::info!(
            run_id = %tracker.run_id(),
            categories = categories.len(),
            model = %self.model,
            concurrency = self.scheduler.concurrency(),
            "Starting run"
        );

        for category in categories {
            if self.stop.load(Ordering::SeqCst) {
                stop_reason = StopReason::Interrupted;
                break;
            }
            if tracker.is_already_processed(category) {
                tracker.record_skipped(category);
                continue;
            }
            if self.limit.is_some_and(|limit| processed >= limit) {
                stop_reason = StopReason::LimitReached;
                break;
            }
            if self.costs.is_over_budget() {
                tracing::warn!(cost = format!("{:.4}", self.costs.total()), "Budget exhausted");
                stop_reason = StopReason::BudgetExhausted;
                break;
            }

            if processed > 0 && !self.inter_category_delay.is_zero() {
                tokio::time::sleep(self.inter_category_delay).await;
            }
            processed += 1;

            match self.process_category(category).await {
                CategoryOutcome::Accepted(result) => {
                    tracing::info!(
                        category = %category,
                        selections = result.selections.len(),
                        cost = format!("{:.4}", result.cost),
                        "Category accepted"
                    );
                    tracker.record_accepted(&result).await;
                }
                CategoryOutcome::Rejected { result, issues } => {
                    tracing::warn!(
                        category = %category,
                        issues = issues.len(),
                        first_issue = %issues.first().map(ToString::to_string).unwrap_or_default(),
                        "Category rejected"
                    );
                    tracker.record_rejected(&result, &issues).await;
                }
                CategoryOutcome::StageFailed { partial, error } => {
                    tracing::warn!(
                        category = %category,
                        stage = %error.stage(),
                        error = %error,
                        "Category aborted"
                    );
                    tracker.record_stage_failure(&partial, &error).await;
                }
            }

            let stats = tracker.snapshot();
            tracing::info!(
                processed = stats.processed,
                succeeded = stats.succeeded,
                failed = stats.failed,
                skipped = stats.skipped,
                pass_rate = format!("{:.1}", stats.pass_rate),
                cost = format!("{:.4}", self.costs.total()),
                "Progress"
            );
        }

        let run_id = tracker.run_id().to_string();
        let statistics = tracker.finish();
        let elapsed = started.elapsed().as_secs_f64();
        let throughput = if elapsed > 0.0 {
            statistics.succeeded as f64 / elapsed * 3600.0
        } else {
            0.0
        };

        let summary = RunSummary {
            run_id,
            statistics,
            costs: self.costs.report(),
            duration_secs: elapsed,
            throughput,
            stop_reason,
        };

        tracing::info!(
            run_id = %summary.run_id,
            succeeded = summary.statistics.succeeded,
            failed = summary.statistics.failed,
            skipped = summary.statistics.skipped,
            cost = format!("{:.4}", summary.costs.total),
            duration_secs = format!("{:.1}", summary.duration_secs),
            stop_reason = %summary.stop_reason,
            "Run finished"
        );

        summary
    }
}
