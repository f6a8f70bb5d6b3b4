//! Running cost accounting for completion calls.
//!
//! Costs are derived from token usage and tracked internally in
//! micro-units (millionths of the pricing currency) so that concurrent
//! pair calls can add to the same counters atomically.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::client::Usage;
use crate::stages::Stage;

/// Micro-units per currency unit.
const MICROS_PER_UNIT: f64 = 1_000_000.0;

/// Token prices, per one million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for TokenPricing {
    fn default() -> Self {
        Self {
            input_per_million: 2.0,
            output_per_million: 2.0,
        }
    }
}

impl TokenPricing {
    /// Estimated cost of one call with the given usage.
    pub fn cost_of(&self, usage: &Usage) -> f64 {
        (usage.prompt_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (usage.completion_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

/// Point-in-time view of the accumulator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub total: f64,
    pub price_ranges: f64,
    pub dimensions: f64,
    pub product_selection: f64,
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Run-wide cost accumulator shared by every completion call.
#[derive(Debug)]
pub struct CostAccumulator {
    pricing: TokenPricing,
    budget_micros: Option<u64>,
    total_micros: AtomicU64,
    stage_micros: [AtomicU64; 3],
    calls: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl CostAccumulator {
    pub fn new(pricing: TokenPricing) -> Self {
        Self {
            pricing,
            budget_micros: None,
            total_micros: AtomicU64::new(0),
            stage_micros: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
            calls: AtomicU64::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
        }
    }

    /// Set a spending ceiling, in currency units.
    pub fn with_budget(mut self, budget: Option<f64>) -> Self {
        self.budget_micros = budget.map(to_micros);
        self
    }

    /// Record one call's usage and return its cost.
    pub fn record(&self, stage: Stage, model: &str, usage: &Usage) -> f64 {
        let cost = self.pricing.cost_of(usage);
        let micros = to_micros(cost);

        self.total_micros.fetch_add(micros, Ordering::SeqCst);
        self.stage_micros[stage.index()].fetch_add(micros, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompt_tokens
            .fetch_add(usage.prompt_tokens as u64, Ordering::SeqCst);
        self.completion_tokens
            .fetch_add(usage.completion_tokens as u64, Ordering::SeqCst);

        tracing::debug!(
            stage = %stage,
            model = model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost = format!("{:.6}", cost),
            "Recorded completion usage"
        );

        cost
    }

    /// Total cost so far, in currency units.
    pub fn total(&self) -> f64 {
        from_micros(self.total_micros.load(Ordering::SeqCst))
    }

    /// Number of calls recorded so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether the configured budget has been reached.
    pub fn is_over_budget(&self) -> bool {
        match self.budget_micros {
            Some(budget) => self.total_micros.load(Ordering::SeqCst) >= budget,
            None => false,
        }
    }

    pub fn report(&self) -> CostReport {
        CostReport {
            total: self.total(),
            price_ranges: self.stage_total(Stage::PriceRanges),
            dimensions: self.stage_total(Stage::Dimensions),
            product_selection: self.stage_total(Stage::ProductSelection),
            calls: self.calls(),
            prompt_tokens: self.prompt_tokens.load(Ordering::SeqCst),
            completion_tokens: self.completion_tokens.load(Ordering::SeqCst),
        }
    }

    fn stage_total(&self, stage: Stage) -> f64 {
        from_micros(self.stage_micros[stage.index()].load(Ordering::SeqCst))
    }
}

impl Default for CostAccumulator {
    fn default() -> Self {
        Self::new(TokenPricing::default())
    }
}

fn to_micros(amount: f64) -> u64 {
    (amount.max(0.0) * MICROS_PER_UNIT).round() as u64
}

fn from_micros(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_UNIT
}
