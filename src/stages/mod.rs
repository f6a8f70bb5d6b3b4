//! Stage generators.
//!
//! A category passes through three generation stages:
//! 1. [`PriceRangeGenerator`]: three price tiers
//! 2. [`DimensionGenerator`]: 3 to 8 comparison axes
//! 3. [`ProductSelector`]: one product per (tier, axis) pair
//!
//! Each stage issues its calls through the shared
//! [`CompletionClient`](crate::llm::CompletionClient) and returns a typed
//! value or a [`StageError`](crate::error::StageError). Nothing a stage
//! returns is trusted until the quality gate has judged the whole category.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod dimension;
pub mod lenient;
pub mod price_range;
pub mod product_selector;
pub mod prompts;

pub use dimension::DimensionGenerator;
pub use price_range::PriceRangeGenerator;
pub use product_selector::ProductSelector;

/// The three generation phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PriceRanges,
    Dimensions,
    ProductSelection,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PriceRanges => "price_ranges",
            Stage::Dimensions => "dimensions",
            Stage::ProductSelection => "product_selection",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Stage::PriceRanges => 0,
            Stage::Dimensions => 1,
            Stage::ProductSelection => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage output together with what it cost to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub value: T,
    pub cost: f64,
}
