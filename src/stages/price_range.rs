//! Price tier generation.

use serde::Deserialize;

use super::lenient::f64_or_text;
use super::prompts::{PRICE_RANGE_SYSTEM_PROMPT, PRICE_RANGE_USER_PROMPT};
use super::{Generated, Stage};
use crate::catalog::Category;
use crate::error::StageError;
use crate::llm::{CompletionClient, PromptSpec};
use crate::model::PriceRange;

/// Number of tiers every category gets (entry, mainstream, premium).
pub const PRICE_TIERS: usize = 3;

#[derive(Debug, Deserialize)]
struct PriceRangeReply {
    price_ranges: Vec<RawPriceRange>,
}

#[derive(Debug, Deserialize)]
struct RawPriceRange {
    #[serde(alias = "level", alias = "name")]
    label: String,
    #[serde(alias = "min", deserialize_with = "f64_or_text")]
    min_price: f64,
    #[serde(alias = "max", deserialize_with = "f64_or_text")]
    max_price: f64,
    #[serde(default)]
    description: String,
}

/// Generates the price tiers for a category.
pub struct PriceRangeGenerator {
    client: CompletionClient,
}

impl PriceRangeGenerator {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    pub fn build_prompt(category: &Category) -> PromptSpec {
        let fill = |template: &str| {
            template
                .replace("{level1}", &category.level1)
                .replace("{level2}", &category.level2)
                .replace("{level3}", &category.level3)
        };
        PromptSpec::new(
            Stage::PriceRanges,
            fill(PRICE_RANGE_SYSTEM_PROMPT),
            fill(PRICE_RANGE_USER_PROMPT),
        )
    }

    /// Request tiers for `category`, sorted by `min` and checked for shape.
    pub async fn generate(
        &self,
        category: &Category,
    ) -> Result<Generated<Vec<PriceRange>>, StageError> {
        let spec = Self::build_prompt(category);
        let completion = self
            .client
            .complete_as::<PriceRangeReply>(&spec, &category.path())
            .await
            .map_err(|source| StageError::Completion {
                stage: Stage::PriceRanges,
                source,
            })?;

        let ranges = completion
            .payload
            .price_ranges
            .into_iter()
            .map(|raw| PriceRange {
                label: raw.label.trim().to_string(),
                min: raw.min_price,
                max: raw.max_price,
                description: raw.description.trim().to_string(),
            })
            .collect();

        let ranges = check_tiers(ranges)?;

        tracing::debug!(
            category = %category,
            tiers = ranges.len(),
            attempts = completion.attempts,
            "Price ranges generated"
        );

        Ok(Generated {
            value: ranges,
            cost: completion.cost,
        })
    }
}

/// Sort tiers by `min` and reject anything that is not exactly
/// [`PRICE_TIERS`] strictly increasing, non-overlapping ranges.
pub fn check_tiers(mut ranges: Vec<PriceRange>) -> Result<Vec<PriceRange>, StageError> {
    let invalid = |reason: String| StageError::invalid(Stage::PriceRanges, reason);

    if ranges.len() != PRICE_TIERS {
        return Err(invalid(format!(
            "expected {} price tiers, got {}",
            PRICE_TIERS,
            ranges.len()
        )));
    }

    ranges.sort_by(|a, b| a.min.total_cmp(&b.min));

    for range in &ranges {
        if range.label.is_empty() {
            return Err(invalid("price tier without a label".to_string()));
        }
        if !range.min.is_finite() || !range.max.is_finite() || range.min < 0.0 {
            return Err(invalid(format!("tier '{}' has an invalid bound", range.label)));
        }
        if range.min >= range.max {
            return Err(invalid(format!(
                "tier '{}' is inverted: min {} >= max {}",
                range.label, range.min, range.max
            )));
        }
    }

    for pair in ranges.windows(2) {
        if pair[0].max >= pair[1].min {
            return Err(invalid(format!(
                "tiers '{}' and '{}' overlap",
                pair[0].label, pair[1].label
            )));
        }
        if pair[0].label == pair[1].label {
            return Err(invalid(format!("duplicate tier label '{}'", pair[0].label)));
        }
    }
    if ranges[0].label == ranges[PRICE_TIERS - 1].label {
        return Err(invalid(format!("duplicate tier label '{}'", ranges[0].label)));
    }

    Ok(ranges)
}
