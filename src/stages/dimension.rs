//! Comparison dimension generation.

use serde::Deserialize;
use std::collections::HashSet;

use super::lenient::optional_f64_or_text;
use super::prompts::{DIMENSION_SYSTEM_PROMPT, DIMENSION_USER_PROMPT};
use super::{Generated, Stage};
use crate::catalog::Category;
use crate::error::StageError;
use crate::llm::{CompletionClient, PromptSpec};
use crate::model::Dimension;

pub const MIN_DIMENSIONS: usize = 3;
pub const MAX_DIMENSIONS: usize = 8;

const MIN_WEIGHT: f64 = 1.0;
const MAX_WEIGHT: f64 = 2.0;

#[derive(Debug, Deserialize)]
struct DimensionReply {
    dimensions: Vec<RawDimension>,
}

#[derive(Debug, Deserialize)]
struct RawDimension {
    #[serde(default, alias = "dimension", alias = "title")]
    name: String,
    #[serde(default, alias = "id", alias = "key")]
    code: String,
    #[serde(default, deserialize_with = "optional_f64_or_text")]
    weight: Option<f64>,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "criteria", alias = "evaluationCriteria")]
    evaluation_criteria: String,
}

/// Generates the comparison dimensions for a category.
pub struct DimensionGenerator {
    client: CompletionClient,
    min_dimensions: usize,
    max_dimensions: usize,
}

impl DimensionGenerator {
    pub fn new(client: CompletionClient) -> Self {
        Self {
            client,
            min_dimensions: MIN_DIMENSIONS,
            max_dimensions: MAX_DIMENSIONS,
        }
    }

    /// Narrow the accepted dimension count. Bounds outside 3..=8 are clamped.
    pub fn with_bounds(mut self, min: usize, max: usize) -> Self {
        let min = min.clamp(MIN_DIMENSIONS, MAX_DIMENSIONS);
        self.min_dimensions = min;
        self.max_dimensions = max.clamp(min, MAX_DIMENSIONS);
        self
    }

    pub fn build_prompt(&self, category: &Category) -> PromptSpec {
        let fill = |template: &str| {
            template
                .replace("{level1}", &category.level1)
                .replace("{level2}", &category.level2)
                .replace("{level3}", &category.level3)
                .replace("{min_dimensions}", &self.min_dimensions.to_string())
                .replace("{max_dimensions}", &self.max_dimensions.to_string())
        };
        PromptSpec::new(
            Stage::Dimensions,
            fill(DIMENSION_SYSTEM_PROMPT),
            fill(DIMENSION_USER_PROMPT),
        )
    }

    pub async fn generate(
        &self,
        category: &Category,
    ) -> Result<Generated<Vec<Dimension>>, StageError> {
        let spec = self.build_prompt(category);
        let completion = self
            .client
            .complete_as::<DimensionReply>(&spec, &category.path())
            .await
            .map_err(|source| StageError::Completion {
                stage: Stage::Dimensions,
                source,
            })?;

        let dimensions = self.normalize(category, completion.payload.dimensions)?;

        tracing::debug!(
            category = %category,
            dimensions = dimensions.len(),
            attempts = completion.attempts,
            "Dimensions generated"
        );

        Ok(Generated {
            value: dimensions,
            cost: completion.cost,
        })
    }

    fn normalize(
        &self,
        category: &Category,
        raw: Vec<RawDimension>,
    ) -> Result<Vec<Dimension>, StageError> {
        let mut seen_codes = HashSet::new();
        let mut dimensions = Vec::new();

        for (index, item) in raw.into_iter().enumerate() {
            let name = item.name.trim().to_string();
            if name.is_empty() {
                continue;
            }

            let mut code = slugify(&item.code);
            if code.is_empty() {
                code = slugify(&name);
            }
            if code.is_empty() {
                code = format!("dim_{}", index + 1);
            }
            let base = code.clone();
            let mut suffix = 2;
            while !seen_codes.insert(code.clone()) {
                code = format!("{}_{}", base, suffix);
                suffix += 1;
            }

            let weight = item
                .weight
                .filter(|w| w.is_finite())
                .unwrap_or(MIN_WEIGHT)
                .clamp(MIN_WEIGHT, MAX_WEIGHT);

            dimensions.push(Dimension {
                name,
                code,
                weight,
                description: item.description.trim().to_string(),
                evaluation_criteria: item.evaluation_criteria.trim().to_string(),
            });
        }

        if dimensions.len() < self.min_dimensions {
            return Err(StageError::invalid(
                Stage::Dimensions,
                format!(
                    "expected at least {} dimensions, got {}",
                    self.min_dimensions,
                    dimensions.len()
                ),
            ));
        }

        if dimensions.len() > self.max_dimensions {
            tracing::warn!(
                category = %category,
                returned = dimensions.len(),
                kept = self.max_dimensions,
                "Too many dimensions returned, truncating"
            );
            dimensions.truncate(self.max_dimensions);
        }

        Ok(dimensions)
    }
}

/// Lowercase ASCII slug with underscores; non-ASCII characters are dropped.
pub(crate) fn slugify(raw: &str) -> String {
    let mut out = String::new();
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') && (c == '_' || c == '-' || c == ' ') {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{client_for, FixedReply};

    fn raw(name: &str, code: &str, weight: Option<f64>) -> RawDimension {
        RawDimension {
            name: name.to_string(),
            code: code.to_string(),
            weight,
            description: String::new(),
            evaluation_criteria: String::new(),
        }
    }

    fn generator() -> DimensionGenerator {
        DimensionGenerator::new(client_for(FixedReply::new("{}")))
    }

    fn category() -> Category {
        Category::new("个护健康", "剃须用品", "手动剃须刀")
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Blade Sharpness"), "blade_sharpness");
        assert_eq!(slugify("value-for-money"), "value_for_money");
        assert_eq!(slugify("刀片锋利度"), "");
        assert_eq!(slugify("  grip__ "), "grip");
    }

    #[test]
    fn test_normalize_fills_codes_and_clamps_weights() {
        let dims = generator()
            .normalize(
                &category(),
                vec![
                    raw("刀片锋利度", "", Some(5.0)),
                    raw("握持手感", "grip", None),
                    raw("性价比", "grip", Some(0.2)),
                ],
            )
            .unwrap();

        assert_eq!(dims[0].code, "dim_1");
        assert_eq!(dims[0].weight, 2.0);
        assert_eq!(dims[1].weight, 1.0);
        assert_eq!(dims[2].code, "grip_2");
        assert_eq!(dims[2].weight, 1.0);
    }

    #[test]
    fn test_normalize_drops_unnamed_and_enforces_minimum() {
        let err = generator()
            .normalize(
                &category(),
                vec![raw("刀片", "blade", None), raw("  ", "x", None), raw("手感", "grip", None)],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::InvalidOutput {
                stage: Stage::Dimensions,
                ..
            }
        ));
    }

    #[test]
    fn test_normalize_truncates_to_maximum() {
        let items = (0..10)
            .map(|i| raw(&format!("维度{}", i), &format!("d{}", i), Some(1.5)))
            .collect();
        let dims = generator().normalize(&category(), items).unwrap();
        assert_eq!(dims.len(), MAX_DIMENSIONS);
        assert_eq!(dims[7].code, "d7");
    }

    #[test]
    fn test_bounds_are_clamped() {
        let g = generator().with_bounds(1, 20);
        assert_eq!(g.min_dimensions, MIN_DIMENSIONS);
        assert_eq!(g.max_dimensions, MAX_DIMENSIONS);

        let spec = generator().with_bounds(4, 5).build_prompt(&category());
        assert!(spec.user.contains("4-5"));
    }

    #[tokio::test]
    async fn test_generate_from_reply() {
        let provider = FixedReply::new(
            r#"{"dimensions": [
                {"name": "刀片锋利度", "code": "blade_sharpness", "weight": 1.8},
                {"name": "握持手感", "code": "grip", "weight": "1.2"},
                {"name": "性价比", "code": "value", "description": "单位价格的使用体验"}
            ]}"#,
        );
        let generator = DimensionGenerator::new(client_for(provider.clone()));
        let out = generator.generate(&category()).await.unwrap();

        assert_eq!(out.value.len(), 3);
        assert_eq!(out.value[1].weight, 1.2);
        assert_eq!(out.value[2].description, "单位价格的使用体验");
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("【手动剃须刀】"));
    }
}
