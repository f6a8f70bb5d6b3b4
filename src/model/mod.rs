//! Records produced by one pass over a category.
//!
//! A [`CategoryResult`] is assembled stage by stage and then judged as a
//! whole. Stored records carry [`SCHEMA_VERSION`]; older layouts are
//! upgraded once at load time by [`crate::storage::migrations`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Category;

/// Current on-disk layout of [`CategoryResult`].
pub const SCHEMA_VERSION: u32 = 2;

/// One price tier for a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    /// Tier name, e.g. "入门级". Selections refer back to it by this label.
    pub label: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub description: String,
}

impl PriceRange {
    /// Whether `price` falls inside the tier, bounds inclusive.
    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

/// One comparison axis for a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    /// Stable identifier, lowercase with underscores.
    pub code: String,
    /// Relative importance, 1.0 to 2.0.
    pub weight: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub evaluation_criteria: String,
}

/// The best product for one (price range, dimension) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSelection {
    /// Label of the paired [`PriceRange`].
    pub price_range: String,
    /// Code of the paired [`Dimension`].
    pub dimension: String,
    pub product_name: String,
    pub brand: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub company_intro: String,
    #[serde(default)]
    pub model: String,
    pub price: f64,
    pub selection_reason: String,
    pub confidence_score: f64,
    #[serde(default)]
    pub data_sources: String,
}

/// Everything generated for one category in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub schema_version: u32,
    pub category: Category,
    pub price_ranges: Vec<PriceRange>,
    pub dimensions: Vec<Dimension>,
    pub selections: Vec<ProductSelection>,
    /// Completion cost spent on this category.
    pub cost: f64,
    /// Model that produced the content.
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

impl CategoryResult {
    /// Start an empty result for `category`.
    pub fn new(category: Category, model: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            category,
            price_ranges: Vec::new(),
            dimensions: Vec::new(),
            selections: Vec::new(),
            cost: 0.0,
            model: model.into(),
            generated_at: Utc::now(),
        }
    }

    /// The price range a selection is paired with.
    pub fn range_for(&self, selection: &ProductSelection) -> Option<&PriceRange> {
        self.price_ranges
            .iter()
            .find(|r| r.label == selection.price_range)
    }

    /// The dimension a selection is paired with.
    pub fn dimension_for(&self, selection: &ProductSelection) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.code == selection.dimension)
    }

    /// Number of (price range, dimension) pairs the result should cover.
    pub fn expected_pairs(&self) -> usize {
        self.price_ranges.len() * self.dimensions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_range_contains_is_inclusive() {
        let range = PriceRange {
            label: "主流级".to_string(),
            min: 100.0,
            max: 300.0,
            description: String::new(),
        };
        assert!(range.contains(100.0));
        assert!(range.contains(300.0));
        assert!(!range.contains(99.99));
        assert!(!range.contains(300.5));
    }

    #[test]
    fn test_pair_lookup() {
        let mut result = CategoryResult::new(Category::new("a", "b", "c"), "deepseek-chat");
        result.price_ranges.push(PriceRange {
            label: "入门级".to_string(),
            min: 10.0,
            max: 50.0,
            description: String::new(),
        });
        result.dimensions.push(Dimension {
            name: "性价比".to_string(),
            code: "value_for_money".to_string(),
            weight: 1.5,
            description: String::new(),
            evaluation_criteria: String::new(),
        });
        let selection = ProductSelection {
            price_range: "入门级".to_string(),
            dimension: "value_for_money".to_string(),
            product_name: "x".to_string(),
            brand: "y".to_string(),
            company: String::new(),
            company_intro: String::new(),
            model: String::new(),
            price: 20.0,
            selection_reason: String::new(),
            confidence_score: 80.0,
            data_sources: String::new(),
        };

        assert_eq!(result.expected_pairs(), 1);
        assert_eq!(result.schema_version, SCHEMA_VERSION);
        assert!(result.range_for(&selection).is_some());
        assert!(result.dimension_for(&selection).is_some());
    }
}
