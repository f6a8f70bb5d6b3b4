//! Record layout upgrades.
//!
//! Stored payloads are upgraded once, at load time. Version 1 is the layout
//! of the old JSON exports: `level1/level2/item` identity, camelCase keys,
//! `bestProducts` entries with text prices such as `"¥299"`, and price
//! ranges written as `min_price`/`max_price`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::catalog::Category;
use crate::error::PersistenceError;
use crate::model::{CategoryResult, Dimension, PriceRange, ProductSelection, SCHEMA_VERSION};
use crate::stages::dimension::slugify;
use crate::stages::lenient::{optional_f64_or_text, text_or_list};

/// Layout version of a raw payload. Payloads without a marker are version 1.
pub fn detect_version(value: &Value) -> u32 {
    value
        .get("schema_version")
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .unwrap_or(1)
}

/// Upgrade a stored payload to the current [`CategoryResult`] layout.
pub fn upgrade_record(value: Value) -> Result<CategoryResult, PersistenceError> {
    match detect_version(&value) {
        SCHEMA_VERSION => Ok(serde_json::from_value(value)?),
        1 => upgrade_v1(value),
        other => Err(PersistenceError::Migration(format!(
            "unsupported schema version {}",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    level1: String,
    #[serde(default)]
    level2: String,
    #[serde(default, alias = "item", alias = "name")]
    level3: String,
    #[serde(default, alias = "price_ranges", alias = "priceIntervals")]
    price_ranges: Vec<LegacyRange>,
    #[serde(default, alias = "evaluationDimensions")]
    dimensions: Vec<LegacyDimension>,
    #[serde(default, alias = "best_products", alias = "selections")]
    best_products: Vec<LegacyProduct>,
    #[serde(default, alias = "cost", deserialize_with = "optional_f64_or_text")]
    total_cost: Option<f64>,
    #[serde(default)]
    model: String,
    #[serde(default, alias = "createdAt", alias = "generated_at")]
    generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct LegacyRange {
    #[serde(default, alias = "level", alias = "name")]
    label: String,
    #[serde(default, alias = "min_price", alias = "minPrice", deserialize_with = "optional_f64_or_text")]
    min: Option<f64>,
    #[serde(default, alias = "max_price", alias = "maxPrice", deserialize_with = "optional_f64_or_text")]
    max: Option<f64>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct LegacyDimension {
    #[serde(default)]
    name: String,
    #[serde(default)]
    code: String,
    #[serde(default, deserialize_with = "optional_f64_or_text")]
    weight: Option<f64>,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "evaluationCriteria")]
    evaluation_criteria: String,
}

#[derive(Debug, Deserialize)]
struct LegacyProduct {
    #[serde(default, alias = "priceRange", alias = "priceLevel", alias = "range")]
    price_range: String,
    #[serde(default, alias = "dimensionCode", alias = "dimensionName")]
    dimension: String,
    #[serde(default, alias = "productName", alias = "name")]
    product_name: String,
    #[serde(default, alias = "brandName", alias = "brand_name")]
    brand: String,
    #[serde(default, alias = "companyName", alias = "company_name")]
    company: String,
    #[serde(default, alias = "companyIntro")]
    company_intro: String,
    #[serde(default, alias = "productModel", alias = "product_model")]
    model: String,
    #[serde(default, deserialize_with = "optional_f64_or_text")]
    price: Option<f64>,
    #[serde(
        default,
        alias = "selectionReason",
        alias = "reason",
        alias = "logic",
        deserialize_with = "text_or_list"
    )]
    selection_reason: String,
    #[serde(
        default,
        alias = "confidenceScore",
        alias = "confidence",
        deserialize_with = "optional_f64_or_text"
    )]
    confidence_score: Option<f64>,
    #[serde(
        default,
        alias = "dataSources",
        alias = "sources",
        deserialize_with = "text_or_list"
    )]
    data_sources: String,
}

fn upgrade_v1(value: Value) -> Result<CategoryResult, PersistenceError> {
    let legacy: LegacyRecord = serde_json::from_value(value)?;

    let category = match legacy.category {
        Some(category) => category,
        None => Category::new(legacy.level1, legacy.level2, legacy.level3),
    };
    if category.level1.trim().is_empty()
        || category.level2.trim().is_empty()
        || category.level3.trim().is_empty()
    {
        return Err(PersistenceError::Migration(
            "legacy record has no complete category path".to_string(),
        ));
    }

    let mut price_ranges: Vec<PriceRange> = legacy
        .price_ranges
        .into_iter()
        .map(|r| PriceRange {
            label: r.label.trim().to_string(),
            min: r.min.unwrap_or(0.0),
            max: r.max.unwrap_or(0.0),
            description: r.description,
        })
        .collect();
    price_ranges.sort_by(|a, b| a.min.total_cmp(&b.min));

    let dimensions: Vec<Dimension> = legacy
        .dimensions
        .into_iter()
        .enumerate()
        .map(|(i, d)| {
            let mut code = slugify(&d.code);
            if code.is_empty() {
                code = slugify(&d.name);
            }
            if code.is_empty() {
                code = format!("dim_{}", i + 1);
            }
            Dimension {
                name: d.name.trim().to_string(),
                code,
                weight: d.weight.unwrap_or(1.0).clamp(1.0, 2.0),
                description: d.description,
                evaluation_criteria: d.evaluation_criteria,
            }
        })
        .collect();

    let selections = legacy
        .best_products
        .into_iter()
        .map(|p| {
            // Old exports refer to dimensions by name; map those to codes.
            let dimension = dimensions
                .iter()
                .find(|d| d.code == p.dimension || d.name == p.dimension)
                .map(|d| d.code.clone())
                .unwrap_or(p.dimension);
            ProductSelection {
                price_range: p.price_range.trim().to_string(),
                dimension,
                product_name: p.product_name.trim().to_string(),
                brand: p.brand.trim().to_string(),
                company: p.company,
                company_intro: p.company_intro,
                model: p.model,
                price: p.price.unwrap_or(0.0),
                selection_reason: p.selection_reason,
                confidence_score: p.confidence_score.unwrap_or(0.0),
                data_sources: p.data_sources,
            }
        })
        .collect();

    Ok(CategoryResult {
        schema_version: SCHEMA_VERSION,
        category,
        price_ranges,
        dimensions,
        selections,
        cost: legacy.total_cost.unwrap_or(0.0),
        model: legacy.model,
        generated_at: legacy.generated_at.unwrap_or_else(Utc::now),
    })
}
