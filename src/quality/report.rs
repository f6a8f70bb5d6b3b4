//! Batch quality report over stored results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{QualityIssue, QualityValidator};
use crate::model::CategoryResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitySummary {
    pub total_categories: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percentage, 0 to 100.
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuality {
    pub category: String,
    pub is_valid: bool,
    pub selections: usize,
    pub issues: Vec<QualityIssue>,
}

/// Re-gate many results at once, e.g. after thresholds changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub timestamp: DateTime<Utc>,
    pub summary: QualitySummary,
    pub details: Vec<CategoryQuality>,
}

impl QualityReport {
    pub fn build<'a>(
        validator: &QualityValidator,
        results: impl IntoIterator<Item = &'a CategoryResult>,
    ) -> Self {
        let details: Vec<CategoryQuality> = results
            .into_iter()
            .map(|result| {
                let verdict = validator.validate(result);
                CategoryQuality {
                    category: result.category.path(),
                    is_valid: verdict.is_valid,
                    selections: result.selections.len(),
                    issues: verdict.issues,
                }
            })
            .collect();

        let total = details.len();
        let passed = details.iter().filter(|d| d.is_valid).count();
        let pass_rate = if total == 0 {
            0.0
        } else {
            passed as f64 * 100.0 / total as f64
        };

        Self {
            timestamp: Utc::now(),
            summary: QualitySummary {
                total_categories: total,
                passed,
                failed: total - passed,
                pass_rate,
            },
            details,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CategoryQuality> {
        self.details.iter().filter(|d| !d.is_valid)
    }
}
