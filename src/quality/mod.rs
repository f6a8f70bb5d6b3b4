//! Quality gate for generated categories.
//!
//! A [`CategoryResult`](crate::model::CategoryResult) is judged by five
//! independent rule families:
//!
//! | Family     | Checks                                                   |
//! |------------|----------------------------------------------------------|
//! | Structural | required fields present, references resolve              |
//! | Brand      | real-brand fraction, generic placeholder names           |
//! | Content    | reason length, confidence range, data sources            |
//! | Price      | floor, spread, range ordering, selection inside its tier |
//! | Semantic   | sentence count, vocabulary, token repetition             |
//!
//! The verdict is the AND of all families. There is no partial credit:
//! one failing selection rejects the whole category.

use serde::{Deserialize, Serialize};
use std::fmt;

mod brand;
mod content;
mod price;
pub mod report;
mod semantic;
mod structural;
mod validator;

pub use report::{CategoryQuality, QualityReport, QualitySummary};
pub use validator::QualityValidator;

/// Rule family an issue belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFamily {
    Structural,
    Brand,
    Content,
    Price,
    Semantic,
}

impl QualityFamily {
    pub const ALL: [QualityFamily; 5] = [
        QualityFamily::Structural,
        QualityFamily::Brand,
        QualityFamily::Content,
        QualityFamily::Price,
        QualityFamily::Semantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityFamily::Structural => "structural",
            QualityFamily::Brand => "brand",
            QualityFamily::Content => "content",
            QualityFamily::Price => "price",
            QualityFamily::Semantic => "semantic",
        }
    }
}

impl fmt::Display for QualityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub family: QualityFamily,
    pub message: String,
}

impl QualityIssue {
    pub fn new(family: QualityFamily, message: impl Into<String>) -> Self {
        Self {
            family,
            message: message.into(),
        }
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.family, self.message)
    }
}

/// Outcome of the quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub issues: Vec<QualityIssue>,
}

impl ValidationVerdict {
    pub fn from_issues(issues: Vec<QualityIssue>) -> Self {
        Self {
            is_valid: issues.is_empty(),
            issues,
        }
    }

    pub fn issues_for(&self, family: QualityFamily) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(move |i| i.family == family)
    }

    /// Whether any issue was raised by `family`.
    pub fn failed(&self, family: QualityFamily) -> bool {
        self.issues_for(family).next().is_some()
    }

    /// Families with at least one issue, in check order.
    pub fn failed_families(&self) -> Vec<QualityFamily> {
        QualityFamily::ALL
            .into_iter()
            .filter(|f| self.failed(*f))
            .collect()
    }
}

/// Default placeholder patterns a generated brand must never match.
pub const DEFAULT_GENERIC_BRAND_PATTERNS: &[&str] = &[
    r"品牌[A-Za-zＡ-Ｚ]",
    r"示例品牌",
    r"知名品牌",
    r"虚拟品牌",
    r"测试品牌",
    r"(?i)test\s*brand",
    r"(?i)demo\s*brand",
    r"(?i)fake\s*brand",
    r"(?i)sample\s*brand",
    r"(?i)^brand[\s_-]*[a-z0-9]$",
];

/// Thresholds used by the rule families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Fraction of selections whose brand must be recognised.
    pub min_real_brand_ratio: f64,
    /// Minimum selection reason length, in characters.
    pub min_reason_chars: usize,
    pub min_confidence: f64,
    pub max_confidence: f64,
    /// Minimum trimmed data-source length, in characters.
    pub min_data_source_chars: usize,
    pub min_price: f64,
    /// Ceiling for max price / min price across a category.
    pub max_price_factor: f64,
    pub min_sentences: usize,
    pub min_distinct_tokens: usize,
    /// Ceiling for the share of the most frequent token in a reason.
    pub max_repetition_ratio: f64,
    /// Regexes for placeholder brand names.
    pub generic_brand_patterns: Vec<String>,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_real_brand_ratio: 0.8,
            min_reason_chars: 200,
            min_confidence: 70.0,
            max_confidence: 100.0,
            min_data_source_chars: 10,
            min_price: 0.1,
            max_price_factor: 1000.0,
            min_sentences: 3,
            min_distinct_tokens: 20,
            max_repetition_ratio: 0.3,
            generic_brand_patterns: DEFAULT_GENERIC_BRAND_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}
