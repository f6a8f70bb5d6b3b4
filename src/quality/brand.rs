//! Brand plausibility.

use regex::Regex;
use std::collections::BTreeSet;

use super::{QualityFamily, QualityIssue, QualityThresholds};
use crate::brands::BrandAuthority;
use crate::model::CategoryResult;

fn issue(message: impl Into<String>) -> QualityIssue {
    QualityIssue::new(QualityFamily::Brand, message)
}

/// Whether `brand` matches any placeholder pattern.
pub(super) fn is_generic(brand: &str, patterns: &[Regex]) -> bool {
    let brand = brand.trim();
    patterns.iter().any(|p| p.is_match(brand))
}

pub(super) fn check(
    result: &CategoryResult,
    thresholds: &QualityThresholds,
    patterns: &[Regex],
    authority: &dyn BrandAuthority,
) -> Vec<QualityIssue> {
    let mut issues = Vec::new();
    if result.selections.is_empty() {
        return issues;
    }

    let mut real = 0usize;
    let mut problem_brands: BTreeSet<&str> = BTreeSet::new();

    for (i, selection) in result.selections.iter().enumerate() {
        let brand = selection.brand.trim();
        if brand.is_empty() {
            issues.push(issue(format!("selection {}: empty brand", i + 1)));
            continue;
        }
        if is_generic(brand, patterns) {
            issues.push(issue(format!(
                "selection {}: generic brand '{}'",
                i + 1,
                brand
            )));
            problem_brands.insert(brand);
            continue;
        }
        if authority.is_plausible(brand, &result.category) {
            real += 1;
        } else {
            problem_brands.insert(brand);
        }
    }

    let ratio = real as f64 / result.selections.len() as f64;
    if ratio < thresholds.min_real_brand_ratio {
        issues.push(issue(format!(
            "real brand ratio {:.0}% below {:.0}% (problem brands: {})",
            ratio * 100.0,
            thresholds.min_real_brand_ratio * 100.0,
            problem_brands.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }

    issues
}
