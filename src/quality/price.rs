//! Price sanity.

use super::{QualityFamily, QualityIssue, QualityThresholds};
use crate::model::CategoryResult;

fn issue(message: impl Into<String>) -> QualityIssue {
    QualityIssue::new(QualityFamily::Price, message)
}

pub(super) fn check(result: &CategoryResult, thresholds: &QualityThresholds) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    for range in &result.price_ranges {
        if range.min >= range.max {
            issues.push(issue(format!(
                "inverted range '{}': min {} >= max {}",
                range.label, range.min, range.max
            )));
        }
    }

    for pair in result.price_ranges.windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        if lower.min > upper.min {
            issues.push(issue(format!(
                "ranges out of order: '{}' starts above '{}'",
                lower.label, upper.label
            )));
        } else if lower.max >= upper.min {
            issues.push(issue(format!(
                "ranges '{}' and '{}' overlap",
                lower.label, upper.label
            )));
        }
    }

    let mut positive = Vec::new();
    for (i, selection) in result.selections.iter().enumerate() {
        let price = selection.price;
        if !price.is_finite() || price < thresholds.min_price {
            issues.push(issue(format!(
                "selection {}: price {} below floor {}",
                i + 1,
                price,
                thresholds.min_price
            )));
        }
        if price.is_finite() && price > 0.0 {
            positive.push(price);
        }

        if let Some(range) = result.range_for(selection) {
            if !range.contains(price) {
                issues.push(issue(format!(
                    "selection {}: price {} outside range '{}' [{}, {}]",
                    i + 1,
                    price,
                    range.label,
                    range.min,
                    range.max
                )));
            }
        }
    }

    if !result.selections.is_empty() {
        if positive.is_empty() {
            issues.push(issue("no valid prices"));
        } else {
            let min = positive.iter().copied().fold(f64::INFINITY, f64::min);
            let max = positive.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let factor = max / min;
            if factor > thresholds.max_price_factor {
                issues.push(issue(format!(
                    "price spread too wide: max/min = {:.0} > {}",
                    factor, thresholds.max_price_factor
                )));
            }
        }
    }

    issues
}
