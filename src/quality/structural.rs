//! Required fields and cross references.

use std::collections::HashSet;

use super::{QualityFamily, QualityIssue};
use crate::model::CategoryResult;

fn issue(message: impl Into<String>) -> QualityIssue {
    QualityIssue::new(QualityFamily::Structural, message)
}

pub(super) fn check(result: &CategoryResult) -> Vec<QualityIssue> {
    let mut issues = Vec::new();
    let category = &result.category;

    for (name, value) in [
        ("level1", &category.level1),
        ("level2", &category.level2),
        ("level3", &category.level3),
    ] {
        if value.trim().is_empty() {
            issues.push(issue(format!("category {} is empty", name)));
        }
    }

    if result.price_ranges.is_empty() {
        issues.push(issue("no price ranges"));
    }
    if result.dimensions.is_empty() {
        issues.push(issue("no dimensions"));
    }
    if result.selections.is_empty() {
        issues.push(issue("no product selections"));
    }

    let mut seen_pairs = HashSet::new();
    for (i, selection) in result.selections.iter().enumerate() {
        let label = format!("selection {}", i + 1);

        for (field, value) in [
            ("product_name", &selection.product_name),
            ("brand", &selection.brand),
            ("price_range", &selection.price_range),
            ("dimension", &selection.dimension),
            ("selection_reason", &selection.selection_reason),
        ] {
            if value.trim().is_empty() {
                issues.push(issue(format!("{}: missing {}", label, field)));
            }
        }

        if !selection.price_range.is_empty() && result.range_for(selection).is_none() {
            issues.push(issue(format!(
                "{}: unknown price range '{}'",
                label, selection.price_range
            )));
        }
        if !selection.dimension.is_empty() && result.dimension_for(selection).is_none() {
            issues.push(issue(format!(
                "{}: unknown dimension '{}'",
                label, selection.dimension
            )));
        }

        if !seen_pairs.insert((selection.price_range.as_str(), selection.dimension.as_str())) {
            issues.push(issue(format!(
                "{}: duplicate pair ({}, {})",
                label, selection.price_range, selection.dimension
            )));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::fixtures::accepted_result;

    #[test]
    fn test_complete_result_passes() {
        assert!(check(&accepted_result()).is_empty());
    }

    #[test]
    fn test_empty_collections_are_reported() {
        let mut result = accepted_result();
        result.selections.clear();
        result.dimensions.clear();
        let issues = check(&result);
        assert!(issues.iter().any(|i| i.message == "no dimensions"));
        assert!(issues.iter().any(|i| i.message == "no product selections"));
    }

    #[test]
    fn test_missing_fields_and_dangling_refs() {
        let mut result = accepted_result();
        result.selections[0].product_name = "  ".to_string();
        result.selections[1].dimension = "durability".to_string();
        let issues = check(&result);
        assert!(issues
            .iter()
            .any(|i| i.message == "selection 1: missing product_name"));
        assert!(issues
            .iter()
            .any(|i| i.message.contains("unknown dimension 'durability'")));
    }

    #[test]
    fn test_duplicate_pair() {
        let mut result = accepted_result();
        let copy = result.selections[0].clone();
        result.selections.push(copy);
        assert!(check(&result)
            .iter()
            .any(|i| i.message.contains("duplicate pair")));
    }
}
