//! Reason depth, confidence and sourcing.

use super::{QualityFamily, QualityIssue, QualityThresholds};
use crate::model::CategoryResult;

fn issue(message: impl Into<String>) -> QualityIssue {
    QualityIssue::new(QualityFamily::Content, message)
}

pub(super) fn check(result: &CategoryResult, thresholds: &QualityThresholds) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    for (i, selection) in result.selections.iter().enumerate() {
        let label = format!("selection {}", i + 1);

        let reason_chars = selection.selection_reason.trim().chars().count();
        if reason_chars < thresholds.min_reason_chars {
            issues.push(issue(format!(
                "{}: reason too short ({} < {} chars)",
                label, reason_chars, thresholds.min_reason_chars
            )));
        }

        let confidence = selection.confidence_score;
        if !(thresholds.min_confidence..=thresholds.max_confidence).contains(&confidence) {
            issues.push(issue(format!(
                "{}: confidence {} outside [{}, {}]",
                label, confidence, thresholds.min_confidence, thresholds.max_confidence
            )));
        }

        let source_chars = selection.data_sources.trim().chars().count();
        if source_chars < thresholds.min_data_source_chars {
            issues.push(issue(format!(
                "{}: data sources too thin ({} chars)",
                label, source_chars
            )));
        }
    }

    issues
}
