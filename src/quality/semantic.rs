//! Shallow text-quality heuristics over the selection reason.
//!
//! Tokens are runs of Han and ASCII word characters, so a clause between two
//! punctuation marks counts once and a repeated clause counts as repetition.

use std::collections::BTreeMap;

use super::{QualityFamily, QualityIssue, QualityThresholds};
use crate::model::CategoryResult;
use crate::utils::text::words;

fn issue(message: impl Into<String>) -> QualityIssue {
    QualityIssue::new(QualityFamily::Semantic, message)
}

pub(super) fn sentence_count(text: &str) -> usize {
    text.split(['。', '！', '？', '.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
}

pub(super) fn check(result: &CategoryResult, thresholds: &QualityThresholds) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    for (i, selection) in result.selections.iter().enumerate() {
        let text = selection.selection_reason.as_str();
        if text.trim().is_empty() {
            continue;
        }
        let label = format!("selection {}", i + 1);

        let sentences = sentence_count(text);
        if sentences < thresholds.min_sentences {
            issues.push(issue(format!(
                "{}: only {} sentences (need {})",
                label, sentences, thresholds.min_sentences
            )));
        }

        let tokens = words(text);
        let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for token in &tokens {
            *frequency.entry(token.as_str()).or_default() += 1;
        }

        if frequency.len() < thresholds.min_distinct_tokens {
            issues.push(issue(format!(
                "{}: vocabulary too small ({} distinct tokens)",
                label,
                frequency.len()
            )));
        }

        if let Some((token, count)) = frequency.iter().max_by_key(|(_, count)| **count) {
            let ratio = *count as f64 / tokens.len() as f64;
            if ratio > thresholds.max_repetition_ratio {
                issues.push(issue(format!(
                    "{}: token '{}' repeated in {:.0}% of the text",
                    label,
                    token,
                    ratio * 100.0
                )));
            }
        }
    }

    issues
}
