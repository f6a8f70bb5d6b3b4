//! The combined quality gate.

use regex::Regex;
use std::sync::Arc;

use super::{brand, content, price, semantic, structural};
use super::{QualityThresholds, ValidationVerdict};
use crate::brands::{BrandAuthority, StaticBrandTable};
use crate::model::CategoryResult;

/// Runs every rule family over a category result.
///
/// `validate` has no side effects and reads nothing but its argument and
/// the immutable thresholds, so the same result always yields the same
/// verdict.
#[derive(Clone)]
pub struct QualityValidator {
    thresholds: QualityThresholds,
    generic_patterns: Vec<Regex>,
    authority: Arc<dyn BrandAuthority>,
}

impl QualityValidator {
    /// Compile the generic brand patterns; an invalid regex is an error.
    pub fn new(
        thresholds: QualityThresholds,
        authority: Arc<dyn BrandAuthority>,
    ) -> Result<Self, regex::Error> {
        let generic_patterns = thresholds
            .generic_brand_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            thresholds,
            generic_patterns,
            authority,
        })
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    pub fn authority(&self) -> &Arc<dyn BrandAuthority> {
        &self.authority
    }

    pub fn validate(&self, result: &CategoryResult) -> ValidationVerdict {
        let mut issues = structural::check(result);
        issues.extend(brand::check(
            result,
            &self.thresholds,
            &self.generic_patterns,
            self.authority.as_ref(),
        ));
        issues.extend(content::check(result, &self.thresholds));
        issues.extend(price::check(result, &self.thresholds));
        issues.extend(semantic::check(result, &self.thresholds));
        ValidationVerdict::from_issues(issues)
    }
}

impl Default for QualityValidator {
    fn default() -> Self {
        let thresholds = QualityThresholds::default();
        let generic_patterns = thresholds
            .generic_brand_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            thresholds,
            generic_patterns,
            authority: Arc::new(StaticBrandTable::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PriceRange;
    use crate::quality::fixtures::{accepted_result, GOOD_REASON};
    use crate::quality::QualityFamily;

    #[test]
    fn test_clean_result_is_accepted() {
        let verdict = QualityValidator::default().validate(&accepted_result());
        assert!(verdict.is_valid, "{:?}", verdict.issues);
        assert_eq!(accepted_result().selections.len(), 9);
    }

    #[test]
    fn test_placeholder_brand_fails_brand_family() {
        let mut result = accepted_result();
        result.selections[0].brand = "Brand-A".to_string();
        let verdict = QualityValidator::default().validate(&result);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.failed_families(), vec![QualityFamily::Brand]);
    }

    #[test]
    fn test_one_short_reason_rejects_the_category() {
        let mut result = accepted_result();
        result.selections[5].selection_reason = GOOD_REASON.chars().take(150).collect();
        let verdict = QualityValidator::default().validate(&result);
        assert!(!verdict.is_valid);
        assert_eq!(verdict.failed_families(), vec![QualityFamily::Content]);
        assert_eq!(verdict.issues.len(), 1);
    }

    #[test]
    fn test_inverted_range_fails_price_family() {
        let mut result = accepted_result();
        result.price_ranges[2] = PriceRange {
            label: "旗舰级".to_string(),
            min: 100.0,
            max: 50.0,
            description: String::new(),
        };
        let verdict = QualityValidator::default().validate(&result);
        assert!(verdict.failed(QualityFamily::Price));
        assert!(verdict
            .issues_for(QualityFamily::Price)
            .any(|i| i.message.contains("inverted range '旗舰级'")));
    }

    #[test]
    fn test_validate_is_pure() {
        let validator = QualityValidator::default();
        let mut result = accepted_result();
        result.selections[1].brand = "Zorblax".to_string();
        result.selections[2].brand = "测试品牌".to_string();
        result.selections[3].confidence_score = 12.0;
        let first = validator.validate(&result);
        let second = validator.validate(&result);
        assert_eq!(first, second);
        assert!(!first.is_valid);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let thresholds = QualityThresholds {
            generic_brand_patterns: vec!["(unclosed".to_string()],
            ..Default::default()
        };
        assert!(QualityValidator::new(thresholds, Arc::new(StaticBrandTable::default())).is_err());
    }

    #[test]
    fn test_custom_authority() {
        struct Nobody;
        impl BrandAuthority for Nobody {
            fn is_plausible(&self, _: &str, _: &crate::catalog::Category) -> bool {
                false
            }
            fn suggested_brands(&self, _: &crate::catalog::Category) -> Vec<String> {
                Vec::new()
            }
        }
        let validator = QualityValidator::new(QualityThresholds::default(), Arc::new(Nobody)).unwrap();
        let verdict = validator.validate(&accepted_result());
        assert_eq!(verdict.failed_families(), vec![QualityFamily::Brand]);
    }
}
