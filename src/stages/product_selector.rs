//! Product selection for one (price range, dimension) pair.

use serde::Deserialize;

use super::lenient::{optional_f64_or_text, text_or_list};
use super::prompts::{format_price, PRODUCT_SELECTION_SYSTEM_PROMPT, PRODUCT_SELECTION_USER_PROMPT};
use super::{Generated, Stage};
use crate::catalog::Category;
use crate::error::StageError;
use crate::llm::{CompletionClient, PromptSpec};
use crate::model::{Dimension, PriceRange, ProductSelection};

/// Minimum reason length requested from the model.
pub const DEFAULT_MIN_REASON_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct SelectionReply {
    #[serde(default, alias = "productName", alias = "name")]
    product_name: String,
    #[serde(default, alias = "brand", alias = "brandName")]
    brand_name: String,
    #[serde(default, alias = "company", alias = "companyName")]
    company_name: String,
    #[serde(default, alias = "companyIntro")]
    company_intro: String,
    #[serde(default, alias = "model", alias = "productModel")]
    product_model: String,
    #[serde(default, deserialize_with = "optional_f64_or_text")]
    price: Option<f64>,
    #[serde(default, alias = "reason", alias = "selectionReason", deserialize_with = "text_or_list")]
    selection_reason: String,
    #[serde(default, alias = "confidence", alias = "confidenceScore", deserialize_with = "optional_f64_or_text")]
    confidence_score: Option<f64>,
    #[serde(default, alias = "sources", alias = "dataSources", deserialize_with = "text_or_list")]
    data_sources: String,
}

/// Picks the best product for a single (price range, dimension) pair.
///
/// The selector only shapes the reply. Whether the product is plausible
/// (brand, price inside the tier, reason depth) is decided later by the
/// quality gate over the whole category.
#[derive(Clone)]
pub struct ProductSelector {
    client: CompletionClient,
    min_reason_chars: usize,
}

impl ProductSelector {
    pub fn new(client: CompletionClient) -> Self {
        Self {
            client,
            min_reason_chars: DEFAULT_MIN_REASON_CHARS,
        }
    }

    pub fn with_min_reason_chars(mut self, chars: usize) -> Self {
        self.min_reason_chars = chars;
        self
    }

    pub fn build_prompt(
        &self,
        category: &Category,
        range: &PriceRange,
        dimension: &Dimension,
        brands: &[String],
    ) -> PromptSpec {
        let brand_list = if brands.is_empty() {
            "（未提供，请选择该品类真实存在的知名品牌）".to_string()
        } else {
            brands.join("、")
        };
        let fill = |template: &str| {
            template
                .replace("{level1}", &category.level1)
                .replace("{level2}", &category.level2)
                .replace("{level3}", &category.level3)
                .replace("{min_reason_chars}", &self.min_reason_chars.to_string())
                .replace("{range_label}", &range.label)
                .replace("{range_min}", &format_price(range.min))
                .replace("{range_max}", &format_price(range.max))
                .replace("{dimension_name}", &dimension.name)
                .replace("{dimension_code}", &dimension.code)
                .replace("{dimension_description}", &dimension.description)
                .replace("{brands}", &brand_list)
        };
        PromptSpec::new(
            Stage::ProductSelection,
            fill(PRODUCT_SELECTION_SYSTEM_PROMPT),
            fill(PRODUCT_SELECTION_USER_PROMPT),
        )
    }

    pub async fn select(
        &self,
        category: &Category,
        range: &PriceRange,
        dimension: &Dimension,
        brands: &[String],
    ) -> Result<Generated<ProductSelection>, StageError> {
        let spec = self.build_prompt(category, range, dimension, brands);
        let context = format!("{} [{} x {}]", category.path(), range.label, dimension.code);
        let completion = self
            .client
            .complete_as::<SelectionReply>(&spec, &context)
            .await
            .map_err(|source| StageError::Completion {
                stage: Stage::ProductSelection,
                source,
            })?;

        let reply = completion.payload;
        let product_name = reply.product_name.trim().to_string();
        if product_name.is_empty() {
            return Err(StageError::invalid(
                Stage::ProductSelection,
                format!("no product named for {}", context),
            ));
        }

        let selection = ProductSelection {
            price_range: range.label.clone(),
            dimension: dimension.code.clone(),
            product_name,
            brand: reply.brand_name.trim().to_string(),
            company: reply.company_name.trim().to_string(),
            company_intro: reply.company_intro.trim().to_string(),
            model: reply.product_model.trim().to_string(),
            price: reply.price.unwrap_or(0.0),
            selection_reason: reply.selection_reason.trim().to_string(),
            confidence_score: reply.confidence_score.unwrap_or(0.0),
            data_sources: reply.data_sources.trim().to_string(),
        };

        Ok(Generated {
            value: selection,
            cost: completion.cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{client_for, FixedReply};

    fn range() -> PriceRange {
        PriceRange {
            label: "主流级".to_string(),
            min: 100.0,
            max: 299.0,
            description: String::new(),
        }
    }

    fn dimension() -> Dimension {
        Dimension {
            name: "刀片锋利度".to_string(),
            code: "blade_sharpness".to_string(),
            weight: 1.8,
            description: "刀片初次使用与长期使用的锋利程度".to_string(),
            evaluation_criteria: String::new(),
        }
    }

    fn category() -> Category {
        Category::new("个护健康", "剃须用品", "手动剃须刀")
    }

    #[test]
    fn test_prompt_carries_pair_and_brands() {
        let selector = ProductSelector::new(client_for(FixedReply::new("{}")));
        let spec = selector.build_prompt(
            &category(),
            &range(),
            &dimension(),
            &["吉列".to_string(), "舒适".to_string()],
        );
        assert!(spec.system.contains("主流级 (¥100-¥299)"));
        assert!(spec.system.contains("吉列、舒适"));
        assert!(spec.system.contains("至少200字"));
        assert!(spec.user.contains("维度代码：blade_sharpness"));
        assert!(!spec.system.contains("{range_"));
    }

    #[test]
    fn test_prompt_without_brands() {
        let selector = ProductSelector::new(client_for(FixedReply::new("{}"))).with_min_reason_chars(50);
        let spec = selector.build_prompt(&category(), &range(), &dimension(), &[]);
        assert!(spec.system.contains("未提供"));
        assert!(spec.system.contains("至少50字"));
    }

    #[tokio::test]
    async fn test_select_decodes_loose_reply() {
        let provider = FixedReply::new(
            r#"{
                "productName": "吉列锋速3经典手动剃须刀",
                "brand": "吉列",
                "company": "宝洁公司",
                "model": "Mach3",
                "price": "¥159",
                "reason": ["三层刀片设计。", "刀片采用钢材。"],
                "confidence": "88",
                "sources": ["京东", "天猫"]
            }"#,
        );
        let selector = ProductSelector::new(client_for(provider));
        let out = selector
            .select(&category(), &range(), &dimension(), &[])
            .await
            .unwrap();

        let s = out.value;
        assert_eq!(s.price_range, "主流级");
        assert_eq!(s.dimension, "blade_sharpness");
        assert_eq!(s.brand, "吉列");
        assert_eq!(s.model, "Mach3");
        assert_eq!(s.price, 159.0);
        assert_eq!(s.confidence_score, 88.0);
        assert_eq!(s.selection_reason, "三层刀片设计。；刀片采用钢材。");
        assert_eq!(s.data_sources, "京东；天猫");
    }

    #[tokio::test]
    async fn test_select_without_product_name_is_invalid() {
        let provider = FixedReply::new(r#"{"brand_name": "吉列", "price": 150}"#);
        let selector = ProductSelector::new(client_for(provider));
        let err = selector
            .select(&category(), &range(), &dimension(), &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StageError::InvalidOutput {
                stage: Stage::ProductSelection,
                ..
            }
        ));
    }
}
