//! Brand authority: which brand names are plausible for a category.
//!
//! The quality gate and the product-selection prompt both consult a
//! [`BrandAuthority`]. [`StaticBrandTable`] is the built-in implementation:
//! per-category allow-lists, a global default list, and a fallback that
//! accepts multi-character Han brand names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::Category;
use crate::utils::text::is_han;

/// Source of truth for brand plausibility.
pub trait BrandAuthority: Send + Sync {
    /// Whether `brand` is a plausible maker of products in `category`.
    fn is_plausible(&self, brand: &str, category: &Category) -> bool;

    /// Brands to offer the model when asking for a product in `category`.
    fn suggested_brands(&self, category: &Category) -> Vec<String>;
}

/// Lowercase and drop everything but letters, digits, underscores and Han.
pub fn normalize_brand(brand: &str) -> String {
    brand
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Two or more Han characters and nothing else.
fn looks_like_native_brand(brand: &str) -> bool {
    let trimmed = brand.trim();
    trimmed.chars().count() >= 2 && trimmed.chars().all(is_han)
}

fn matches_any(normalized: &str, candidates: &[String]) -> bool {
    candidates.iter().any(|candidate| {
        let candidate = normalize_brand(candidate);
        !candidate.is_empty() && (normalized.contains(&candidate) || candidate.contains(normalized))
    })
}

/// Static, config-loadable brand table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticBrandTable {
    /// level1 -> level2 -> brands.
    pub categories: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// level1 -> brands, used for prompts when level2 has no entry.
    pub level1_fallbacks: BTreeMap<String, Vec<String>>,
    /// Brands accepted in any category.
    pub default_brands: Vec<String>,
}

impl StaticBrandTable {
    fn category_brands(&self, category: &Category) -> Option<&Vec<String>> {
        self.categories
            .get(&category.level1)
            .and_then(|level2s| level2s.get(&category.level2))
    }
}

impl BrandAuthority for StaticBrandTable {
    fn is_plausible(&self, brand: &str, category: &Category) -> bool {
        let normalized = normalize_brand(brand);
        if normalized.is_empty() {
            return false;
        }

        if let Some(brands) = self.category_brands(category) {
            if matches_any(&normalized, brands) {
                return true;
            }
        }

        if matches_any(&normalized, &self.default_brands) {
            return true;
        }

        looks_like_native_brand(brand)
    }

    fn suggested_brands(&self, category: &Category) -> Vec<String> {
        if let Some(brands) = self.category_brands(category) {
            return brands.clone();
        }
        tracing::debug!(
            category = %category,
            "No brand mapping for level2, falling back"
        );
        self.level1_fallbacks
            .get(&category.level1)
            .cloned()
            .unwrap_or_else(|| self.default_brands.clone())
    }
}

type Level2Brands<'a> = (&'a str, &'a [&'a str]);

const BUILTIN_CATEGORIES: &[(&str, &[Level2Brands<'static>])] = &[
    (
        "个护健康",
        &[
            (
                "剃须用品",
                &[
                    "Gillette", "Schick", "Philips", "Braun", "Panasonic", "吉列", "舒适", "飞利浦",
                    "博朗", "松下", "飞科", "奔腾", "超人",
                ],
            ),
            (
                "口腔保健",
                &[
                    "Colgate", "Crest", "Sensodyne", "Oral-B", "高露洁", "佳洁士", "舒适达", "欧乐B",
                    "云南白药", "狮王", "皓乐齿", "李施德林",
                ],
            ),
            (
                "护肤",
                &[
                    "L'Oréal", "Estée Lauder", "Shiseido", "SK-II", "La Mer", "欧莱雅", "雅诗兰黛",
                    "资生堂", "海蓝之谜", "兰蔻", "科颜氏", "理肤泉",
                ],
            ),
            (
                "美妆",
                &["MAC", "Chanel", "Dior", "YSL", "Maybelline", "美宝莲", "香奈儿"],
            ),
            (
                "洗发护发",
                &[
                    "Pantene", "Head & Shoulders", "Schwarzkopf", "潘婷", "海飞丝", "施华蔻",
                    "欧莱雅", "沙宣", "清扬",
                ],
            ),
        ],
    ),
    (
        "数码电子",
        &[
            (
                "智能手机",
                &[
                    "Apple", "Samsung", "Huawei", "Xiaomi", "OPPO", "vivo", "苹果", "华为", "小米",
                    "三星", "荣耀", "一加",
                ],
            ),
            (
                "笔记本电脑",
                &[
                    "Apple", "Dell", "HP", "Lenovo", "Asus", "Microsoft", "苹果", "联想", "戴尔",
                    "惠普", "华硕", "微软", "华为", "小米",
                ],
            ),
            (
                "平板电脑",
                &["Apple", "Samsung", "苹果", "华为", "三星", "小米", "联想", "微软", "荣耀"],
            ),
            (
                "相机",
                &["Canon", "Nikon", "Sony", "Fujifilm", "Panasonic", "佳能", "尼康", "索尼", "富士"],
            ),
            (
                "耳机",
                &["Apple", "Sony", "Bose", "Sennheiser", "JBL", "索尼", "森海塞尔", "漫步者"],
            ),
        ],
    ),
    (
        "家居用品",
        &[
            ("家具", &["IKEA", "Herman Miller", "宜家", "顾家家居", "林氏木业"]),
            ("厨具", &["Zwilling", "WMF", "Fissler", "双立人", "菲仕乐", "苏泊尔", "美的", "九阳"]),
            ("清洁", &["Dyson", "戴森", "美的", "海尔", "小米", "科沃斯", "石头科技"]),
        ],
    ),
    (
        "食品饮料",
        &[
            ("零食", &["三只松鼠", "良品铺子", "百草味", "洽洽", "旺旺", "徐福记"]),
            ("饮料", &["Coca-Cola", "Pepsi", "可口可乐", "百事可乐", "农夫山泉", "康师傅", "统一", "王老吉"]),
            ("乳制品", &["伊利", "蒙牛", "光明", "君乐宝", "安佳"]),
        ],
    ),
];

const BUILTIN_LEVEL1_FALLBACKS: &[(&str, &[&str])] = &[
    ("个护健康", &["强生", "宝洁", "联合利华"]),
    ("数码电子", &["华为", "小米", "索尼"]),
    ("家居用品", &["宜家", "无印良品"]),
    ("食品饮料", &["康师傅", "统一", "雀巢"]),
];

const BUILTIN_DEFAULT_BRANDS: &[&str] = &[
    "苹果", "华为", "小米", "三星", "索尼", "戴尔", "惠普", "联想", "佳能", "尼康", "Apple",
    "Huawei", "Xiaomi", "Samsung", "Sony",
];

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for StaticBrandTable {
    fn default() -> Self {
        let categories = BUILTIN_CATEGORIES
            .iter()
            .map(|(level1, level2s)| {
                let inner = level2s
                    .iter()
                    .map(|(level2, brands)| (level2.to_string(), to_strings(brands)))
                    .collect();
                (level1.to_string(), inner)
            })
            .collect();

        let level1_fallbacks = BUILTIN_LEVEL1_FALLBACKS
            .iter()
            .map(|(level1, brands)| (level1.to_string(), to_strings(brands)))
            .collect();

        Self {
            categories,
            level1_fallbacks,
            default_brands: to_strings(BUILTIN_DEFAULT_BRANDS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shaving() -> Category {
        Category::new("个护健康", "剃须用品", "手动剃须刀")
    }

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize_brand("Oral-B"), "oralb");
        assert_eq!(normalize_brand("  SK-II "), "skii");
        assert_eq!(normalize_brand("Head & Shoulders"), "headshoulders");
        assert_eq!(normalize_brand("飞利浦（Philips）"), "飞利浦philips");
    }

    #[test]
    fn test_category_allow_list_matches_both_directions() {
        let table = StaticBrandTable::default();
        assert!(table.is_plausible("Gillette", &shaving()));
        assert!(table.is_plausible("gillette fusion", &shaving()));
        assert!(table.is_plausible("飞利浦（Philips）", &shaving()));
    }

    #[test]
    fn test_default_list_applies_everywhere() {
        let table = StaticBrandTable::default();
        let unknown = Category::new("汽车用品", "车载电器", "车载冰箱");
        assert!(table.is_plausible("Sony", &unknown));
    }

    #[test]
    fn test_han_heuristic() {
        let table = StaticBrandTable::default();
        let unknown = Category::new("汽车用品", "车载电器", "车载冰箱");
        assert!(table.is_plausible("美固", &unknown));
        assert!(!table.is_plausible("美", &unknown));
        assert!(!table.is_plausible("Zorblax", &unknown));
    }

    #[test]
    fn test_empty_brand_is_never_plausible() {
        let table = StaticBrandTable::default();
        assert!(!table.is_plausible("", &shaving()));
        assert!(!table.is_plausible(" - ", &shaving()));
    }

    #[test]
    fn test_suggestions_fall_back_by_level() {
        let table = StaticBrandTable::default();
        assert!(table
            .suggested_brands(&shaving())
            .contains(&"Gillette".to_string()));

        let personal_care_other = Category::new("个护健康", "香水", "淡香水");
        assert_eq!(
            table.suggested_brands(&personal_care_other),
            vec!["强生", "宝洁", "联合利华"]
        );

        let unknown = Category::new("汽车用品", "车载电器", "车载冰箱");
        assert_eq!(table.suggested_brands(&unknown), table.default_brands);
    }

    #[test]
    fn test_table_loads_from_yaml() {
        let yaml = r#"
categories:
  汽车用品:
    车载电器: [Dometic, 英得尔]
default_brands: [Bosch]
"#;
        let table: StaticBrandTable = serde_yaml::from_str(yaml).unwrap();
        let fridge = Category::new("汽车用品", "车载电器", "车载冰箱");
        assert!(table.is_plausible("Dometic", &fridge));
        assert!(table.is_plausible("bosch", &fridge));
        // Omitted sections keep the built-in entries.
        assert!(table.level1_fallbacks.contains_key("个护健康"));
    }
}
