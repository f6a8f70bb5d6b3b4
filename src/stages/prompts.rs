//! Prompt templates for the three generation stages.
//!
//! Placeholders use `{name}` and are filled with `str::replace`.

/// System prompt for price tier generation.
pub const PRICE_RANGE_SYSTEM_PROMPT: &str = r#"你是一位资深商品价格分析师。请为【{level3}】设置科学合理的价格区间。

## 绝对要求
1. 基于该品类的实际市场价格分布
2. 区间设置必须符合消费者认知
3. 价格必须是合理的市场价（人民币）
4. 区间按价格从低到高排列，区间之间不能有重叠，每个区间的最低价必须小于最高价

## 输出格式（只输出JSON）
{
  "price_ranges": [
    {
      "label": "区间名称（入门级 / 主流级 / 旗舰级）",
      "min_price": 最低价格（数字）,
      "max_price": 最高价格（数字）,
      "description": "该区间商品的典型特点（50-100字）"
    }
  ]
}"#;

/// User prompt for price tier generation.
pub const PRICE_RANGE_USER_PROMPT: &str = r#"请为【{level3}】设置恰好 3 个价格区间：入门级、主流级、旗舰级。
品类背景：{level1} > {level2}
请考虑：
1. 该品类在电商平台的实际价格范围
2. 不同价位段的产品差异
3. 消费者的购买习惯和预算"#;

/// System prompt for comparison dimension generation.
pub const DIMENSION_SYSTEM_PROMPT: &str = r#"你是一位商品评测专家。请为【{level3}】设置科学合理的评价维度。

## 核心原则
1. 维度必须针对该品类特有，不能通用
2. 必须是消费者真正关心的决策因素
3. 维度之间要有明显区分度
4. 每个维度都要有具体的评价标准

## 品类特点
- 一级分类：{level1}
- 二级分类：{level2}
- 品类：{level3}

## 输出格式（只输出JSON）
{
  "dimensions": [
    {
      "name": "维度名称（具体、可衡量）",
      "code": "维度代码（英文小写_下划线）",
      "weight": 权重（1.0-2.0，反映重要性）,
      "description": "维度详细说明（50-100字）",
      "evaluation_criteria": "具体的评价标准（100-150字）"
    }
  ]
}"#;

/// User prompt for comparison dimension generation.
pub const DIMENSION_USER_PROMPT: &str = r#"请为【{level3}】设置 {min_dimensions}-{max_dimensions} 个核心评价维度。
要求：
1. 避免通用维度（如"质量好"要具体化为"耐用性最佳"）
2. 考虑消费者购买时的真实考量
3. 维度要能有效区分商品优劣"#;

/// System prompt for single product selection.
pub const PRODUCT_SELECTION_SYSTEM_PROMPT: &str = r#"你是一位极其严谨的商品评测专家。请为【{level3}】评选最佳商品。

## 绝对要求
1. 真实性：商品必须真实存在，有具体型号
2. 合理性：品牌必须生产该品类商品
3. 专业性：评选理由必须基于事实和数据
4. 详细性：评选理由至少{min_reason_chars}字，分多句论述，包含具体参数

## 评选条件
- 品类：{level1} > {level2} > {level3}
- 价格区间：{range_label} (¥{range_min}-¥{range_max})
- 评价维度：{dimension_name}
- 维度说明：{dimension_description}

## 适合品牌（必须从中选择）
{brands}

## 输出格式（只输出JSON）
{
  "product_name": "商品完整名称",
  "brand_name": "品牌名称（必须来自适合品牌列表）",
  "company_name": "公司全称",
  "company_intro": "公司介绍（成立时间、总部、规模等）",
  "product_model": "具体型号",
  "price": 价格（数字，必须在指定区间内）,
  "selection_reason": "详细评选理由（为什么在该维度表现最佳、技术参数或用户反馈、与竞品对比、市场口碑）",
  "confidence_score": 置信度评分（0-100）,
  "data_sources": "数据来源（官网/电商平台/评测机构等，具体列出）"
}"#;

/// User prompt for single product selection.
pub const PRODUCT_SELECTION_USER_PROMPT: &str = r#"请为【{level3}】在【{range_label}】价格区间内，针对【{dimension_name}】这一维度，评选出一款最佳商品。
维度代码：{dimension_code}

特别注意：
1. 品牌必须来自适合品牌列表
2. 价格必须在 ¥{range_min}-¥{range_max} 范围内
3. 评选理由必须详细、具体、有说服力
4. 提供可验证的数据来源"#;

/// Format a price for prompt display without a trailing ".0".
pub fn format_price(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}
