//! End-to-end runs of the orchestrator against a scripted completion service.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use product_forge::catalog::Category;
use product_forge::llm::{
    Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, RetryPolicy, Usage,
};
use product_forge::pipeline::{Orchestrator, PipelineConfig, ProgressTracker, RunSummary};
use product_forge::storage::CheckpointStore;
use product_forge::LlmError;

const REASON: &str = "吉列锋速3三层刀片，铂金涂层，初用锋利，同价突出，剃须顺滑，泡沫残留少。第三方机构评测，跟踪三十天，第十五次使用后，效果依然稳定，胜过同类竞品，刀头寿命更长。弹性刀头贴合轮廓，减少拉扯感，降低刮伤风险，适合硬胡须，早晨打理快，旅行携带方便。电商评价超过十万条，好评率高达九成六，用户反馈刀片耐用，替换成本比较合理，售后渠道覆盖全国，正品保障让人放心。综合技术参数，结合长期口碑，再看价格表现，该产品在锋利度维度上，是主流价位段的首选。";

const PRICE_REPLY: &str = r#"```json
{"price_ranges": [
    {"label": "入门级", "min_price": 10, "max_price": 49, "description": "基础款"},
    {"label": "主流级", "min_price": "¥50", "max_price": "¥199", "description": "多层刀片"},
    {"label": "旗舰级", "min_price": 200, "max_price": 999, "description": "高端系列"}
]}
```"#;

const TWO_TIER_REPLY: &str = r#"{"price_ranges": [
    {"label": "入门级", "min_price": 10, "max_price": 49},
    {"label": "旗舰级", "min_price": 50, "max_price": 999}
]}"#;

const DIMENSION_REPLY: &str = r#"好的，以下是评价维度：
{"dimensions": [
    {"name": "刀片锋利度", "code": "blade_sharpness", "weight": 1.8},
    {"name": "握持手感", "weight": "1.2"},
    {"name": "性价比", "code": "value", "weight": 3}
]}"#;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start { level3: String, stage: &'static str },
    End { level3: String, stage: &'static str },
}

/// Scripted completion service.
///
/// Routes on the stage's JSON key in the prompt, answers selections with a
/// price inside the requested tier, and records call order and concurrency.
struct ScriptedService {
    latency: Duration,
    brand_for: Box<dyn Fn(&str) -> String + Send + Sync>,
    two_tiers_for: HashSet<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    events: Mutex<Vec<Event>>,
}

impl ScriptedService {
    fn new() -> Self {
        Self {
            latency: Duration::from_millis(5),
            brand_for: Box::new(|_| "吉列".to_string()),
            two_tiers_for: HashSet::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn with_brand(mut self, brand_for: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.brand_for = Box::new(brand_for);
        self
    }

    fn with_broken_price_stage(mut self, level3: &str) -> Self {
        self.two_tiers_for.insert(level3.to_string());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn reply(&self, stage: &str, level3: &str, prompt: &str) -> String {
        match stage {
            "price_ranges" if self.two_tiers_for.contains(level3) => TWO_TIER_REPLY.to_string(),
            "price_ranges" => PRICE_REPLY.to_string(),
            "dimensions" => DIMENSION_REPLY.to_string(),
            _ => {
                let caps = Regex::new(r"¥(\d+(?:\.\d+)?)-¥(\d+(?:\.\d+)?) 范围内")
                    .unwrap()
                    .captures(prompt)
                    .expect("selection prompt names the tier bounds");
                let min: f64 = caps[1].parse().unwrap();
                let max: f64 = caps[2].parse().unwrap();
                json!({
                    "productName": format!("{} 剃须刀", level3),
                    "brandName": (self.brand_for)(level3),
                    "companyName": "宝洁公司",
                    "productModel": "Mach3",
                    "price": format!("¥{}", (min + max) / 2.0),
                    "selectionReason": REASON,
                    "confidenceScore": "88",
                    "dataSources": ["京东商城用户评价", "中消协评测报告"]
                })
                .to_string()
            }
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedService {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let stage = if prompt.contains("\"price_ranges\"") {
            "price_ranges"
        } else if prompt.contains("\"dimensions\"") {
            "dimensions"
        } else {
            "product_selection"
        };
        let level3 = Regex::new(r"【([^】]+)】")
            .unwrap()
            .captures(&prompt)
            .map(|c| c[1].to_string())
            .unwrap_or_default();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Start {
            level3: level3.clone(),
            stage,
        });

        tokio::time::sleep(self.latency).await;
        let body = self.reply(stage, &level3, &prompt);

        self.events.lock().unwrap().push(Event::End {
            level3: level3.clone(),
            stage,
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(GenerationResponse {
            id: format!("call-{}", self.calls()),
            model: "deepseek-chat".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(body),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage {
                prompt_tokens: 800,
                completion_tokens: 400,
                total_tokens: 1200,
            },
        })
    }
}

fn config(dir: &tempfile::TempDir, concurrency: usize) -> PipelineConfig {
    PipelineConfig::default()
        .with_output_dir(dir.path())
        .with_concurrency(concurrency)
        .with_delays(Duration::from_millis(10), Duration::from_millis(10))
        .with_checkpoint_every(1)
        .with_retry(RetryPolicy {
            max_attempts: 1,
            base_delay_ms: 1,
        })
}

async fn run(
    config: &PipelineConfig,
    service: Arc<ScriptedService>,
    categories: &[Category],
    force: bool,
) -> (RunSummary, CheckpointStore) {
    let orchestrator = Orchestrator::from_config(config, service).unwrap();
    let store = CheckpointStore::open(&config.checkpoint.database_path)
        .await
        .unwrap();
    let tracker = ProgressTracker::open(store.clone(), &config.checkpoint, categories.len(), force)
        .await
        .unwrap();
    (orchestrator.run(categories, tracker).await, store)
}

fn shaving(level3: &str) -> Category {
    Category::new("个护健康", "剃须用品", level3)
}

#[tokio::test]
async fn test_full_grid_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, 2);
    let service = Arc::new(ScriptedService::new());
    let categories = vec![shaving("手动剃须刀")];

    let (summary, store) = run(&config, service.clone(), &categories, false).await;

    assert_eq!(summary.statistics.succeeded, 1);
    assert_eq!(summary.statistics.selections, 9);
    assert_eq!(service.calls(), 11);
    assert_eq!(summary.costs.calls, 11);
    assert!(summary.costs.product_selection > summary.costs.price_ranges);

    let stored = store
        .get_accepted("个护健康/剃须用品/手动剃须刀")
        .await
        .unwrap()
        .expect("accepted result is stored");
    assert_eq!(stored.selections.len(), 9);
    assert_eq!(stored.dimensions[1].code, "dim_2");
    assert_eq!(stored.dimensions[2].weight, 2.0);

    // Every selection is priced inside its own tier.
    for selection in &stored.selections {
        let range = stored.range_for(selection).expect("tier resolves");
        assert!(range.contains(selection.price), "{:?}", selection);
    }
    for pair in stored.price_ranges.windows(2) {
        assert!(pair[0].max < pair[1].min);
    }

    let status = product_forge::storage::read_snapshot(&config.checkpoint.status_path)
        .unwrap()
        .expect("final snapshot written");
    assert_eq!(status.completed_categories, 1);
    assert_eq!(status.best_products_count, 9);
}

#[tokio::test]
async fn test_waves_respect_limit_and_barrier() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, 3);
    let service = Arc::new(ScriptedService::new().with_latency(Duration::from_millis(20)));
    let categories = vec![shaving("手动剃须刀"), shaving("电动剃须刀")];

    let (summary, _store) = run(&config, service.clone(), &categories, false).await;
    assert_eq!(summary.statistics.succeeded, 2);

    assert_eq!(service.peak.load(Ordering::SeqCst), 3);

    let events = service.events();
    let last_end_first = events
        .iter()
        .rposition(|e| {
            matches!(e, Event::End { level3, stage: "product_selection" } if level3 == "手动剃须刀")
        })
        .unwrap();
    let first_start_second = events
        .iter()
        .position(|e| matches!(e, Event::Start { level3, .. } if level3 == "电动剃须刀"))
        .unwrap();
    assert!(
        last_end_first < first_start_second,
        "second category started before the first settled"
    );
}

#[tokio::test]
async fn test_resume_issues_no_calls_for_accepted_categories() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, 2);
    let categories = vec![shaving("手动剃须刀"), shaving("电动剃须刀")];

    let first = Arc::new(ScriptedService::new());
    let (summary, store) = run(&config, first.clone(), &categories, false).await;
    assert_eq!(summary.statistics.succeeded, 2);
    store.close().await;

    let second = Arc::new(ScriptedService::new());
    let (summary, store) = run(&config, second.clone(), &categories, false).await;
    assert_eq!(second.calls(), 0);
    assert_eq!(summary.statistics.skipped, 2);
    assert_eq!(summary.statistics.processed, 0);
    assert_eq!(store.counts().await.unwrap().accepted, 2);
    store.close().await;

    let forced = Arc::new(ScriptedService::new());
    let (summary, store) = run(&config, forced.clone(), &categories, true).await;
    assert_eq!(forced.calls(), 22);
    assert_eq!(summary.statistics.succeeded, 2);
    // Upserts keep one row per category.
    assert_eq!(store.counts().await.unwrap().accepted, 2);
}

#[tokio::test]
async fn test_stage_failure_isolated_to_its_category() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, 2);
    let service = Arc::new(ScriptedService::new().with_broken_price_stage("电动剃须刀"));
    let categories = vec![
        shaving("手动剃须刀"),
        shaving("电动剃须刀"),
        shaving("剃须泡"),
    ];

    let (summary, store) = run(&config, service.clone(), &categories, false).await;

    assert_eq!(summary.statistics.processed, 3);
    assert_eq!(summary.statistics.succeeded, 2);
    assert_eq!(summary.statistics.failed, 1);
    // The broken category stops after its single price call.
    assert_eq!(service.calls(), 11 + 1 + 11);

    let failures = store.recent_failures(10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].category_path, "个护健康/剃须用品/电动剃须刀");
    assert!(failures[0].reason.contains("price_ranges"));

    let accepted = store.accepted_paths().await.unwrap();
    assert!(accepted.contains("个护健康/剃须用品/手动剃须刀"));
    assert!(accepted.contains("个护健康/剃须用品/剃须泡"));
}

#[tokio::test]
async fn test_rejected_category_is_retried_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, 2);
    let categories = vec![shaving("手动剃须刀")];

    let placeholder = Arc::new(ScriptedService::new().with_brand(|_| "Brand-A".to_string()));
    let (summary, store) = run(&config, placeholder, &categories, false).await;
    assert_eq!(summary.statistics.failed, 1);

    let failures = store.recent_failures(1).await.unwrap();
    assert_eq!(failures[0].reason, "quality gate");
    assert!(failures[0]
        .issues
        .iter()
        .any(|issue| issue.message.contains("Brand-A")));
    store.close().await;

    let fixed = Arc::new(ScriptedService::new());
    let (summary, _store) = run(&config, fixed.clone(), &categories, false).await;
    assert_eq!(fixed.calls(), 11);
    assert_eq!(summary.statistics.succeeded, 1);
}
