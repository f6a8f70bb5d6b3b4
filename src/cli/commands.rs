//! CLI command definitions for product-forge.
//!
//! - `run`: generate and gate recommendations for a catalog
//! - `check`: re-run the quality gate over every stored result
//! - `status`: print the last status snapshot and store counts
//! - `import`: load legacy result files into the checkpoint store

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::brands::BrandAuthority;
use crate::catalog::load_catalog;
use crate::llm::ChatClient;
use crate::pipeline::{Orchestrator, PipelineConfig, ProgressTracker, RunSummary};
use crate::quality::{QualityReport, QualityValidator};
use crate::storage::{
    read_snapshot, upgrade_record, CheckpointStore, FailedAttempt, StatusSnapshot, StoreCounts,
};

/// Default file name of the batch quality report.
const DEFAULT_REPORT_NAME: &str = "quality-report.json";

/// Best-product recommendation generator with a hard quality gate.
#[derive(Parser)]
#[command(name = "product-forge")]
#[command(about = "Generate and validate best-product recommendations for a category catalog")]
#[command(version)]
#[command(
    long_about = "product-forge drives a completion service through price-tier, dimension and product-selection prompts for every catalog category, then admits each category only if the whole result passes the quality gate.\n\nExample usage:\n  product-forge run --catalog catalog.json --out-dir ./output --concurrency 2"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Process a catalog, resuming from the checkpoint store.
    Run(RunArgs),

    /// Re-validate every stored accepted result and write a quality report.
    Check(CheckArgs),

    /// Show run progress from the status snapshot and the checkpoint store.
    Status(StatusArgs),

    /// Import legacy JSON results through the record migration.
    Import(ImportArgs),
}

/// Options shared by every command that touches the checkpoint files.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// YAML configuration file.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Directory holding checkpoint.db and progress.json. Overrides the config.
    #[arg(short = 'o', long)]
    pub out_dir: Option<PathBuf>,
}

/// Arguments for `product-forge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Catalog JSON file (nested level1 -> level2 -> [level3] or flat list).
    #[arg(long)]
    pub catalog: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Regenerate categories that were already accepted.
    #[arg(long)]
    pub force: bool,

    /// Stop after this many categories went through generation.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Model name for the completion service.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long)]
    pub api_base: Option<String>,

    /// API key for the completion service.
    #[arg(long, env = "PRODUCT_FORGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Product selection calls in flight per wave.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Stop starting new categories once this cost is reached.
    #[arg(long)]
    pub budget: Option<f64>,

    /// Output JSON to stdout instead of a text summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `product-forge check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Where to write the report. Defaults to quality-report.json next to the store.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Output JSON to stdout instead of a text summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `product-forge status`.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Number of recent failures to list.
    #[arg(long, default_value = "5")]
    pub failures: u32,

    /// Output JSON to stdout instead of a text summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `product-forge import`.
#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Legacy results file: an array of records or an object keyed by path.
    pub input: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Store records without running the quality gate.
    #[arg(long)]
    pub no_gate: bool,

    /// Output JSON to stdout instead of a text summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_generation_command(args).await,
        Commands::Check(args) => run_check_command(args).await,
        Commands::Status(args) => run_status_command(args).await,
        Commands::Import(args) => run_import_command(args).await,
    }
}

fn load_config(args: &StoreArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::load(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Invalid configuration from environment".to_string(),
    })?;
    if let Some(dir) = &args.out_dir {
        config = config.with_output_dir(dir);
    }
    Ok(config)
}

fn build_validator(config: &PipelineConfig) -> anyhow::Result<QualityValidator> {
    let authority: Arc<dyn BrandAuthority> = Arc::new(config.brands.clone().unwrap_or_default());
    QualityValidator::new(config.quality.clone(), authority)
        .context("Invalid generic brand pattern")
}

async fn open_store(config: &PipelineConfig) -> anyhow::Result<CheckpointStore> {
    let path = &config.checkpoint.database_path;
    CheckpointStore::open(path)
        .await
        .with_context(|| format!("Failed to open checkpoint store {}", path.display()))
}

// ============================================================================
// run
// ============================================================================

async fn run_generation_command(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.store)?;
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    if let Some(api_base) = args.api_base {
        config = config.with_api_base(api_base);
    }
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if args.budget.is_some() {
        config = config.with_budget_limit(args.budget);
    }
    config.validate()?;

    let categories = load_catalog(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;

    let api_key = args.api_key.ok_or_else(|| {
        anyhow::anyhow!("Missing API key. Provide --api-key or set PRODUCT_FORGE_API_KEY.")
    })?;
    let provider = ChatClient::new(
        config.llm.api_base.clone(),
        api_key,
        config.llm.model.clone(),
        config.request_timeout(),
    )?;
    info!(
        api_base = %provider.api_base(),
        model = %provider.default_model(),
        api_key = %provider.api_key_masked(),
        "Using completion service"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the current category");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let orchestrator = Orchestrator::from_config(&config, Arc::new(provider))?
        .with_limit(args.limit)
        .with_stop_flag(stop);

    let store = open_store(&config).await?;
    let tracker = ProgressTracker::open(store.clone(), &config.checkpoint, categories.len(), args.force)
        .await
        .context("Failed to read prior results")?;

    let summary = orchestrator.run(&categories, tracker).await;
    store.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_run_summary(&summary, &config);
    }
    Ok(())
}

fn print_run_summary(summary: &RunSummary, config: &PipelineConfig) {
    let stats = &summary.statistics;
    println!("✓ Run {} ({})", summary.run_id, summary.stop_reason);
    println!("  Accepted:    {}", stats.succeeded);
    println!("  Rejected:    {}", stats.failed);
    println!("  Skipped:     {}", stats.skipped);
    println!("  Selections:  {}", stats.selections);
    println!("  Pass rate:   {:.1}%", stats.pass_rate);
    println!(
        "  Cost:        {:.4} (price ranges {:.4}, dimensions {:.4}, selection {:.4})",
        summary.costs.total,
        summary.costs.price_ranges,
        summary.costs.dimensions,
        summary.costs.product_selection
    );
    println!("  Calls:       {}", summary.costs.calls);
    println!("  Duration:    {:.1}s", summary.duration_secs);
    println!("  Throughput:  {:.1} categories/hour", summary.throughput);
    println!("  Store:       {}", config.checkpoint.database_path.display());
}

// ============================================================================
// check
// ============================================================================

async fn run_check_command(args: CheckArgs) -> anyhow::Result<()> {
    let config = load_config(&args.store)?;
    let validator = build_validator(&config)?;

    let store = open_store(&config).await?;
    let results = store
        .load_accepted()
        .await
        .context("Failed to load accepted results")?;
    store.close().await;

    let report = QualityReport::build(&validator, &results);

    let report_path = args.report.unwrap_or_else(|| default_report_path(&config));
    write_json(&report_path, &report)?;
    info!(
        path = %report_path.display(),
        total = report.summary.total_categories,
        failed = report.summary.failed,
        "Quality report written"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Quality check of {} categories", report.summary.total_categories);
    println!("  Passed:    {}", report.summary.passed);
    println!("  Failed:    {}", report.summary.failed);
    println!("  Pass rate: {:.1}%", report.summary.pass_rate);
    for failure in report.failures() {
        println!("  ✗ {}", failure.category);
        for issue in &failure.issues {
            println!("      {}", issue);
        }
    }
    println!("  Report:    {}", report_path.display());
    Ok(())
}

fn default_report_path(config: &PipelineConfig) -> PathBuf {
    config
        .checkpoint
        .database_path
        .parent()
        .map(|dir| dir.join(DEFAULT_REPORT_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_NAME))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

// ============================================================================
// status
// ============================================================================

#[derive(Debug, Serialize)]
struct StatusOutput {
    snapshot: Option<StatusSnapshot>,
    counts: Option<StoreCounts>,
    recent_failures: Vec<FailedAttempt>,
}

async fn run_status_command(args: StatusArgs) -> anyhow::Result<()> {
    let config = load_config(&args.store)?;
    let snapshot = read_snapshot(&config.checkpoint.status_path)
        .with_context(|| format!("Failed to read {}", config.checkpoint.status_path.display()))?;

    let (counts, recent_failures) = if config.checkpoint.database_path.exists() {
        let store = open_store(&config).await?;
        let counts = store.counts().await?;
        let failures = store.recent_failures(args.failures).await?;
        store.close().await;
        (Some(counts), failures)
    } else {
        (None, Vec::new())
    };

    let output = StatusOutput {
        snapshot,
        counts,
        recent_failures,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match &output.snapshot {
        Some(s) => {
            let pct = if s.total_categories > 0 {
                s.completed_categories as f64 * 100.0 / s.total_categories as f64
            } else {
                0.0
            };
            println!("Run {} (updated {})", s.run_id, s.last_updated.to_rfc3339());
            println!(
                "  Progress:   {}/{} ({:.1}%)",
                s.completed_categories, s.total_categories, pct
            );
            println!("  Failed:     {}", s.failed_categories);
            println!("  Products:   {}", s.best_products_count);
            println!("  Pass rate:  {:.1}%", s.pass_rate);
            println!("  Cost:       {:.4}", s.total_cost);
            println!("  Throughput: {:.1} categories/hour", s.throughput);
            if let Some(eta) = s.eta_seconds {
                println!("  ETA:        {}m {}s", eta / 60, eta % 60);
            }
        }
        None => println!("No status snapshot at {}", config.checkpoint.status_path.display()),
    }

    match &output.counts {
        Some(c) => {
            println!("Store {}", config.checkpoint.database_path.display());
            println!("  Accepted categories: {}", c.accepted);
            println!("  Selections:          {}", c.selections);
            println!("  Failed attempts:     {}", c.failed_attempts);
            println!("  Accepted cost:       {:.4}", c.accepted_cost);
        }
        None => println!("No checkpoint store at {}", config.checkpoint.database_path.display()),
    }

    for failure in &output.recent_failures {
        println!(
            "  ✗ {} [{}] {}",
            failure.category_path,
            failure.failed_at.to_rfc3339(),
            failure.reason
        );
    }
    Ok(())
}

// ============================================================================
// import
// ============================================================================

/// Counts of one import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
    /// Records that could not be upgraded to the current layout.
    pub invalid: usize,
    /// Records that failed the quality gate; they go to the failure log.
    pub rejected: usize,
}

/// Split a legacy document into individual records.
///
/// Accepts an array of records, a single record, or an object whose values
/// are records (keyed by category path).
fn legacy_records(document: Value) -> Vec<Value> {
    match document {
        Value::Array(items) => items,
        Value::Object(map)
            if ["category", "level1", "schema_version"]
                .iter()
                .any(|key| map.contains_key(*key)) =>
        {
            vec![Value::Object(map)]
        }
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        _ => Vec::new(),
    }
}

async fn import_records(
    store: &CheckpointStore,
    records: Vec<Value>,
    gate: Option<&QualityValidator>,
) -> anyhow::Result<ImportOutcome> {
    let mut outcome = ImportOutcome::default();
    for (index, record) in records.into_iter().enumerate() {
        let result = match upgrade_record(record) {
            Ok(result) => result,
            Err(e) => {
                warn!(record = index, error = %e, "Skipping unreadable record");
                outcome.invalid += 1;
                continue;
            }
        };

        if let Some(validator) = gate {
            let verdict = validator.validate(&result);
            if !verdict.is_valid {
                warn!(
                    category = %result.category,
                    issues = verdict.issues.len(),
                    "Imported record fails the quality gate"
                );
                store
                    .append_failure(&result, &verdict.issues, "import gate")
                    .await?;
                outcome.rejected += 1;
                continue;
            }
        }

        store.upsert_accepted(&result).await?;
        outcome.imported += 1;
    }
    Ok(outcome)
}

async fn run_import_command(args: ImportArgs) -> anyhow::Result<()> {
    let config = load_config(&args.store)?;
    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", args.input.display()))?;

    let validator = if args.no_gate {
        warn!("Importing without the quality gate");
        None
    } else {
        Some(build_validator(&config)?)
    };

    let store = open_store(&config).await?;
    let outcome = import_records(&store, legacy_records(document), validator.as_ref()).await?;
    store.close().await;

    info!(
        imported = outcome.imported,
        invalid = outcome.invalid,
        rejected = outcome.rejected,
        "Import finished"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("✓ Imported {} records", outcome.imported);
        println!("  Unreadable: {}", outcome.invalid);
        if !args.no_gate {
            println!("  Rejected:   {}", outcome.rejected);
        }
        println!("  Store:      {}", config.checkpoint.database_path.display());
    }
    Ok(())
}
