//! Run orchestration for product recommendation generation.
//!
//! # Architecture
//!
//! - **Config**: the immutable [`PipelineConfig`] built at startup
//! - **Orchestrator**: drives one category end-to-end and loops over the catalog
//! - **Progress**: persists outcomes, skips finished categories, writes checkpoints
//!
//! # Pipeline Flow
//!
//! 1. **Price tiers**: exactly three non-overlapping ranges
//! 2. **Dimensions**: three to eight category-specific comparison axes
//! 3. **Selection**: one product per (tier, dimension) pair, fanned out in waves
//! 4. **Quality gate**: all five rule families must pass
//! 5. **Storage**: accepted results are upserted, rejected ones logged for audit
//!
//! # Example
//!
//! ```rust,ignore
//! use product_forge::pipeline::{Orchestrator, PipelineConfig, ProgressTracker};
//! use product_forge::storage::CheckpointStore;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::load(None)?;
//! let provider = Arc::new(ChatClient::from_env()?);
//! let orchestrator = Orchestrator::from_config(&config, provider)?;
//!
//! let store = CheckpointStore::open(&config.checkpoint.database_path).await?;
//! let tracker = ProgressTracker::open(store, &config.checkpoint, categories.len(), false).await?;
//! let summary = orchestrator.run(&categories, tracker).await;
//! println!("accepted {} categories", summary.statistics.succeeded);
//! ```

pub mod config;
pub mod orchestrator;
pub mod progress;

// Re-export main types for convenience
pub use config::{CheckpointConfig, ConfigError, LlmConfig, PipelineConfig, SchedulingConfig};
pub use orchestrator::{CategoryOutcome, Orchestrator, PipelineError, RunSummary, StopReason};
pub use progress::{ProgressTracker, RunStatistics};
