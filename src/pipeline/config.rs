//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is built once at startup: defaults, then an optional
//! YAML file, then `PRODUCT_FORGE_*` environment variables, then CLI flags.
//! It is validated before the run begins and shared read-only afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::brands::StaticBrandTable;
use crate::llm::client::{DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::llm::{RetryPolicy, TokenPricing};
use crate::quality::QualityThresholds;
use crate::scheduler::WaveConfig;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// The configuration file is not valid YAML for this schema.
    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Completion service settings. The API key is never part of the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub pricing: TokenPricing,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            pricing: TokenPricing::default(),
        }
    }
}

/// Fan-out and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Product selection calls in flight per wave.
    pub concurrency: usize,
    pub inter_wave_delay_ms: u64,
    /// Pause between two categories.
    pub inter_category_delay_ms: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        let waves = WaveConfig::default();
        Self {
            concurrency: waves.concurrency,
            inter_wave_delay_ms: waves.inter_wave_delay_ms,
            inter_category_delay_ms: 2000,
        }
    }
}

impl SchedulingConfig {
    pub fn wave_config(&self) -> WaveConfig {
        WaveConfig {
            concurrency: self.concurrency,
            inter_wave_delay_ms: self.inter_wave_delay_ms,
        }
    }

    pub fn inter_category_delay(&self) -> Duration {
        Duration::from_millis(self.inter_category_delay_ms)
    }
}

/// Where progress is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Write a status snapshot after this many accepted categories.
    pub checkpoint_every: usize,
    pub database_path: PathBuf,
    pub status_path: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self::in_dir(Path::new("output"))
    }
}

impl CheckpointConfig {
    /// Default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            checkpoint_every: 10,
            database_path: dir.join("checkpoint.db"),
            status_path: dir.join("progress.json"),
        }
    }
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub llm: LlmConfig,
    pub retry: RetryPolicy,
    pub scheduling: SchedulingConfig,
    pub quality: QualityThresholds,
    pub checkpoint: CheckpointConfig,
    /// Stop starting new categories once cumulative cost reaches this.
    pub budget_limit: Option<f64>,
    /// Brand table; the built-in table is used when absent.
    pub brands: Option<StaticBrandTable>,
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document. Omitted keys keep their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Defaults or `path`, then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PRODUCT_FORGE_*` variables from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `PRODUCT_FORGE_API_BASE`, `PRODUCT_FORGE_MODEL`
    /// - `PRODUCT_FORGE_TEMPERATURE`, `PRODUCT_FORGE_MAX_TOKENS`, `PRODUCT_FORGE_TIMEOUT_SECS`
    /// - `PRODUCT_FORGE_MAX_ATTEMPTS`, `PRODUCT_FORGE_RETRY_DELAY_MS`
    /// - `PRODUCT_FORGE_CONCURRENCY`, `PRODUCT_FORGE_WAVE_DELAY_MS`, `PRODUCT_FORGE_CATEGORY_DELAY_MS`
    /// - `PRODUCT_FORGE_CHECKPOINT_EVERY`, `PRODUCT_FORGE_DATABASE`, `PRODUCT_FORGE_STATUS_FILE`
    /// - `PRODUCT_FORGE_MIN_REASON_CHARS`, `PRODUCT_FORGE_BUDGET`
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("PRODUCT_FORGE_API_BASE") {
            self.llm.api_base = val;
        }
        if let Some(val) = lookup("PRODUCT_FORGE_MODEL") {
            self.llm.model = val;
        }
        if let Some(val) = lookup("PRODUCT_FORGE_TEMPERATURE") {
            self.llm.temperature = parse_env_value(&val, "PRODUCT_FORGE_TEMPERATURE")?;
        }
        if let Some(val) = lookup("PRODUCT_FORGE_MAX_TOKENS") {
            self.llm.max_tokens = parse_env_value(&val, "PRODUCT_FORGE_MAX_TOKENS")?;
        }
        if let Some(val) = lookup("PRODUCT_FORGE_TIMEOUT_SECS") {
            self.llm.request_timeout_secs = parse_env_value(&val, "PRODUCT_FORGE_TIMEOUT_SECS")?;
        }

        if let Some(val) = lookup("PRODUCT_FORGE_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_env_value(&val, "PRODUCT_FORGE_MAX_ATTEMPTS")?;
        }
        if let Some(val) = lookup("PRODUCT_FORGE_RETRY_DELAY_MS") {
            self.retry.base_delay_ms = parse_env_value(&val, "PRODUCT_FORGE_RETRY_DELAY_MS")?;
        }

        if let Some(val) = lookup("PRODUCT_FORGE_CONCURRENCY") {
            self.scheduling.concurrency = parse_env_value(&val, "PRODUCT_FORGE_CONCURRENCY")?;
        }
        if let Some(val) = lookup("PRODUCT_FORGE_WAVE_DELAY_MS") {
            self.scheduling.inter_wave_delay_ms =
                parse_env_value(&val, "PRODUCT_FORGE_WAVE_DELAY_MS")?;
        }
        if let Some(val) = lookup("PRODUCT_FORGE_CATEGORY_DELAY_MS") {
            self.scheduling.inter_category_delay_ms =
                parse_env_value(&val, "PRODUCT_FORGE_CATEGORY_DELAY_MS")?;
        }

        if let Some(val) = lookup("PRODUCT_FORGE_CHECKPOINT_EVERY") {
            self.checkpoint.checkpoint_every =
                parse_env_value(&val, "PRODUCT_FORGE_CHECKPOINT_EVERY")?;
        }
        if let Some(val) = lookup("PRODUCT_FORGE_DATABASE") {
            self.checkpoint.database_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("PRODUCT_FORGE_STATUS_FILE") {
            self.checkpoint.status_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("PRODUCT_FORGE_MIN_REASON_CHARS") {
            self.quality.min_reason_chars = parse_env_value(&val, "PRODUCT_FORGE_MIN_REASON_CHARS")?;
        }
        if let Some(val) = lookup("PRODUCT_FORGE_BUDGET") {
            self.budget_limit = Some(parse_env_value(&val, "PRODUCT_FORGE_BUDGET")?);
        }

        Ok(self)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::ValidationFailed(msg.to_string()));

        // LLM validation
        if self.llm.api_base.trim().is_empty() {
            return fail("llm.api_base cannot be empty");
        }
        if self.llm.model.trim().is_empty() {
            return fail("llm.model cannot be empty");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return fail("llm.temperature must be between 0.0 and 2.0");
        }
        if self.llm.max_tokens == 0 {
            return fail("llm.max_tokens must be greater than 0");
        }
        if self.llm.request_timeout_secs == 0 {
            return fail("llm.request_timeout_secs must be greater than 0");
        }
        if self.llm.pricing.input_per_million < 0.0 || self.llm.pricing.output_per_million < 0.0 {
            return fail("llm.pricing cannot be negative");
        }

        // Retry validation
        if self.retry.max_attempts == 0 {
            return fail("retry.max_attempts must be greater than 0");
        }

        // Scheduling validation
        if self.scheduling.concurrency == 0 {
            return fail("scheduling.concurrency must be greater than 0");
        }

        // Checkpoint validation
        if self.checkpoint.checkpoint_every == 0 {
            return fail("checkpoint.checkpoint_every must be greater than 0");
        }
        if self.checkpoint.database_path.as_os_str().is_empty() {
            return fail("checkpoint.database_path cannot be empty");
        }
        if self.checkpoint.status_path.as_os_str().is_empty() {
            return fail("checkpoint.status_path cannot be empty");
        }

        // Quality validation
        let q = &self.quality;
        if !(0.0..=1.0).contains(&q.min_real_brand_ratio) {
            return fail("quality.min_real_brand_ratio must be between 0.0 and 1.0");
        }
        if !(0.0..=100.0).contains(&q.min_confidence)
            || !(0.0..=100.0).contains(&q.max_confidence)
            || q.min_confidence > q.max_confidence
        {
            return fail("quality confidence bounds must satisfy 0 <= min <= max <= 100");
        }
        if q.min_price < 0.0 {
            return fail("quality.min_price cannot be negative");
        }
        if q.max_price_factor <= 1.0 {
            return fail("quality.max_price_factor must be greater than 1");
        }
        if !(q.max_repetition_ratio > 0.0 && q.max_repetition_ratio <= 1.0) {
            return fail("quality.max_repetition_ratio must be in (0, 1]");
        }
        for pattern in &q.generic_brand_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::ValidationFailed(format!(
                    "quality.generic_brand_patterns: invalid pattern '{}': {}",
                    pattern, e
                )));
            }
        }

        // Budget validation
        if let Some(budget) = self.budget_limit {
            if !(budget >= 0.0) {
                return fail("budget_limit cannot be negative");
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.request_timeout_secs)
    }

    /// Builder method to set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm.model = model.into();
        self
    }

    /// Builder method to set the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.llm.api_base = api_base.into();
        self
    }

    /// Builder method to set the number of calls per wave.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.scheduling.concurrency = concurrency;
        self
    }

    /// Builder method to set both pacing delays.
    pub fn with_delays(mut self, inter_wave: Duration, inter_category: Duration) -> Self {
        self.scheduling.inter_wave_delay_ms = inter_wave.as_millis() as u64;
        self.scheduling.inter_category_delay_ms = inter_category.as_millis() as u64;
        self
    }

    /// Builder method to set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder method to place the checkpoint files in `dir`.
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let every = self.checkpoint.checkpoint_every;
        self.checkpoint = CheckpointConfig::in_dir(dir.as_ref());
        self.checkpoint.checkpoint_every = every;
        self
    }

    /// Builder method to set the snapshot interval.
    pub fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint.checkpoint_every = every;
        self
    }

    /// Builder method to set the budget ceiling.
    pub fn with_budget_limit(mut self, budget: Option<f64>) -> Self {
        self.budget_limit = budget;
        self
    }

    /// Builder method to set the quality thresholds.
    pub fn with_quality(mut self, quality: QualityThresholds) -> Self {
        self.quality = quality;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
