//! Error types for product-forge operations.
//!
//! Defines error types for the major subsystems:
//! - Completion service interactions
//! - Stage generation (price ranges, dimensions, product selection)
//! - Catalog loading
//! - Checkpoint persistence

use thiserror::Error;

use crate::stages::Stage;

/// Errors that can occur while talking to the completion service.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Missing API key: PRODUCT_FORGE_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Response carried no content")]
    EmptyResponse,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Network failures, 5xx, 429 and unparseable replies are retried.
    /// Credential problems and other 4xx responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RequestFailed(_) => true,
            LlmError::RateLimited(_) => true,
            LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
            LlmError::ParseError(_) => true,
            LlmError::EmptyResponse => true,
            LlmError::MalformedResponse(_) => true,
            LlmError::MissingApiKey => false,
            LlmError::RetriesExhausted { .. } => false,
        }
    }
}

/// Errors raised by a single generation stage.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("{stage} stage failed: {source}")]
    Completion {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    #[error("{stage} stage returned invalid output: {reason}")]
    InvalidOutput { stage: Stage, reason: String },
}

impl StageError {
    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Completion { stage, .. } | StageError::InvalidOutput { stage, .. } => {
                *stage
            }
        }
    }

    pub(crate) fn invalid(stage: Stage, reason: impl Into<String>) -> Self {
        StageError::InvalidOutput {
            stage,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while loading the category catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog contains no categories")]
    Empty,

    #[error("Invalid category entry: {0}")]
    InvalidEntry(String),
}

/// Errors that can occur while reading or writing checkpoints.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to replace status snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Record migration failed: {0}")]
    Migration(String),
}
