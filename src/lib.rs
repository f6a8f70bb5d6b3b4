//! product-forge: best-product recommendation generator with a hard quality gate.
//!
//! This library drives a completion service through staged prompts for every
//! category of a product catalog, validates each assembled result, and
//! checkpoints accepted and rejected categories so runs can resume.

// Core modules
pub mod brands;
pub mod catalog;
pub mod cli;
pub mod error;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod quality;
pub mod scheduler;
pub mod stages;
pub mod storage;
pub mod utils;

// Re-export commonly used error types
pub use error::{CatalogError, LlmError, PersistenceError, StageError};
