//! Completion service integration.
//!
//! - [`client`]: the wire-level `LlmProvider` trait and an OpenAI-compatible
//!   HTTP implementation
//! - [`completion`]: retry, reply repair and typed decoding on top of a provider
//! - [`cost`]: token-derived cost accounting shared across a run
//!
//! ```ignore
//! use product_forge::llm::{ChatClient, CompletionClient, CostAccumulator};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(ChatClient::from_env()?);
//! let costs = Arc::new(CostAccumulator::default());
//! let client = CompletionClient::new(provider, settings, RetryPolicy::default(), costs);
//! let reply = client.complete(&spec, "个护健康/剃须用品/手动剃须刀").await?;
//! ```

pub mod client;
pub mod completion;
pub mod cost;

pub use client::{
    ChatClient, Choice, GenerationRequest, GenerationResponse, LlmProvider, Message,
    ResponseFormat, Usage,
};
pub use completion::{Completion, CompletionClient, CompletionSettings, PromptSpec, RetryPolicy};
pub use cost::{CostAccumulator, CostReport, TokenPricing};
