//! Completion client: one logical call to the completion service.
//!
//! Wraps an [`LlmProvider`] with the concerns every stage needs:
//! - exponential-backoff retry on transport errors, 5xx and 429
//! - JSON extraction and repair of the reply
//! - typed decoding, where a decode failure is retried like a bad reply
//! - token-derived cost, added to the run-wide [`CostAccumulator`]
//!
//! Every outcome is a value: exhaustion returns
//! [`LlmError::RetriesExhausted`] carrying the last error message.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::client::{GenerationRequest, LlmProvider, Message, Usage};
use super::cost::CostAccumulator;
use crate::error::LlmError;
use crate::stages::Stage;
use crate::utils::json_extraction::parse_json_object;

/// Retry budget for one completion call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later one.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1500,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before attempt number `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u64.checked_shl(attempt - 2).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Sampling settings shared by every call of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// A stage-specific prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub stage: Stage,
    pub system: String,
    pub user: String,
}

impl PromptSpec {
    pub fn new(stage: Stage, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            stage,
            system: system.into(),
            user: user.into(),
        }
    }
}

/// A successful completion.
#[derive(Debug, Clone)]
pub struct Completion<T> {
    pub payload: T,
    /// Usage of the attempt that succeeded.
    pub usage: Usage,
    /// Cost of every attempt that reached the service, failed ones included.
    pub cost: f64,
    pub attempts: u32,
    pub model: String,
}

/// Retrying, repairing completion client shared by all stages.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn LlmProvider>,
    settings: CompletionSettings,
    retry: RetryPolicy,
    costs: Arc<CostAccumulator>,
}

impl CompletionClient {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        settings: CompletionSettings,
        retry: RetryPolicy,
        costs: Arc<CostAccumulator>,
    ) -> Self {
        Self {
            provider,
            settings,
            retry,
            costs,
        }
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn costs(&self) -> &Arc<CostAccumulator> {
        &self.costs
    }

    /// Run one call and return the repaired JSON object.
    pub async fn complete(
        &self,
        spec: &PromptSpec,
        context: &str,
    ) -> Result<Completion<Value>, LlmError> {
        self.complete_with(spec, context, Ok).await
    }

    /// Run one call and decode the reply into `T`.
    pub async fn complete_as<T: DeserializeOwned>(
        &self,
        spec: &PromptSpec,
        context: &str,
    ) -> Result<Completion<T>, LlmError> {
        self.complete_with(spec, context, |value| {
            serde_json::from_value(value).map_err(|e| {
                LlmError::MalformedResponse(format!("reply does not match expected shape: {}", e))
            })
        })
        .await
    }

    async fn complete_with<T, F>(
        &self,
        spec: &PromptSpec,
        context: &str,
        decode: F,
    ) -> Result<Completion<T>, LlmError>
    where
        F: Fn(Value) -> Result<T, LlmError>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut spent = 0.0;
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.retry.delay_before(attempt);
                tracing::debug!(
                    stage = %spec.stage,
                    context = context,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            let outcome = self.attempt(spec, &mut spent).await.and_then(|(value, usage, model)| {
                decode(value).map(|payload| (payload, usage, model))
            });

            match outcome {
                Ok((payload, usage, model)) => {
                    return Ok(Completion {
                        payload,
                        usage,
                        cost: spent,
                        attempts: attempt,
                        model,
                    });
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        stage = %spec.stage,
                        context = context,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %err,
                        "Completion attempt failed, will retry"
                    );
                    last_error = Some(err);
                }
                Err(err) => {
                    tracing::warn!(
                        stage = %spec.stage,
                        context = context,
                        error = %err,
                        "Completion failed with non-retryable error"
                    );
                    return Err(err);
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no error captured".to_string()),
        })
    }

    async fn attempt(
        &self,
        spec: &PromptSpec,
        spent: &mut f64,
    ) -> Result<(Value, Usage, String), LlmError> {
        let request = GenerationRequest::new(
            self.settings.model.clone(),
            vec![
                Message::system(spec.system.clone()),
                Message::user(spec.user.clone()),
            ],
        )
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens)
        .with_json_response();

        let response = self.provider.generate(request).await?;
        let model = if response.model.is_empty() {
            self.settings.model.clone()
        } else {
            response.model.clone()
        };
        *spent += self.costs.record(spec.stage, &model, &response.usage);

        let content = response
            .first_content()
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        let value =
            parse_json_object(content).map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        Ok((value, response.usage, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::{Choice, GenerationResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays scripted outcomes, one per call, and records call times.
    struct ScriptedProvider {
        script: Mutex<Vec<Result<String, LlmError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedProvider {
        fn new(mut script: Vec<Result<String, LlmError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.calls.lock().unwrap().push(Instant::now());
            let next = self
                .script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(LlmError::RequestFailed("connection refused".to_string())));
            next.map(|content| GenerationResponse {
                id: "resp".to_string(),
                model: "deepseek-chat".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage {
                    prompt_tokens: 500,
                    completion_tokens: 500,
                    total_tokens: 1000,
                },
            })
        }
    }

    fn client(provider: Arc<ScriptedProvider>, max_attempts: u32) -> CompletionClient {
        CompletionClient::new(
            provider,
            CompletionSettings {
                model: "deepseek-chat".to_string(),
                temperature: 0.7,
                max_tokens: 2000,
            },
            RetryPolicy {
                max_attempts,
                base_delay_ms: 10,
            },
            Arc::new(CostAccumulator::default()),
        )
    }

    fn spec() -> PromptSpec {
        PromptSpec::new(Stage::PriceRanges, "system", "user")
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 100,
        };
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));
        assert_eq!(policy.delay_before(4), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy {
            max_attempts: 100,
            base_delay_ms: 1000,
        };
        assert_eq!(policy.delay_before(90), Duration::from_millis(u64::MAX));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(r#"{"ok": true}"#.to_string())]));
        let client = client(provider.clone(), 3);

        let completion = client.complete(&spec(), "a/b/c").await.unwrap();
        assert_eq!(completion.payload["ok"], true);
        assert_eq!(completion.attempts, 1);
        assert!((completion.cost - 0.002).abs() < 1e-9);
        assert_eq!(client.costs().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_exhausts_budget_with_growing_delays() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let client = client(provider.clone(), 4);

        let result = client.complete(&spec(), "a/b/c").await;

        match result {
            Err(LlmError::RetriesExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 4);
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }

        let times = provider.call_times();
        assert_eq!(times.len(), 4);
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps.windows(2).all(|w| w[1] > w[0]), "gaps: {:?}", gaps);
        assert!(gaps[0] >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_retried_then_repaired() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("抱歉，我无法完成".to_string()),
            Ok("结果如下：\n```json\n{\"n\": 3}\n```".to_string()),
        ]));
        let client = client(provider.clone(), 3);

        let completion = client.complete(&spec(), "a/b/c").await.unwrap();
        assert_eq!(completion.payload["n"], 3);
        assert_eq!(completion.attempts, 2);
        // Both attempts reached the service, so both are charged.
        assert!((completion.cost - 0.004).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(LlmError::ApiError {
            code: 401,
            message: "invalid key".to_string(),
        })]));
        let client = client(provider.clone(), 3);

        let result = client.complete(&spec(), "a/b/c").await;
        assert!(matches!(result, Err(LlmError::ApiError { code: 401, .. })));
        assert_eq!(provider.call_times().len(), 1);
    }

    #[tokio::test]
    async fn test_decode_failure_counts_as_malformed() {
        #[derive(Debug, Deserialize)]
        struct Shape {
            #[allow(dead_code)]
            required: String,
        }

        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(r#"{"other": 1}"#.to_string()),
            Ok(r#"{"other": 2}"#.to_string()),
        ]));
        let client = client(provider.clone(), 2);

        let result = client.complete_as::<Shape>(&spec(), "a/b/c").await;
        match result {
            Err(LlmError::RetriesExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("expected shape"));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_content_is_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok("   ".to_string()),
            Ok(r#"{"fine": 1}"#.to_string()),
        ]));
        let client = client(provider, 3);
        let completion = client.complete(&spec(), "a/b/c").await.unwrap();
        assert_eq!(completion.attempts, 2);
    }
}
