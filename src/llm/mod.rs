//! Language-model boundary: trait, retry helper, OpenAI-compatible client

use crate::config::LlmSettings;
use crate::error::LlmError;
use async_trait::async_trait;
use std::time::Duration;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

pub mod json;
pub mod openai;

pub use json::{extract_json_object, parse_json_object};
pub use openai::OpenAiClient;

/// A chat model answering one system + user prompt pair.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Attempts and per-attempt timeout for one logical model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self { max_attempts: settings.max_attempts.max(1), timeout: settings.timeout() }
    }
}

/// Call the model until `parse` accepts an answer or the policy is spent.
///
/// Empty answers and answers rejected by `parse` count as failed attempts.
/// Errors that cannot improve on retry (missing configuration, client-side
/// HTTP errors) end the loop immediately.
pub async fn complete_with_retry<T, F>(
    model: &dyn LanguageModel,
    policy: RetryPolicy,
    system: &str,
    user: &str,
    parse: F,
) -> Result<T, LlmError>
where
    F: Fn(&str) -> Result<T, String>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = LlmError::Empty;

    for attempt in 1..=attempts {
        let outcome = match tokio::time::timeout(policy.timeout, model.complete(system, user)).await
        {
            Ok(Ok(text)) if text.trim().is_empty() => Err(LlmError::Empty),
            Ok(Ok(text)) => parse(&text).map_err(LlmError::Malformed),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(LlmError::Timeout(policy.timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    error = %err,
                    "language model attempt failed"
                );
                if !err.is_retryable() {
                    return Err(err);
                }
                last_error = err;
            }
        }
    }

    Err(last_error)
}
