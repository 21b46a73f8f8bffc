//! Quota-aware generation client.
//!
//! Wraps one [`GenerationTransport`] with a shared [`RequestLimiter`] and a
//! bounded retry ladder. Token and retry accounting is returned to the
//! caller in [`Generation`] so each pipeline step can attribute its own cost.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{GenAiError, GenAiResult};
use crate::limiter::RequestLimiter;
use crate::transport::GenerationTransport;
use crate::types::{Content, GenerationConfig, UsageMetadata};

/// Retry and throttling policy.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    /// Total transport attempts per call, including the first.
    pub max_attempts: u32,
    /// Sleep between limiter checks when the bucket is empty.
    pub throttle_backoff: Duration,
    /// Sleep between failed attempts.
    pub cooldown: Duration,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            throttle_backoff: Duration::from_secs(5),
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    /// Usage summed over every attempt that reached the model.
    pub usage: UsageMetadata,
    /// Attempts made, `1` when the first call succeeded.
    pub attempts: u32,
}

impl Generation {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// A model handle with rate limiting and retries.
#[derive(Clone)]
pub struct QuotaAwareModel {
    model: String,
    base: Arc<GenerationConfig>,
    transport: Arc<dyn GenerationTransport>,
    limiter: Arc<dyn RequestLimiter>,
    policy: QuotaPolicy,
}

impl std::fmt::Debug for QuotaAwareModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaAwareModel")
            .field("model", &self.model)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl QuotaAwareModel {
    pub fn new(
        model: impl Into<String>,
        base: GenerationConfig,
        transport: Arc<dyn GenerationTransport>,
        limiter: Arc<dyn RequestLimiter>,
    ) -> Self {
        Self {
            model: model.into(),
            base: Arc::new(base),
            transport,
            limiter,
            policy: QuotaPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: QuotaPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_config(&self) -> &GenerationConfig {
        &self.base
    }

    /// Generate text, waiting for quota and retrying transient failures.
    ///
    /// An empty response counts as a transient failure. Cancelling `cancel`
    /// interrupts throttle waits and cooldowns and stops further attempts,
    /// but not an in-flight request.
    pub async fn generate(
        &self,
        system_instruction: Option<&str>,
        contents: &[Content],
        schema: Option<Value>,
        cancel: &CancellationToken,
    ) -> GenAiResult<Generation> {
        let config = self.base.with_overrides(system_instruction, schema);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut usage = UsageMetadata::default();
        let mut last_error: Option<GenAiError> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                sleep_or_cancel(self.policy.cooldown, cancel).await?;
            }
            self.acquire(cancel).await?;

            match self.transport.generate(&self.model, contents, &config).await {
                Ok(response) => {
                    usage.add(response.usage_metadata);
                    let text = response.text();
                    if !text.is_empty() {
                        return Ok(Generation { text, usage, attempts: attempt });
                    }
                    warn!(model = %self.model, attempt, "Empty response from model");
                    last_error = None;
                }
                Err(e) if e.is_retryable() => {
                    warn!(model = %self.model, attempt, error = %e, "Generation attempt failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(match last_error {
            Some(e) => GenAiError::RetriesExhausted {
                attempts: max_attempts,
                last_error: e.to_string(),
            },
            None => GenAiError::NoOutput { attempts: max_attempts },
        })
    }

    async fn acquire(&self, cancel: &CancellationToken) -> GenAiResult<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(GenAiError::Cancelled);
            }
            if self.limiter.try_acquire().await {
                return Ok(());
            }
            debug!(model = %self.model, "Rate limit reached, backing off");
            sleep_or_cancel(self.policy.throttle_backoff, cancel).await?;
        }
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> GenAiResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GenAiError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
