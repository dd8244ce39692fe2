//! Retry utilities with jittered backoff, and the retrying model caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::backend::{GenerateRequest, GenerateResponse, GenerativeBackend};
use crate::config::EngineConfig;
use crate::error::{ModelError, SimError, SimResult};
use crate::keys::KeyStore;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Fixed delay before every retry.
    pub base_delay: Duration,
    /// Upper bound of the uniform random delay added to `base_delay`.
    pub jitter: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(2000),
            jitter: Duration::from_millis(2000),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the fixed and random parts of the delay.
    pub fn with_delays(mut self, base_delay: Duration, jitter: Duration) -> Self {
        self.base_delay = base_delay;
        self.jitter = jitter;
        self
    }

    /// Draw the delay for the next retry: `base + uniform(0, jitter)`.
    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base_delay;
        }
        let extra = rand::rng().random_range(0..=self.jitter.as_millis() as u64);
        self.base_delay + Duration::from_millis(extra)
    }
}

/// Execute an async operation, retrying only the failures `is_retryable` accepts.
///
/// Non-retryable errors are returned immediately without delay; retryable
/// ones are returned once `max_retries` is spent.
pub async fn retry_async<F, Fut, T, E, P>(
    config: &RetryConfig,
    is_retryable: P,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_retries && is_retryable(&e) => {
                attempt += 1;
                let delay = config.next_delay();
                warn!(
                    "{} attempt {} failed ({}), retrying in {}ms",
                    config.operation_name,
                    attempt,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                debug!(
                    "{} giving up after {} attempt(s): {}",
                    config.operation_name,
                    attempt + 1,
                    e
                );
                return Err(e);
            }
        }
    }
}

/// Wraps a [`GenerativeBackend`] with backoff and secondary-model fallback.
///
/// Every call starts with a fresh retry budget; nothing is carried between calls.
pub struct ModelCaller {
    backend: Arc<dyn GenerativeBackend>,
    keys: Arc<dyn KeyStore>,
    retry: RetryConfig,
}

impl ModelCaller {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        keys: Arc<dyn KeyStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            backend,
            keys,
            retry: RetryConfig::new("model_call")
                .with_max_retries(config.max_retries)
                .with_delays(config.backoff_base, config.backoff_jitter),
        }
    }

    /// Precondition for every stage entry point.
    pub fn require_key(&self) -> SimResult<()> {
        match self.keys.get() {
            Some(_) => Ok(()),
            None => Err(SimError::MissingApiKey),
        }
    }

    /// Call one model, absorbing transient failures up to `max_retries`.
    pub async fn call(
        &self,
        model: &str,
        request: &GenerateRequest,
        max_retries: u32,
    ) -> Result<GenerateResponse, ModelError> {
        let config = RetryConfig {
            max_retries,
            operation_name: format!("{}@{}", request.kind.as_str(), model),
            ..self.retry.clone()
        };
        retry_async(&config, ModelError::is_retryable, || {
            self.backend.generate(model, request)
        })
        .await
    }

    /// Try each model in `models` in order; the first response `interpret`
    /// accepts wins. Returns the last error when every model fails.
    pub async fn call_with_fallback<T, F>(
        &self,
        models: &[&str],
        request: &GenerateRequest,
        interpret: F,
    ) -> Result<T, ModelError>
    where
        F: Fn(GenerateResponse) -> Result<T, ModelError>,
    {
        let mut last_error = None;

        for (tier, model) in models.iter().enumerate() {
            let outcome = self
                .call(model, request, self.retry.max_retries)
                .await
                .and_then(&interpret);
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if tier + 1 < models.len() {
                        warn!(
                            kind = request.kind.as_str(),
                            "Model {} failed: {}. Falling back to {}",
                            model,
                            e,
                            models[tier + 1]
                        );
                    } else {
                        warn!(kind = request.kind.as_str(), "Model {} failed: {}", model, e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ModelError::transport("no models configured")))
    }
}
