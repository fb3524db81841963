/*!
 * Provider-backed translation service.
 *
 * `TranslationService` owns one provider client and implements
 * `TranslationPort` on top of it: prompt construction, bounded exponential
 * backoff with jitter, and classification of permanent errors.
 */

use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use url::Url;

use super::TranslationPort;
use super::prompts::PromptBuilder;
use crate::app_config::{TranslationConfig, TranslationProvider as ConfigTranslationProvider};
use crate::errors::{ProviderError, TranslationError};
use crate::providers::Provider;
use crate::providers::anthropic::{Anthropic, AnthropicRequest};
use crate::providers::ollama::{ChatRequest, Ollama};
use crate::providers::openai::{OpenAI, OpenAIRequest};

const CONNECTION_TEST_PROMPT: &str = "Test connection. Please respond with 'OK'.";
const CONNECTION_TEST_MAX_TOKENS: u32 = 10;

/// LM Studio ignores the key but some builds reject an empty bearer token
const LMSTUDIO_PLACEHOLDER_KEY: &str = "lm-studio";

/// Translation provider implementation variants
#[derive(Debug)]
enum TranslationProviderImpl {
    Ollama { client: Ollama },
    OpenAI { client: OpenAI },
    /// LM Studio local server (OpenAI-compatible)
    LMStudio { client: OpenAI },
    Anthropic { client: Anthropic },
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_retries: config.common.retry_count,
            base_backoff: Duration::from_millis(config.common.retry_backoff_ms),
            max_backoff: Duration::from_millis(config.common.retry_max_backoff_ms),
        }
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`
    /// plus up to a quarter of random jitter, capped at `max_backoff`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_backoff.saturating_mul(1u32 << exponent);
        let jitter_ms = (delay.as_millis() / 4) as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        (delay + jitter).min(self.max_backoff)
    }
}

/// Run `op` until it yields non-empty text, a permanent error, or the policy runs out
pub async fn with_retries<F, Fut>(policy: RetryPolicy, mut op: F) -> Result<String, TranslationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ProviderError>>,
{
    let attempts = policy.max_retries + 1;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match op().await {
            Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
            Ok(_) => {
                last_error = TranslationError::EmptyResponse.to_string();
                warn!("Attempt {}/{}: empty response", attempt, attempts);
            }
            Err(e) if !e.is_retryable() => {
                warn!("Attempt {}/{} failed permanently: {}", attempt, attempts, e);
                return Err(e.into());
            }
            Err(e) => {
                warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = e.to_string();
            }
        }

        if attempt < attempts {
            let delay = policy.backoff(attempt);
            debug!("Retrying in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    Err(TranslationError::RetriesExhausted { attempts, last_error })
}

/// Main translation service, one instance per worker
#[derive(Debug)]
pub struct TranslationService {
    provider: TranslationProviderImpl,
    model: String,
    prompts: PromptBuilder,
    retry: RetryPolicy,
    temperature: f32,
    max_tokens: u32,
}

impl TranslationService {
    /// Create a new translation service for the active provider in `config`
    pub fn new(config: &TranslationConfig, target_language: &str) -> Result<Self, TranslationError> {
        let model = config.get_model();
        let endpoint = config.get_endpoint();
        let api_key = config.get_api_key();
        let timeout = config.get_timeout();

        Url::parse(&endpoint)
            .map_err(|e| TranslationError::Configuration(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
        if config.provider.requires_api_key() && api_key.is_empty() {
            return Err(TranslationError::Configuration(format!(
                "{} requires an API key",
                config.provider.display_name()
            )));
        }

        let provider = match config.provider {
            ConfigTranslationProvider::Ollama => TranslationProviderImpl::Ollama {
                client: Ollama::new(endpoint, timeout),
            },
            ConfigTranslationProvider::OpenAI => TranslationProviderImpl::OpenAI {
                client: OpenAI::new(api_key, endpoint, model.clone(), timeout),
            },
            ConfigTranslationProvider::LMStudio => {
                let api_key = if api_key.is_empty() {
                    LMSTUDIO_PLACEHOLDER_KEY.to_string()
                } else {
                    api_key
                };
                TranslationProviderImpl::LMStudio {
                    client: OpenAI::new(api_key, endpoint, model.clone(), timeout),
                }
            }
            ConfigTranslationProvider::Anthropic => TranslationProviderImpl::Anthropic {
                client: Anthropic::new(api_key, endpoint, model.clone(), timeout),
            },
        };

        let prompts = PromptBuilder::new(target_language)
            .with_context(config.common.context.clone())
            .with_custom_instructions(config.common.custom_instructions.clone());

        Ok(Self {
            provider,
            model,
            prompts,
            retry: RetryPolicy::from_config(config),
            temperature: config.common.temperature,
            max_tokens: config.common.max_tokens,
        })
    }

    /// One request, no retries
    async fn complete_once(&self, system_prompt: &str, text: &str, max_tokens: u32) -> Result<String, ProviderError> {
        match &self.provider {
            TranslationProviderImpl::Ollama { client } => {
                let request = ChatRequest::new(&self.model)
                    .add_message("system", system_prompt)
                    .add_message("user", text)
                    .temperature(self.temperature)
                    .max_tokens(max_tokens);
                let response = client.complete(request).await?;
                Ok(Ollama::extract_text(&response))
            }
            TranslationProviderImpl::OpenAI { client } | TranslationProviderImpl::LMStudio { client } => {
                let request = OpenAIRequest::new(&self.model)
                    .add_message("system", system_prompt)
                    .add_message("user", text)
                    .temperature(self.temperature)
                    .max_tokens(max_tokens);
                let response = client.complete(request).await?;
                Ok(OpenAI::extract_text(&response))
            }
            TranslationProviderImpl::Anthropic { client } => {
                let request = AnthropicRequest::new(&self.model, max_tokens)
                    .system(system_prompt)
                    .add_message("user", text)
                    .temperature(self.temperature);
                let response = client.complete(request).await?;
                Ok(Anthropic::extract_text(&response))
            }
        }
    }
}

#[async_trait]
impl TranslationPort for TranslationService {
    async fn translate(&self, text: &str, context: &str) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let system_prompt = self.prompts.system_prompt(context);
        let started = Instant::now();
        let translated = with_retries(self.retry, || self.complete_once(&system_prompt, text, self.max_tokens)).await?;

        debug!(
            "Translated {} chars into {} chars in {:?}",
            text.chars().count(),
            translated.chars().count(),
            started.elapsed()
        );
        Ok(translated)
    }

    async fn test_connection(&self) -> Result<(), TranslationError> {
        let reply = self
            .complete_once(
                "You are a helpful assistant.",
                CONNECTION_TEST_PROMPT,
                CONNECTION_TEST_MAX_TOKENS,
            )
            .await?;

        if reply.trim().is_empty() {
            return Err(TranslationError::EmptyResponse);
        }
        debug!("Connection test reply from {}: {}", self.model, reply.trim());
        Ok(())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
