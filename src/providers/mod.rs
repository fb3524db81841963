/*!
 * Provider implementations for different LLM services.
 *
 * This module contains client implementations for:
 * - Ollama: Local LLM server
 * - OpenAI: OpenAI API and OpenAI-compatible servers such as LM Studio
 * - Anthropic: Anthropic Messages API
 * - Mock: scripted provider for tests
 */

use async_trait::async_trait;
use log::warn;
use std::fmt::Debug;

use crate::app_config::TranslationProvider;
use crate::errors::ProviderError;

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably in the translation service.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// A model id with the provider that serves it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownModel {
    pub provider: TranslationProvider,
    pub id: &'static str,
    pub description: &'static str,
}

const KNOWN_MODELS: &[KnownModel] = &[
    KnownModel { provider: TranslationProvider::OpenAI, id: "gpt-4o", description: "128k context" },
    KnownModel { provider: TranslationProvider::OpenAI, id: "gpt-4o-mini", description: "128k context, low cost" },
    KnownModel { provider: TranslationProvider::OpenAI, id: "gpt-4-turbo", description: "128k context" },
    KnownModel { provider: TranslationProvider::OpenAI, id: "gpt-4", description: "32k context" },
    KnownModel { provider: TranslationProvider::OpenAI, id: "gpt-3.5-turbo", description: "16k context" },
    KnownModel { provider: TranslationProvider::Anthropic, id: "claude-3-5-sonnet-20241022", description: "200k context" },
    KnownModel { provider: TranslationProvider::Anthropic, id: "claude-3-5-haiku-20241022", description: "200k context, fast" },
    KnownModel { provider: TranslationProvider::Anthropic, id: "claude-3-opus-20240229", description: "200k context" },
    KnownModel { provider: TranslationProvider::Ollama, id: "llama3.1", description: "local, 8k default window" },
    KnownModel { provider: TranslationProvider::Ollama, id: "mistral", description: "local" },
    KnownModel { provider: TranslationProvider::Ollama, id: "qwen2.5", description: "local" },
];

/// Models listed by the `models` command
pub fn known_models() -> &'static [KnownModel] {
    KNOWN_MODELS
}

/// Model id prefixes each hosted provider is expected to serve
fn expected_prefixes(provider: TranslationProvider) -> &'static [&'static str] {
    match provider {
        TranslationProvider::OpenAI => &["gpt-", "o1", "o3", "o4", "chatgpt-"],
        TranslationProvider::Anthropic => &["claude-"],
        // Local servers run whatever the user pulled
        TranslationProvider::Ollama | TranslationProvider::LMStudio => &[],
    }
}

/// Warn when a model id does not look like one the provider serves.
/// Returns false in that case; unknown models are still allowed.
pub fn validate_model_name(provider: TranslationProvider, model: &str) -> bool {
    let prefixes = expected_prefixes(provider);
    if prefixes.is_empty() || prefixes.iter().any(|p| model.to_lowercase().starts_with(p)) {
        return true;
    }

    warn!(
        "Model '{}' is not a known {} model, continuing anyway",
        model,
        provider.display_name()
    );
    false
}

/// Join an API path onto a base endpoint, keeping any path prefix of the base
pub(crate) fn endpoint_url(base: &str, path: &str) -> Result<url::Url, ProviderError> {
    let base = format!("{}/", base.trim_end_matches('/'));
    url::Url::parse(&base)
        .and_then(|url| url.join(path.trim_start_matches('/')))
        .map_err(|e| ProviderError::ConnectionError(format!("Invalid endpoint '{}': {}", base, e)))
}

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;
