use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Provider, endpoint_url};
use crate::errors::ProviderError;

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
}

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user or assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    /// Context window the server allocates for the request
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    stream: bool,
}

/// Chat response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(default)]
    pub eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

impl ChatRequest {
    /// Create a new non-streaming chat request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            options: None,
            stream: false,
        }
    }

    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_predict = Some(max_tokens);
        self
    }

    pub fn context_window(mut self, num_ctx: u32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_ctx = Some(num_ctx);
        self
    }
}

impl Ollama {
    /// Create a client for the server at `base_url`
    ///
    /// Ollama speaks HTTP/1.1; connections are kept alive so parallel workers reuse them.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::builder()
                .timeout(timeout)
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Server version, used as a cheap reachability probe
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = endpoint_url(&self.base_url, "api/version")?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let version: VersionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        Ok(version.version)
    }
}

#[async_trait]
impl Provider for Ollama {
    type Request = ChatRequest;
    type Response = ChatResponse;

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = endpoint_url(&self.base_url, "api/chat")?;
        let response = self.client.post(url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Ollama API error ({}): {}", status, body);
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Ollama response: {}", e)))?;
        debug!(
            "Ollama {} answered ({:?} prompt / {:?} eval tokens)",
            chat.model, chat.prompt_eval_count, chat.eval_count
        );
        Ok(chat)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let version = self.version().await?;
        debug!("Connected to Ollama {}", version);
        Ok(())
    }

    fn extract_text(response: &ChatResponse) -> String {
        response.message.content.clone()
    }
}
