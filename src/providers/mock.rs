/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Always succeeds with translated text
 * - `MockProvider::intermittent(n)` - Every n-th request fails
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::fail_when_contains(s)` - Fails for texts containing `s`
 *
 * The mock implements both `Provider` and `TranslationPort`, so it can stand
 * in for a whole `TranslationService` inside workers.
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::{ProviderError, TranslationError};
use crate::providers::Provider;
use crate::translation::TranslationPort;

/// Mock request for testing
#[derive(Debug, Clone)]
pub struct MockRequest {
    /// The text to translate
    pub text: String,
    /// Fragment context
    pub context: String,
}

/// Mock response for testing
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// The translated text
    pub text: String,
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Fails for any text containing the marker
    FailWhenContains(&'static str),
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Simulates slow response
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    model: String,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            model: "mock-model".to_string(),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn fail_when_contains(marker: &'static str) -> Self {
        Self::new(MockBehavior::FailWhenContains(marker))
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Deterministic "translation" of a text
    pub fn translated(text: &str) -> String {
        format!("[TRANSLATED] {}", text)
    }

    async fn respond(&self, request: &MockRequest) -> Result<MockResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;

        match self.behavior {
            MockBehavior::Working => {}
            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && count % fail_every == 0 {
                    return Err(ProviderError::ConnectionError(format!("Simulated failure on request {}", count)));
                }
            }
            MockBehavior::FailWhenContains(marker) => {
                if request.text.contains(marker) {
                    return Err(ProviderError::ApiError {
                        status_code: 500,
                        message: format!("Simulated failure for text containing '{}'", marker),
                    });
                }
            }
            MockBehavior::Failing => {
                return Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "Simulated provider failure".to_string(),
                });
            }
            MockBehavior::Empty => {
                return Ok(MockResponse { text: String::new() });
            }
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }

        Ok(MockResponse {
            text: Self::translated(&request.text),
        })
    }
}

#[async_trait]
impl Provider for MockProvider {
    type Request = MockRequest;
    type Response = MockResponse;

    async fn complete(&self, request: MockRequest) -> Result<MockResponse, ProviderError> {
        self.respond(&request).await
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated connection failure".to_string())),
            _ => Ok(()),
        }
    }

    fn extract_text(response: &MockResponse) -> String {
        response.text.clone()
    }
}

#[async_trait]
impl TranslationPort for MockProvider {
    async fn translate(&self, text: &str, context: &str) -> Result<String, TranslationError> {
        let request = MockRequest {
            text: text.to_string(),
            context: context.to_string(),
        };
        let response = self.respond(&request).await?;
        if response.text.is_empty() {
            return Err(TranslationError::EmptyResponse);
        }
        Ok(response.text)
    }

    async fn test_connection(&self) -> Result<(), TranslationError> {
        Provider::test_connection(self).await.map_err(TranslationError::from)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
