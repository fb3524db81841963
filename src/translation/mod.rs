/*!
 * Translation of text fragments through an LLM provider.
 *
 * - `prompts`: system prompt construction
 * - `service`: provider-backed `TranslationService` with retries
 *
 * Workers only see the `TranslationPort` trait, so tests can swap the
 * network-bound service for a scripted port.
 */

use async_trait::async_trait;

use crate::errors::TranslationError;

pub mod prompts;
pub mod service;

pub use self::prompts::PromptBuilder;
pub use self::service::TranslationService;

/// Translates one fragment of text
#[async_trait]
pub trait TranslationPort: Send + Sync {
    /// Translate `text`; `context` is extra background for this fragment only.
    /// Implementations retry transient failures themselves.
    async fn translate(&self, text: &str, context: &str) -> Result<String, TranslationError>;

    /// Cheap round trip proving the backend answers
    async fn test_connection(&self) -> Result<(), TranslationError>;

    /// Model identifier used for chunk planning and progress matching
    fn model_id(&self) -> &str;
}
