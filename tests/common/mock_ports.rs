/*!
 * Scripted translation ports for testing
 *
 * `ScriptedPort` records every text it receives and can be told to fail on
 * specific inputs, so tests can check exactly which fragments were sent.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use bookwai::errors::{ProviderError, TranslationError};
use bookwai::translation::TranslationPort;

/// Port that upper-cases text and logs calls
#[derive(Debug, Clone, Default)]
pub struct ScriptedPort {
    calls: Arc<Mutex<Vec<String>>>,
    fail_on: Vec<String>,
    delay: Option<Duration>,
    connection_down: bool,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every text containing `marker`
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on.push(marker.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_connection_down(mut self) -> Self {
        self.connection_down = true;
        self
    }

    /// Texts received so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn as_port(&self) -> Arc<dyn TranslationPort> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl TranslationPort for ScriptedPort {
    async fn translate(&self, text: &str, _context: &str) -> Result<String, TranslationError> {
        self.calls.lock().push(text.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on.iter().any(|marker| text.contains(marker.as_str())) {
            return Err(TranslationError::RetriesExhausted {
                attempts: 3,
                last_error: "scripted failure".to_string(),
            });
        }
        Ok(text.to_uppercase())
    }

    async fn test_connection(&self) -> Result<(), TranslationError> {
        if self.connection_down {
            return Err(ProviderError::ConnectionError("scripted outage".to_string()).into());
        }
        Ok(())
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}
