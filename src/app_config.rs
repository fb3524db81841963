use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::chunker::{ChunkerConfig, DEFAULT_TOKEN_RATIO};
use crate::progress::WriterTiming;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Target language tag (e.g. "pt-BR", "fr")
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Fragment sizing
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Worker pool and rate limit
    #[serde(default)]
    pub parallel: ParallelConfig,

    /// Progress file writer timing
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Output document settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: OpenAI
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }

    // @returns: Whether the hosted API needs a key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key, handed to the client as is
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model(provider_type),
            api_key: String::new(),
            endpoint: default_endpoint(provider_type),
            timeout_secs: match provider_type {
                TranslationProvider::Anthropic | TranslationProvider::OpenAI => default_hosted_timeout_secs(),
                _ => default_timeout_secs(),
            },
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Background on the book added to every prompt
    #[serde(default)]
    pub context: Option<String>,

    /// Extra instructions appended to the system prompt
    #[serde(default)]
    pub custom_instructions: Option<String>,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff for retries, doubled on each attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound of a single backoff
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens the model may generate per fragment
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            context: None,
            custom_instructions: None,
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Fragment sizing
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Characters per fragment before model-aware planning
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters repeated between neighbouring fragments
    #[serde(default = "default_overlap_size")]
    pub overlap_size: usize,

    /// Explicit model context window in tokens, overrides the built-in table
    #[serde(default)]
    pub context_window: Option<usize>,

    /// Derive the fragment size from the model context window. When off, `chunk_size` is used as is.
    #[serde(default = "default_plan_for_model")]
    pub plan_for_model: bool,

    /// Tokens per character used for estimates
    #[serde(default = "default_token_ratio")]
    pub token_ratio: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap_size: default_overlap_size(),
            context_window: None,
            plan_for_model: default_plan_for_model(),
            token_ratio: default_token_ratio(),
        }
    }
}

impl ChunkingConfig {
    pub fn chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig::new(self.chunk_size, self.overlap_size)
    }

    /// Chunker parameters for a run with `model_id`
    pub fn planned_for(&self, model_id: &str) -> ChunkerConfig {
        let base = self.chunker_config();
        if self.plan_for_model {
            base.for_model(model_id, self.context_window)
        } else {
            base
        }
    }
}

/// Worker pool settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ParallelConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Requests per second across all workers, 0 disables throttling
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    /// Check the provider through the first worker before starting
    #[serde(default = "default_true")]
    pub validate_connection: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            rate_limit: default_rate_limit(),
            validate_connection: true,
        }
    }
}

/// Progress file writer timing
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PersistenceConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_important_delay_ms")]
    pub important_delay_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            important_delay_ms: default_important_delay_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl PersistenceConfig {
    pub fn writer_timing(&self) -> WriterTiming {
        WriterTiming {
            debounce: Duration::from_millis(self.debounce_ms),
            important_delay: Duration::from_millis(self.important_delay_ms),
            queue_capacity: self.queue_capacity,
        }
    }
}

/// Output document settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    /// Also write one file per chapter
    #[serde(default)]
    pub save_chapters_separately: bool,

    /// Directory for chapter files, relative to the output file
    #[serde(default = "default_chapters_dir")]
    pub chapters_dir: String,

    /// Keep chapter files after the combined document is written
    #[serde(default = "default_true")]
    pub keep_chapter_files: bool,

    /// Title of the combined document, defaults to the input file stem
    #[serde(default)]
    pub book_title: Option<String>,

    /// Mirror the log to a timestamped file under the data directory
    #[serde(default)]
    pub log_to_file: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_chapters_separately: false,
            chapters_dir: default_chapters_dir(),
            keep_chapter_files: true,
            book_title: None,
            log_to_file: false,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_target_language() -> String {
    "pt-BR".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_hosted_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_retry_max_backoff_ms() -> u64 {
    10_000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_chunk_size() -> usize {
    4000
}

fn default_plan_for_model() -> bool {
    true
}

fn default_overlap_size() -> usize {
    200
}

fn default_token_ratio() -> f64 {
    DEFAULT_TOKEN_RATIO
}

fn default_max_workers() -> usize {
    4
}

fn default_rate_limit() -> f64 {
    2.0
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_important_delay_ms() -> u64 {
    500
}

fn default_queue_capacity() -> usize {
    64
}

fn default_chapters_dir() -> String {
    "chapters".to_string()
}

fn default_true() -> bool {
    true
}

fn default_endpoint(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Ollama => "http://localhost:11434".to_string(),
        TranslationProvider::OpenAI => "https://api.openai.com/v1".to_string(),
        TranslationProvider::Anthropic => "https://api.anthropic.com".to_string(),
        // LM Studio serves the OpenAI-compatible API under /v1
        TranslationProvider::LMStudio => "http://localhost:1234/v1".to_string(),
    }
}

fn default_model(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Ollama => "llama3.1".to_string(),
        TranslationProvider::OpenAI => "gpt-4o-mini".to_string(),
        TranslationProvider::Anthropic => "claude-3-5-sonnet-20241022".to_string(),
        // Placeholder; users should set to the loaded model name in LM Studio
        TranslationProvider::LMStudio => "local-model".to_string(),
    }
}

impl Config {
    /// Load the config file, or write and return the defaults when it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config file: {:?}", path));
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        crate::file_utils::FileManager::write_to_file(path, &json)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::validate_language_tag(&self.target_language)?;

        let provider = self.translation.provider;
        if provider.requires_api_key() && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                provider.display_name()
            ));
        }

        let endpoint = self.translation.get_endpoint();
        Url::parse(&endpoint).with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;

        if self.chunking.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be greater than zero"));
        }
        if self.chunking.overlap_size >= self.chunking.chunk_size {
            return Err(anyhow!(
                "overlap_size ({}) must be smaller than chunk_size ({})",
                self.chunking.overlap_size,
                self.chunking.chunk_size
            ));
        }
        if self.parallel.max_workers == 0 {
            return Err(anyhow!("max_workers must be at least 1"));
        }
        if !self.parallel.rate_limit.is_finite() || self.parallel.rate_limit < 0.0 {
            return Err(anyhow!("rate_limit must be a non-negative number"));
        }

        crate::providers::validate_model_name(provider, &self.translation.get_model());
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            chunking: ChunkingConfig::default(),
            parallel: ParallelConfig::default(),
            persistence: PersistenceConfig::default(),
            output: OutputConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(self.provider)
    }

    pub fn get_provider_config(&self, provider_type: TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Active provider entry, inserted with defaults when missing
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        let index = match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(index) => index,
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        match self.get_active_provider_config() {
            Some(config) if !config.model.is_empty() => config.model.clone(),
            _ => default_model(self.provider),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|config| config.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        match self.get_active_provider_config() {
            Some(config) if !config.endpoint.is_empty() => config.endpoint.clone(),
            _ => default_endpoint(self.provider),
        }
    }

    pub fn get_timeout(&self) -> Duration {
        let secs = self
            .get_active_provider_config()
            .map(|config| config.timeout_secs)
            .unwrap_or_else(default_timeout_secs);
        Duration::from_secs(secs.max(1))
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::LMStudio),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
