/*!
 * Error types for the bookwai application.
 *
 * Each subsystem gets its own error enum built with thiserror. The binary and
 * the controller fold them into `anyhow::Error` or `AppError`.
 */

use thiserror::Error;

use crate::progress::ChapterStatus;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether another attempt has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::ConnectionError(_) | Self::RateLimitExceeded(_) => true,
            Self::ParseError(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 408,
            Self::AuthenticationError(_) => false,
        }
    }

    /// Map an HTTP error status and body to the matching variant
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model answered with nothing usable
    #[error("Model returned an empty response")]
    EmptyResponse,

    /// Every attempt failed
    #[error("Translation failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Message of the final failure
        last_error: String,
    },

    /// Provider could not be built from the configuration
    #[error("Invalid translation configuration: {0}")]
    Configuration(String),
}

/// Errors raised by the progress store
#[derive(Error, Debug)]
pub enum ProgressError {
    /// No job has been created or loaded yet
    #[error("No active translation job")]
    NoActiveJob,

    /// The chapter id is not part of the job
    #[error("Unknown chapter: {0}")]
    UnknownChapter(String),

    /// The requested transition is not allowed from the current status
    #[error("Cannot {action} chapter {chapter_id} while it is {from}")]
    InvalidTransition {
        /// Chapter identifier
        chapter_id: String,
        /// Status the chapter was in
        from: ChapterStatus,
        /// Attempted operation
        action: &'static str,
    },

    /// Reading or writing the state file failed
    #[error("Progress file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The state file could not be (de)serialized
    #[error("Progress file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while reading chapters from an input document
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The input format has no extractor in this build
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// The input file could not be read
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// The input file content is malformed
    #[error("Failed to parse input: {0}")]
    Parse(String),
}

/// Errors that abort a parallel run before any chapter is processed
#[derive(Error, Debug)]
pub enum ParallelError {
    /// `process_chapters` was called before `create_workers`
    #[error("No workers available, call create_workers first")]
    NoWorkers,

    /// The connectivity check through the first worker failed
    #[error("Connection check failed: {0}")]
    ConnectionCheckFailed(#[source] TranslationError),

    /// A worker's translation client could not be built
    #[error("Failed to set up worker {worker_id}: {source}")]
    WorkerSetup {
        worker_id: usize,
        #[source]
        source: TranslationError,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from the progress store
    #[error("Progress error: {0}")]
    Progress(#[from] ProgressError),

    /// Error from extraction
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Error from the parallel coordinator
    #[error("Parallel processing error: {0}")]
    Parallel(#[from] ParallelError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
