/*!
 * # bookwai - book translation with AI
 *
 * A Rust library for translating whole books with large language models.
 *
 * ## Features
 *
 * - Extract chapters from JSON chapter lists, plain text and Markdown
 * - Split chapters into overlapping fragments sized for the model's context window
 * - Translate chapters in parallel through a fixed worker pool sharing one rate limiter
 * - Translate using various AI providers:
 *   - Ollama (local LLM)
 *   - OpenAI API
 *   - Anthropic API
 *   - LM Studio (OpenAI-compatible local server)
 * - Crash-safe, debounced progress file so interrupted runs resume
 * - Markdown output in book order, optionally one file per chapter
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `extraction`: Chapter extraction from input documents
 * - `chunker`: Fragment planning and splitting
 * - `translation`: Translation port, prompts and the retrying service
 * - `providers`: Client implementations for various LLM providers
 * - `parallel`: Rate limiter, chapter workers and the coordinator
 * - `progress`: Job state, ordering and the persistent progress store
 * - `assembly`: Output document rendering
 * - `app_controller`: Main application controller
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod assembly;
pub mod chunker;
pub mod errors;
pub mod extraction;
pub mod file_utils;
pub mod language_utils;
pub mod parallel;
pub mod progress;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, RunOutcome, RunReport};
pub use chunker::{ChunkerConfig, TextChunker, TextFragment};
pub use extraction::Chapter;
pub use parallel::{ParallelCoordinator, ProcessingStats, RateLimiter};
pub use progress::{ChapterStatus, JobState, JobStatus, ProgressStore};
pub use translation::{TranslationPort, TranslationService};
