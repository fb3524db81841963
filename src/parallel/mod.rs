/*!
 * Parallel chapter processing.
 *
 * A `ParallelCoordinator` owns a fixed pool of `ChapterWorker`s that share
 * one `RateLimiter` and one `ProgressStore`. Fragments of a chapter are
 * translated strictly in order; chapters finish in any order.
 */

pub mod coordinator;
pub mod rate_limiter;
pub mod worker;

pub use coordinator::{CoordinatorSettings, ParallelCoordinator, ProcessingStats};
pub use rate_limiter::RateLimiter;
pub use worker::{ChapterOutcome, ChapterWorker, ProgressCallback, WorkerStats};
