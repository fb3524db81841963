/*!
 * Translation progress tracking.
 *
 * - `models`: persisted job and chapter state
 * - `writer`: debounced background writer
 * - `manager`: the `ProgressStore` state machine
 * - `ordering`: output order of chapters
 */

pub mod manager;
pub mod models;
pub mod ordering;
mod writer;

pub use manager::ProgressStore;
pub use models::{ChapterState, ChapterStatus, JobState, JobStatus, ProgressSummary};
pub use ordering::{order_key, ordered_chapters};
pub use writer::{SavePriority, WriterTiming};
