use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use super::rate_limiter::RateLimiter;
use crate::chunker::TextChunker;
use crate::extraction::Chapter;
use crate::progress::ProgressStore;
use crate::progress::models::timestamp_now;
use crate::translation::TranslationPort;

/// Called after every fragment with `(worker_id, chapter_id, completed, total)`
pub type ProgressCallback = Arc<dyn Fn(usize, &str, usize, usize) + Send + Sync>;

/// Per-worker counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkerStats {
    pub worker_id: usize,
    pub chapters_processed: usize,
    /// Fragments translated successfully
    pub chunks_processed: usize,
    /// Fragment fallbacks plus failed chapters
    pub errors_count: usize,
    /// Seconds spent translating
    pub total_processing_time: f64,
    /// What the worker last did, e.g. `Completed: <title>`
    pub last_activity: Option<String>,
    pub last_activity_at: Option<String>,
}

/// Result of one `process_chapter` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterOutcome {
    /// The chapter was completed; `errors` fragments kept their original text
    Completed { fragments: usize, errors: usize },
    /// The chapter was not startable, e.g. already completed
    Skipped,
    /// The chapter was marked as error
    Failed(String),
}

/// Translates whole chapters fragment by fragment
pub struct ChapterWorker {
    worker_id: usize,
    port: Arc<dyn TranslationPort>,
    chunker: TextChunker,
    progress: Arc<ProgressStore>,
    rate_limiter: Arc<RateLimiter>,
    stats: Mutex<WorkerStats>,
}

impl ChapterWorker {
    pub fn new(
        worker_id: usize,
        port: Arc<dyn TranslationPort>,
        chunker: TextChunker,
        progress: Arc<ProgressStore>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            worker_id,
            port,
            chunker,
            progress,
            rate_limiter,
            stats: Mutex::new(WorkerStats {
                worker_id,
                ..WorkerStats::default()
            }),
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn port(&self) -> &Arc<dyn TranslationPort> {
        &self.port
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().clone()
    }

    /// Chunk, translate and persist one chapter.
    ///
    /// A fragment that fails to translate is persisted with its original text
    /// and the chapter goes on. Failures of the chapter itself mark it as error;
    /// nothing here aborts the run.
    pub async fn process_chapter(&self, chapter: &Chapter, on_progress: Option<&ProgressCallback>) -> ChapterOutcome {
        let started = Instant::now();

        if !self.progress.start_chapter(&chapter.id) {
            debug!("Worker {}: chapter {} not startable, skipped", self.worker_id, chapter.id);
            return ChapterOutcome::Skipped;
        }

        let fragments = self.chunker.chunk_text(&chapter.content, &chapter.id);
        if fragments.is_empty() {
            if let Err(e) = self.progress.complete_chapter(&chapter.id) {
                return self.fail(chapter, e.to_string(), started);
            }
            self.record(Some(format!("Completed: {}", chapter.title)), |stats| stats.chapters_processed += 1);
            info!("Worker {}: chapter {} is empty, marked completed", self.worker_id, chapter.id);
            return ChapterOutcome::Completed { fragments: 0, errors: 0 };
        }

        let total = fragments.len();
        if let Err(e) = self.progress.update_chapter_fragment_count(&chapter.id, total) {
            return self.fail(chapter, e.to_string(), started);
        }
        self.record(Some(format!("Translating: {}", chapter.title)), |_| {});
        info!(
            "Worker {}: translating '{}' ({} fragments)",
            self.worker_id, chapter.title, total
        );

        let mut errors = 0;
        for (index, fragment) in fragments.iter().enumerate() {
            self.rate_limiter.acquire().await;

            let fragment_started = Instant::now();
            let result = self.port.translate(&fragment.content, "").await;
            let elapsed = fragment_started.elapsed().as_secs_f64();

            let text = match result {
                Ok(translated) => {
                    self.record(None, |stats| {
                        stats.chunks_processed += 1;
                        stats.total_processing_time += elapsed;
                    });
                    translated
                }
                Err(e) => {
                    warn!(
                        "Worker {}: fragment {}/{} of {} kept untranslated: {}",
                        self.worker_id,
                        index + 1,
                        total,
                        chapter.id,
                        e
                    );
                    errors += 1;
                    self.record(None, |stats| {
                        stats.errors_count += 1;
                        stats.total_processing_time += elapsed;
                    });
                    fragment.content.clone()
                }
            };

            if let Err(e) = self.progress.complete_fragment(&chapter.id, &text) {
                return self.fail(chapter, e.to_string(), started);
            }
            if let Some(callback) = on_progress {
                callback(self.worker_id, &chapter.id, index + 1, total);
            }
        }

        if let Err(e) = self.progress.complete_chapter(&chapter.id) {
            return self.fail(chapter, e.to_string(), started);
        }

        self.record(Some(format!("Completed: {}", chapter.title)), |stats| stats.chapters_processed += 1);
        info!(
            "Worker {}: chapter '{}' done in {:.1}s ({} fragments, {} fallbacks)",
            self.worker_id,
            chapter.title,
            started.elapsed().as_secs_f64(),
            total,
            errors
        );
        ChapterOutcome::Completed { fragments: total, errors }
    }

    fn fail(&self, chapter: &Chapter, message: String, started: Instant) -> ChapterOutcome {
        error!("Worker {}: chapter {} failed: {}", self.worker_id, chapter.id, message);
        if let Err(e) = self.progress.mark_chapter_error(&chapter.id, &message) {
            warn!("Could not record error for chapter {}: {}", chapter.id, e);
        }

        let elapsed = started.elapsed().as_secs_f64();
        self.record(Some(format!("Failed: {}", chapter.title)), |stats| {
            stats.errors_count += 1;
            stats.total_processing_time += elapsed;
        });
        ChapterOutcome::Failed(message)
    }

    fn record(&self, activity: Option<String>, update: impl FnOnce(&mut WorkerStats)) {
        let mut stats = self.stats.lock();
        update(&mut stats);
        if activity.is_some() {
            stats.last_activity = activity;
        }
        stats.last_activity_at = Some(timestamp_now());
    }
}
