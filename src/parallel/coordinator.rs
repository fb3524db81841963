use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::rate_limiter::RateLimiter;
use super::worker::{ChapterOutcome, ChapterWorker, ProgressCallback, WorkerStats};
use crate::chunker::TextChunker;
use crate::errors::{ParallelError, TranslationError};
use crate::extraction::Chapter;
use crate::progress::ProgressStore;
use crate::translation::TranslationPort;

/// Run-wide knobs of the coordinator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorSettings {
    /// Requests per second across all workers, 0 disables throttling
    pub rate_limit: f64,
    /// Check the backend through the first worker before any work starts
    pub validate_connection: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            rate_limit: 2.0,
            validate_connection: true,
        }
    }
}

/// Aggregate result of `process_chapters`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub total_time: Duration,
    /// Chapters handed to workers
    pub chapters_processed: usize,
    pub chapters_succeeded: usize,
    pub chapters_failed: usize,
    pub chapters_skipped: usize,
    pub fragments_processed: usize,
    /// Fragments that kept their original text
    pub fragment_errors: usize,
    pub workers_used: usize,
    pub average_time_per_chapter: Duration,
    pub worker_details: Vec<WorkerStats>,
}

/// Fans chapters out over a fixed pool of workers
pub struct ParallelCoordinator {
    progress: Arc<ProgressStore>,
    chunker: TextChunker,
    settings: CoordinatorSettings,
    rate_limiter: Arc<RateLimiter>,
    workers: Vec<Arc<ChapterWorker>>,
}

impl ParallelCoordinator {
    pub fn new(progress: Arc<ProgressStore>, chunker: TextChunker, settings: CoordinatorSettings) -> Self {
        Self {
            progress,
            chunker,
            settings,
            rate_limiter: Arc::new(RateLimiter::new(settings.rate_limit)),
            workers: Vec::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Build `count` workers sharing one rate limiter.
    ///
    /// `factory` creates each worker's translation port. When connection
    /// validation is on, the first worker's port must answer or the whole
    /// pool is discarded.
    pub async fn create_workers<F>(&mut self, count: usize, mut factory: F) -> Result<usize, ParallelError>
    where
        F: FnMut(usize) -> Result<Arc<dyn TranslationPort>, TranslationError>,
    {
        let mut workers = Vec::with_capacity(count);
        for worker_id in 0..count {
            let port = factory(worker_id).map_err(|source| ParallelError::WorkerSetup { worker_id, source })?;
            workers.push(Arc::new(ChapterWorker::new(
                worker_id,
                port,
                self.chunker.clone(),
                Arc::clone(&self.progress),
                Arc::clone(&self.rate_limiter),
            )));
        }

        if self.settings.validate_connection {
            if let Some(first) = workers.first() {
                info!("Testing connection with {}...", first.port().model_id());
                first.port().test_connection().await.map_err(|e| {
                    error!("Connection test failed: {}", e);
                    ParallelError::ConnectionCheckFailed(e)
                })?;
                info!("Connection OK");
            }
        }

        self.workers = workers;
        info!("Created {} workers", self.workers.len());
        Ok(self.workers.len())
    }

    /// Translate `chapters`, restricted to pending and failed ones when resuming.
    ///
    /// Chapters are assigned round-robin (`index % workers`) and at most as
    /// many chapters as workers run at once. Chapter failures are counted,
    /// never propagated. The chapter futures live inside the returned future, so
    /// dropping it stops every translation in flight.
    pub async fn process_chapters(
        &self,
        chapters: &[Chapter],
        resume: bool,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ProcessingStats, ParallelError> {
        if self.workers.is_empty() {
            return Err(ParallelError::NoWorkers);
        }

        let selected: Vec<&Chapter> = if resume {
            let pending = self.progress.pending_chapter_ids();
            let selected: Vec<&Chapter> = chapters.iter().filter(|c| pending.contains(&c.id)).collect();
            info!(
                "Resuming: {} of {} chapters left to translate",
                selected.len(),
                chapters.len()
            );
            selected
        } else {
            chapters.iter().collect()
        };

        let started = Instant::now();
        if selected.is_empty() {
            info!("Nothing to translate");
            return Ok(ProcessingStats {
                worker_details: self.worker_stats(),
                ..ProcessingStats::default()
            });
        }

        let worker_count = self.workers.len();
        let chapter_count = selected.len();
        let on_progress = on_progress.as_ref();

        let results: Vec<ChapterOutcome> = stream::iter(selected.into_iter().enumerate())
            .map(|(index, chapter)| {
                let worker = &self.workers[index % worker_count];
                async move {
                    debug!("Worker {} picked chapter {}", worker.worker_id(), chapter.id);
                    worker.process_chapter(chapter, on_progress).await
                }
            })
            .buffer_unordered(worker_count)
            .collect()
            .await;

        let mut stats = ProcessingStats {
            chapters_processed: chapter_count,
            workers_used: worker_count.min(chapter_count),
            ..ProcessingStats::default()
        };
        for result in results {
            match result {
                ChapterOutcome::Completed { fragments, errors } => {
                    stats.chapters_succeeded += 1;
                    stats.fragments_processed += fragments;
                    stats.fragment_errors += errors;
                }
                ChapterOutcome::Skipped => stats.chapters_skipped += 1,
                ChapterOutcome::Failed(_) => stats.chapters_failed += 1,
            }
        }

        stats.total_time = started.elapsed();
        stats.average_time_per_chapter = stats.total_time / chapter_count as u32;
        stats.worker_details = self.worker_stats();

        if stats.chapters_failed > 0 {
            warn!("{} chapters failed and can be retried with resume", stats.chapters_failed);
        }
        info!(
            "Processed {} chapters ({} ok, {} failed, {} skipped) in {:.1}s",
            stats.chapters_processed,
            stats.chapters_succeeded,
            stats.chapters_failed,
            stats.chapters_skipped,
            stats.total_time.as_secs_f64()
        );
        Ok(stats)
    }

    pub fn worker_stats(&self) -> Vec<WorkerStats> {
        self.workers.iter().map(|w| w.stats()).collect()
    }

    /// Drop all workers and their ports
    pub fn cleanup(&mut self) {
        debug!("Releasing {} workers", self.workers.len());
        self.workers.clear();
    }
}
