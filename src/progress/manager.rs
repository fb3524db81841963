/*!
 * Resumable progress store.
 *
 * The in-memory `JobState` is the source of truth. Every mutation happens
 * under one lock and then queues a save for the background writer; the
 * state file on disk is a lagging mirror of memory.
 */

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::models::{ChapterState, ChapterStatus, JobState, JobStatus, ProgressSummary, timestamp_now};
use super::writer::{SavePriority, SaveWriter, StateFile, WriterTiming};
use crate::errors::ProgressError;
use crate::extraction::Chapter;
use crate::file_utils::FileManager;

/// Durable, crash-safe state machine for one translation job
pub struct ProgressStore {
    file: Arc<StateFile>,
    writer: Mutex<Option<SaveWriter>>,
}

impl ProgressStore {
    /// Open a store backed by `path`. Spawns the writer, so it must run inside a tokio runtime.
    pub fn new(path: impl Into<PathBuf>, timing: WriterTiming) -> Self {
        let file = Arc::new(StateFile::new(path.into()));
        let writer = SaveWriter::spawn(Arc::clone(&file), timing);

        Self {
            file,
            writer: Mutex::new(Some(writer)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Start a new job, replacing any state held in memory
    pub fn create(
        &self,
        input_ref: &str,
        output_ref: &str,
        model_id: &str,
        target_language: &str,
        chapters: &[Chapter],
    ) -> JobState {
        let job = JobState::new(input_ref, output_ref, model_id, target_language, chapters);
        if job.total_chapters != chapters.len() {
            warn!(
                "{} duplicate chapter ids collapsed while creating the job",
                chapters.len() - job.total_chapters
            );
        }

        *self.file.state.lock() = Some(job.clone());
        info!("Created translation job with {} chapters", job.total_chapters);
        self.queue_save(SavePriority::Important);
        job
    }

    /// Load the state file if it exists.
    ///
    /// Chapters left `in_progress` by an interrupted run are demoted to
    /// `pending` with their fragments cleared, so a resumed run redoes them
    /// from the start.
    pub fn load(&self) -> Result<Option<JobState>, ProgressError> {
        let raw = match std::fs::read_to_string(&self.file.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No progress file at {:?}", self.file.path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let mut job: JobState = serde_json::from_str(&raw)?;

        let mut demoted = 0usize;
        for chapter in job.chapters.values_mut() {
            if chapter.status == ChapterStatus::InProgress {
                reset_chapter(chapter);
                chapter.status = ChapterStatus::Pending;
                chapter.start_time = None;
                demoted += 1;
            }
            chapter.completed_fragments = chapter.translated_fragments.len();
        }
        if demoted > 0 {
            warn!("{} interrupted chapters reset to pending", demoted);
        }
        job.recount();

        info!(
            "Loaded progress: {}/{} chapters completed ({})",
            job.completed_chapters, job.total_chapters, job.status
        );
        *self.file.state.lock() = Some(job.clone());
        Ok(Some(job))
    }

    /// True when the loaded job matches this run and was not finished
    pub fn can_resume(&self, input_ref: &str, model_id: &str, target_language: &str) -> bool {
        match self.file.state.lock().as_ref() {
            Some(job) => {
                job.input_ref == input_ref
                    && job.model_id == model_id
                    && job.target_language == target_language
                    && job.status.is_resumable()
            }
            None => false,
        }
    }

    /// Move a chapter to `in_progress`. Returns false when it is not startable.
    pub fn start_chapter(&self, chapter_id: &str) -> bool {
        let started = self.with_job(|job| {
            let chapter = chapter_mut(job, chapter_id)?;
            if !chapter.status.is_startable() {
                return Ok(false);
            }
            reset_chapter(chapter);
            chapter.status = ChapterStatus::InProgress;
            chapter.start_time = Some(timestamp_now());
            Ok(true)
        });

        match started {
            Ok(true) => {
                self.queue_save(SavePriority::Important);
                true
            }
            Ok(false) => {
                debug!("Chapter {} is not pending, start skipped", chapter_id);
                false
            }
            Err(e) => {
                warn!("Cannot start chapter {}: {}", chapter_id, e);
                false
            }
        }
    }

    /// Record how many fragments a chapter was split into
    pub fn update_chapter_fragment_count(&self, chapter_id: &str, total: usize) -> Result<(), ProgressError> {
        self.with_job(|job| {
            let chapter = chapter_mut(job, chapter_id)?;
            match chapter.status {
                ChapterStatus::Pending | ChapterStatus::InProgress => {
                    chapter.total_fragments = total;
                    Ok(())
                }
                from => Err(invalid(chapter_id, from, "set fragment count of")),
            }
        })?;
        self.queue_save(SavePriority::Normal);
        Ok(())
    }

    /// Append the translation of the next fragment
    pub fn complete_fragment(&self, chapter_id: &str, translated_text: &str) -> Result<(), ProgressError> {
        self.with_job(|job| {
            let chapter = chapter_mut(job, chapter_id)?;
            if chapter.status != ChapterStatus::InProgress {
                return Err(invalid(chapter_id, chapter.status, "add a fragment to"));
            }
            chapter.translated_fragments.push(translated_text.to_string());
            chapter.completed_fragments = chapter.translated_fragments.len();
            Ok(())
        })?;
        self.queue_save(SavePriority::Normal);
        Ok(())
    }

    /// Mark a chapter completed and flip the job to completed once every chapter is
    pub fn complete_chapter(&self, chapter_id: &str) -> Result<(), ProgressError> {
        let job_done = self.with_job(|job| {
            let chapter = chapter_mut(job, chapter_id)?;
            if chapter.status != ChapterStatus::InProgress {
                return Err(invalid(chapter_id, chapter.status, "complete"));
            }
            chapter.status = ChapterStatus::Completed;
            chapter.end_time = Some(timestamp_now());

            job.recount();
            if job.all_chapters_completed() {
                job.status = JobStatus::Completed;
                return Ok(true);
            }
            Ok(false)
        })?;

        if job_done {
            info!("All chapters completed");
        }
        self.queue_save(SavePriority::Important);
        Ok(())
    }

    /// Put a chapter into the error state. Completed chapters cannot fail afterwards.
    pub fn mark_chapter_error(&self, chapter_id: &str, message: &str) -> Result<(), ProgressError> {
        self.with_job(|job| {
            let chapter = chapter_mut(job, chapter_id)?;
            if chapter.status == ChapterStatus::Completed {
                return Err(invalid(chapter_id, chapter.status, "mark error on"));
            }
            chapter.status = ChapterStatus::Error;
            chapter.error = Some(message.to_string());
            chapter.end_time = Some(timestamp_now());
            Ok(())
        })?;
        self.queue_save(SavePriority::Important);
        Ok(())
    }

    /// Chapters still to translate: pending ones and those that failed
    pub fn pending_chapter_ids(&self) -> BTreeSet<String> {
        match self.file.state.lock().as_ref() {
            Some(job) => job
                .chapters
                .values()
                .filter(|c| c.status.is_startable())
                .map(|c| c.chapter_id.clone())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Change the job status, e.g. to `paused` on interruption
    pub fn set_job_status(&self, status: JobStatus) -> Result<(), ProgressError> {
        self.with_job(|job| {
            job.status = status;
            Ok(())
        })?;
        self.queue_save(SavePriority::Important);
        Ok(())
    }

    pub fn summary(&self) -> Option<ProgressSummary> {
        self.file.state.lock().as_ref().map(ProgressSummary::from_job)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Option<JobState> {
        self.file.state.lock().clone()
    }

    /// Forget the job and delete the state file
    pub fn reset(&self) -> Result<(), ProgressError> {
        *self.file.state.lock() = None;
        if FileManager::remove_if_exists(&self.file.path)? {
            info!("Progress reset, removed {:?}", self.file.path);
        }
        Ok(())
    }

    /// Write the current state right away, bypassing the queue
    pub async fn save_now(&self) {
        self.file.persist().await;
    }

    /// Flush the last state and stop the writer. Safe to call more than once.
    pub async fn finalize(&self) {
        let writer = self.writer.lock().take();
        match writer {
            Some(writer) => writer.shutdown().await,
            None => self.file.persist().await,
        }
        debug!("Progress store finalized");
    }

    fn with_job<T>(&self, f: impl FnOnce(&mut JobState) -> Result<T, ProgressError>) -> Result<T, ProgressError> {
        let mut guard = self.file.state.lock();
        let job = guard.as_mut().ok_or(ProgressError::NoActiveJob)?;
        f(job)
    }

    fn queue_save(&self, priority: SavePriority) {
        match self.writer.lock().as_ref() {
            Some(writer) => writer.request(priority),
            None => debug!("Progress store finalized, {:?} save not queued", priority),
        }
    }
}

fn chapter_mut<'a>(job: &'a mut JobState, chapter_id: &str) -> Result<&'a mut ChapterState, ProgressError> {
    job.chapters
        .get_mut(chapter_id)
        .ok_or_else(|| ProgressError::UnknownChapter(chapter_id.to_string()))
}

fn reset_chapter(chapter: &mut ChapterState) {
    chapter.translated_fragments.clear();
    chapter.completed_fragments = 0;
    chapter.error = None;
    chapter.end_time = None;
}

fn invalid(chapter_id: &str, from: ChapterStatus, action: &'static str) -> ProgressError {
    ProgressError::InvalidTransition {
        chapter_id: chapter_id.to_string(),
        from,
        action,
    }
}
