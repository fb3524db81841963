use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::assembly::OutputAssembler;
use crate::chunker::{TextChunker, estimate_tokens};
use crate::errors::TranslationError;
use crate::extraction::{Chapter, create_extractor};
use crate::file_utils::FileManager;
use crate::parallel::{CoordinatorSettings, ParallelCoordinator, ProcessingStats, ProgressCallback};
use crate::progress::{JobStatus, ProgressStore};
use crate::translation::{TranslationPort, TranslationService};

// @module: Application controller for book translation

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every chapter was translated
    Completed,
    /// Some chapters failed; a resumed run retries them
    Incomplete,
    /// Interrupted; the job was saved as paused
    Paused,
}

/// What a run did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub stats: ProcessingStats,
    pub resumed: bool,
    /// Chapters written to the output document
    pub chapters_written: usize,
    pub output_path: PathBuf,
}

/// Main application controller for book translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Continue a matching job from its progress file
    resume: bool,
    // @field: Input format override, otherwise detected from the extension
    input_format: Option<String>,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            config,
            resume: true,
            input_format: None,
        })
    }

    /// Disable or enable resuming from an existing progress file
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Force the input format instead of detecting it from the extension
    pub fn with_input_format(mut self, format: Option<String>) -> Self {
        self.input_format = format;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build one translation client and check that it answers
    pub async fn test_connection(&self) -> Result<()> {
        let service = TranslationService::new(&self.config.translation, &self.config.target_language)?;
        info!(
            "Testing {} with model {}...",
            self.config.translation.provider.display_name(),
            service.model_id()
        );
        service
            .test_connection()
            .await
            .context("Connection test failed")?;
        info!("Connection OK");
        Ok(())
    }

    /// Translate `input` into `output` with the configured provider. Ctrl-C pauses the job.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<RunReport> {
        let factory = |_worker_id: usize| -> Result<Arc<dyn TranslationPort>, TranslationError> {
            let service = TranslationService::new(&self.config.translation, &self.config.target_language)?;
            Ok(Arc::new(service) as Arc<dyn TranslationPort>)
        };

        let interrupted = async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Could not listen for Ctrl-C, interruption disabled");
                std::future::pending::<()>().await;
            }
        };

        self.run_until(input, output, factory, interrupted).await
    }

    /// Full pipeline with caller-supplied translation ports and interruption signal
    pub async fn run_until<F, S>(&self, input: &Path, output: &Path, factory: F, interrupted: S) -> Result<RunReport>
    where
        F: FnMut(usize) -> Result<Arc<dyn TranslationPort>, TranslationError>,
        S: Future<Output = ()>,
    {
        let start_time = Instant::now();
        if !FileManager::file_exists(input) {
            return Err(anyhow!("Input file does not exist: {:?}", input));
        }

        let chapters = create_extractor(input, self.input_format.as_deref())?
            .extract(input)
            .with_context(|| format!("Failed to extract chapters from {:?}", input))?;
        if chapters.is_empty() {
            return Err(anyhow!("No chapters found in {:?}", input));
        }

        let model = self.config.translation.get_model();
        let input_ref = input.to_string_lossy().into_owned();
        let output_ref = output.to_string_lossy().into_owned();

        let store = Arc::new(ProgressStore::new(
            FileManager::progress_file_path(output),
            self.config.persistence.writer_timing(),
        ));
        let resumed = self.prepare_job(&store, &chapters, &input_ref, &output_ref, &model)?;

        let chunker = TextChunker::new(self.config.chunking.planned_for(&model));

        let processed = self
            .process(&store, chunker, &chapters, resumed, factory, interrupted)
            .await;

        // Flush whatever happened, including errors and interruption
        store.finalize().await;

        let (outcome, stats) = match processed? {
            Some(stats) => {
                let complete = store.snapshot().is_some_and(|job| job.all_chapters_completed());
                let outcome = if complete { RunOutcome::Completed } else { RunOutcome::Incomplete };
                (outcome, stats)
            }
            None => {
                warn!("Translation paused. Run the same command again to resume.");
                return Ok(RunReport {
                    outcome: RunOutcome::Paused,
                    stats: ProcessingStats::default(),
                    resumed,
                    chapters_written: 0,
                    output_path: output.to_path_buf(),
                });
            }
        };

        let chapters_written = self.assemble(&store, input, output)?;
        self.log_summary(&store, &stats, start_time.elapsed());
        if outcome == RunOutcome::Incomplete {
            warn!("Some chapters failed. Run again to retry them.");
        }

        Ok(RunReport {
            outcome,
            stats,
            resumed,
            chapters_written,
            output_path: output.to_path_buf(),
        })
    }

    /// Load or create the job. Returns true when an existing job is resumed.
    fn prepare_job(
        &self,
        store: &ProgressStore,
        chapters: &[Chapter],
        input_ref: &str,
        output_ref: &str,
        model: &str,
    ) -> Result<bool> {
        let language = &self.config.target_language;
        let existing = match store.load() {
            Ok(job) => job,
            Err(e) => {
                warn!("Ignoring unreadable progress file {:?}: {}", store.path(), e);
                None
            }
        };

        if self.resume && existing.is_some() && store.can_resume(input_ref, model, language) {
            if let Some(summary) = store.summary() {
                info!(
                    "Resuming job: {}/{} chapters done ({:.1}%)",
                    summary.completed_chapters, summary.total_chapters, summary.progress_percentage
                );
            }
            return Ok(true);
        }

        if existing.is_some() {
            info!("Existing progress does not match this run, starting fresh");
        }
        store.reset()?;
        store.create(input_ref, output_ref, model, language, chapters);
        Ok(false)
    }

    /// Run the coordinator. `None` means the run was interrupted.
    async fn process<F, S>(
        &self,
        store: &Arc<ProgressStore>,
        chunker: TextChunker,
        chapters: &[Chapter],
        resume: bool,
        factory: F,
        interrupted: S,
    ) -> Result<Option<ProcessingStats>>
    where
        F: FnMut(usize) -> Result<Arc<dyn TranslationPort>, TranslationError>,
        S: Future<Output = ()>,
    {
        let pending = store.pending_chapter_ids();
        let total_fragments: usize = chapters
            .iter()
            .filter(|c| pending.contains(&c.id))
            .map(|c| chunker.chunk_text(&c.content, &c.id).len())
            .sum();
        let ratio = self.config.chunking.token_ratio;
        let total_tokens: usize = chapters.iter().map(|c| estimate_tokens(&c.content, ratio)).sum();

        info!(
            "{} - {} - {} chapters, ~{} tokens, {} fragments to translate",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model(),
            chapters.len(),
            total_tokens,
            total_fragments
        );
        debug!(
            "Chunk size {} / overlap {}",
            chunker.config().chunk_size,
            chunker.config().overlap_size
        );

        let settings = CoordinatorSettings {
            rate_limit: self.config.parallel.rate_limit,
            validate_connection: self.config.parallel.validate_connection,
        };
        let mut coordinator = ParallelCoordinator::new(Arc::clone(store), chunker, settings);
        coordinator
            .create_workers(self.config.parallel.max_workers, factory)
            .await?;

        let progress_bar = ProgressBar::new(total_fragments as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} fragments ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style);
        progress_bar.set_message("Translating");

        let pb = progress_bar.clone();
        let callback: ProgressCallback = Arc::new(move |worker_id, chapter_id, completed, total| {
            pb.inc(1);
            pb.set_message(format!("worker {}: {} {}/{}", worker_id, chapter_id, completed, total));
        });

        let result = tokio::select! {
            result = coordinator.process_chapters(chapters, resume, Some(callback)) => Some(result),
            _ = interrupted => None,
        };

        let stats = match result {
            Some(result) => {
                progress_bar.finish_and_clear();
                result?
            }
            None => {
                progress_bar.abandon_with_message("Interrupted");
                store.set_job_status(JobStatus::Paused)?;
                return Ok(None);
            }
        };

        coordinator.cleanup();
        Ok(Some(stats))
    }

    /// Write the combined document and optional chapter files
    fn assemble(&self, store: &ProgressStore, input: &Path, output: &Path) -> Result<usize> {
        let job = store
            .snapshot()
            .ok_or_else(|| anyhow!("No translation job to assemble"))?;
        let assembler = OutputAssembler::new(&job);

        let title = self.config.output.book_title.clone().unwrap_or_else(|| {
            input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Translation".to_string())
        });

        if let Some(parent) = output.parent() {
            FileManager::ensure_dir(parent)?;
        }

        let chapter_files = if self.config.output.save_chapters_separately {
            let dir = output
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&self.config.output.chapters_dir);
            assembler.write_chapter_files(dir)?
        } else {
            Vec::new()
        };

        let written = assembler.write_markdown(output, &title)?;

        if !chapter_files.is_empty() && !self.config.output.keep_chapter_files {
            OutputAssembler::remove_chapter_files(&chapter_files)?;
        }
        Ok(written)
    }

    fn log_summary(&self, store: &ProgressStore, stats: &ProcessingStats, elapsed: Duration) {
        for worker in &stats.worker_details {
            debug!(
                "Worker {}: {} chapters, {} fragments, {} errors, {:.1}s, last: {}",
                worker.worker_id,
                worker.chapters_processed,
                worker.chunks_processed,
                worker.errors_count,
                worker.total_processing_time,
                worker.last_activity.as_deref().unwrap_or("idle")
            );
        }
        if stats.fragment_errors > 0 {
            warn!("{} fragments kept their original text", stats.fragment_errors);
        }
        if let Some(summary) = store.summary() {
            info!(
                "{}/{} chapters translated ({:.1}% of fragments)",
                summary.completed_chapters, summary.total_chapters, summary.progress_percentage
            );
        }
        info!("Translation finished in {}.", Self::format_duration(elapsed));
    }

    /// Format duration in a human-readable format
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:01}s", seconds, duration.subsec_millis() / 100)
        }
    }
}
