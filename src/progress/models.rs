/*!
 * Persisted progress data model.
 *
 * `JobState` is serialized as one JSON document. Field aliases keep state
 * files written with the older `*_chunks` / `*_file` names readable, and every
 * optional field has a default so files from earlier versions still load.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::extraction::Chapter;

/// Current time as an RFC 3339 string
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Lifecycle of a single chapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Error,
}

impl ChapterStatus {
    /// Whether a run may (re)start this chapter
    pub fn is_startable(&self) -> bool {
        matches!(self, ChapterStatus::Pending | ChapterStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterStatus::Pending => "pending",
            ChapterStatus::InProgress => "in_progress",
            ChapterStatus::Completed => "completed",
            ChapterStatus::Error => "error",
        }
    }
}

impl fmt::Display for ChapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a whole translation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    InProgress,
    Completed,
    Error,
    Paused,
}

impl JobStatus {
    /// Check if a run in this status can be resumed
    pub fn is_resumable(&self) -> bool {
        matches!(self, JobStatus::InProgress | JobStatus::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            "paused" => Ok(JobStatus::Paused),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Translation state of one chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterState {
    pub chapter_id: String,

    #[serde(default)]
    pub title: String,

    /// Position in the source document, used to restore order on assembly
    #[serde(default)]
    pub original_index: usize,

    #[serde(default, alias = "total_chunks")]
    pub total_fragments: usize,

    #[serde(default, alias = "completed_chunks")]
    pub completed_fragments: usize,

    /// Index-aligned with fragment `sequence_id`
    #[serde(default, alias = "translated_chunks")]
    pub translated_fragments: Vec<String>,

    #[serde(default)]
    pub status: ChapterStatus,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub start_time: Option<String>,

    #[serde(default)]
    pub end_time: Option<String>,
}

impl ChapterState {
    pub fn new(chapter_id: impl Into<String>, title: impl Into<String>, original_index: usize) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            title: title.into(),
            original_index,
            total_fragments: 0,
            completed_fragments: 0,
            translated_fragments: Vec::new(),
            status: ChapterStatus::Pending,
            error: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Translated fragments joined with blank lines
    pub fn translated_text(&self) -> String {
        self.translated_fragments
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Full persisted state of one translation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    #[serde(alias = "input_file")]
    pub input_ref: String,

    #[serde(alias = "output_file")]
    pub output_ref: String,

    #[serde(alias = "model")]
    pub model_id: String,

    pub target_language: String,

    #[serde(default)]
    pub total_chapters: usize,

    #[serde(default)]
    pub completed_chapters: usize,

    #[serde(default)]
    pub chapters: BTreeMap<String, ChapterState>,

    #[serde(default)]
    pub status: JobStatus,

    #[serde(default = "timestamp_now")]
    pub start_time: String,

    #[serde(default = "timestamp_now")]
    pub last_update: String,
}

impl JobState {
    /// Fresh job with one pending chapter per input chapter
    pub fn new(
        input_ref: impl Into<String>,
        output_ref: impl Into<String>,
        model_id: impl Into<String>,
        target_language: impl Into<String>,
        chapters: &[Chapter],
    ) -> Self {
        let now = timestamp_now();
        let chapters: BTreeMap<String, ChapterState> = chapters
            .iter()
            .enumerate()
            .map(|(index, chapter)| {
                (chapter.id.clone(), ChapterState::new(chapter.id.clone(), chapter.title.clone(), index))
            })
            .collect();

        Self {
            input_ref: input_ref.into(),
            output_ref: output_ref.into(),
            model_id: model_id.into(),
            target_language: target_language.into(),
            total_chapters: chapters.len(),
            completed_chapters: 0,
            chapters,
            status: JobStatus::InProgress,
            start_time: now.clone(),
            last_update: now,
        }
    }

    /// Recompute derived counters from the chapter map
    pub fn recount(&mut self) {
        self.total_chapters = self.chapters.len();
        self.completed_chapters = self
            .chapters
            .values()
            .filter(|c| c.status == ChapterStatus::Completed)
            .count();
    }

    pub fn all_chapters_completed(&self) -> bool {
        self.chapters.values().all(|c| c.status == ChapterStatus::Completed)
    }
}

/// Aggregated view of a job for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub status: JobStatus,
    pub total_chapters: usize,
    pub completed_chapters: usize,
    pub pending_chapters: usize,
    pub in_progress_chapters: usize,
    pub error_chapters: usize,
    pub total_fragments: usize,
    pub completed_fragments: usize,
    /// Fragment completion in percent
    pub progress_percentage: f64,
    pub start_time: String,
    pub last_update: String,
    pub input_ref: String,
    pub output_ref: String,
    pub model_id: String,
    pub target_language: String,
}

impl ProgressSummary {
    pub fn from_job(job: &JobState) -> Self {
        let count = |status: ChapterStatus| job.chapters.values().filter(|c| c.status == status).count();
        let total_fragments: usize = job.chapters.values().map(|c| c.total_fragments).sum();
        let completed_fragments: usize = job.chapters.values().map(|c| c.completed_fragments).sum();

        Self {
            status: job.status,
            total_chapters: job.total_chapters,
            completed_chapters: job.completed_chapters,
            pending_chapters: count(ChapterStatus::Pending),
            in_progress_chapters: count(ChapterStatus::InProgress),
            error_chapters: count(ChapterStatus::Error),
            total_fragments,
            completed_fragments,
            progress_percentage: completed_fragments as f64 / total_fragments.max(1) as f64 * 100.0,
            start_time: job.start_time.clone(),
            last_update: job.last_update.clone(),
            input_ref: job.input_ref.clone(),
            output_ref: job.output_ref.clone(),
            model_id: job.model_id.clone(),
            target_language: job.target_language.clone(),
        }
    }
}
