/*!
 * Output assembly.
 *
 * Rebuilds the translated document from a finished (or partially finished)
 * `JobState`. Only completed chapters are emitted, in the order given by the
 * chapter ordering key rather than completion order.
 */

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::file_utils::{FileManager, sanitize_filename};
use crate::progress::ordering;
use crate::progress::{ChapterState, ChapterStatus, JobState};

const TRANSLATION_NOTE: &str = "*Machine translated*";
const SEPARATOR: &str = "---";

/// Renders and writes the translated book
pub struct OutputAssembler<'a> {
    job: &'a JobState,
}

impl<'a> OutputAssembler<'a> {
    pub fn new(job: &'a JobState) -> Self {
        Self { job }
    }

    /// Completed chapters in output order, metadata excluded
    pub fn ordered_chapters(&self) -> Vec<&'a ChapterState> {
        ordering::ordered_chapters(self.job)
            .into_iter()
            .filter(|chapter| {
                let completed = chapter.status == ChapterStatus::Completed;
                if !completed {
                    warn!("Skipping chapter {} ({})", chapter.chapter_id, chapter.status);
                }
                completed
            })
            .collect()
    }

    /// Translated fragments joined with blank lines
    pub fn chapter_text(chapter: &ChapterState) -> String {
        chapter.translated_text()
    }

    fn chapter_heading(chapter: &ChapterState) -> &str {
        if chapter.title.trim().is_empty() {
            &chapter.chapter_id
        } else {
            chapter.title.trim()
        }
    }

    /// Whole book as Markdown
    pub fn render_markdown(&self, title: &str) -> String {
        let mut out = format!("# {}\n\n{}\n\n{}\n\n", title, TRANSLATION_NOTE, SEPARATOR);

        for chapter in self.ordered_chapters() {
            out.push_str(&format!(
                "## {}\n\n{}\n\n{}\n\n",
                Self::chapter_heading(chapter),
                Self::chapter_text(chapter),
                SEPARATOR
            ));
        }
        out
    }

    /// Write the book atomically. Returns the number of chapters written.
    pub fn write_markdown<P: AsRef<Path>>(&self, path: P, title: &str) -> Result<usize> {
        let path = path.as_ref();
        let rendered = self.render_markdown(title);
        let count = self.ordered_chapters().len();

        FileManager::write_atomic(path, rendered.as_bytes())
            .with_context(|| format!("Failed to write output: {:?}", path))?;
        info!("Wrote {} chapters to {:?}", count, path);
        Ok(count)
    }

    /// One `NNN_<title>.md` file per completed chapter, numbered in output order
    pub fn write_chapter_files<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        FileManager::ensure_dir(dir)?;

        let mut written = Vec::new();
        for (index, chapter) in self.ordered_chapters().into_iter().enumerate() {
            let number = index + 1;
            let heading = Self::chapter_heading(chapter);
            let path = dir.join(format!("{:03}_{}.md", number, sanitize_filename(heading)));
            let content = format!(
                "# {}\n\n*Chapter {} - machine translated*\n\n{}\n\n{}\n",
                heading,
                number,
                SEPARATOR,
                Self::chapter_text(chapter)
            );

            FileManager::write_atomic(&path, content.as_bytes())
                .with_context(|| format!("Failed to write chapter file: {:?}", path))?;
            debug!("Saved chapter file {:?}", path);
            written.push(path);
        }

        info!("Saved {} chapter files to {:?}", written.len(), dir);
        Ok(written)
    }

    /// Delete chapter files written earlier. Returns how many were removed.
    pub fn remove_chapter_files(files: &[PathBuf]) -> Result<usize> {
        let mut removed = 0;
        for file in files {
            if FileManager::remove_if_exists(file).with_context(|| format!("Failed to remove {:?}", file))? {
                removed += 1;
            }
        }
        debug!("Removed {} chapter files", removed);
        Ok(removed)
    }
}
