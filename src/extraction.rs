/*!
 * Chapter extraction from input documents.
 *
 * The translation core only needs an ordered list of chapters. This module
 * reads that list from pre-extracted JSON books and from plain text or
 * Markdown files. Binary EPUB and PDF containers are reported as unsupported.
 */

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ExtractionError;

/// Level one or two Markdown heading at the start of a line
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,2}[ \t]+(.+?)[ \t]*#*[ \t]*$").unwrap());

/// One unit of extraction: an EPUB section, a PDF page or a text chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl Chapter {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Input formats recognized by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Text,
    Markdown,
    Epub,
    Pdf,
}

impl std::str::FromStr for InputFormat {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "txt" | "text" => Ok(Self::Text),
            "md" | "markdown" => Ok(Self::Markdown),
            "epub" => Ok(Self::Epub),
            "pdf" => Ok(Self::Pdf),
            other => Err(ExtractionError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Reads an ordered list of chapters from a document
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Vec<Chapter>, ExtractionError>;
}

/// Reads a JSON array of `{id, title, content}` objects
#[derive(Debug, Default)]
pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<Chapter>, ExtractionError> {
        let raw = std::fs::read_to_string(path)?;
        let chapters: Vec<Chapter> =
            serde_json::from_str(&raw).map_err(|e| ExtractionError::Parse(e.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        for chapter in &chapters {
            if !seen.insert(chapter.id.as_str()) {
                return Err(ExtractionError::Parse(format!("duplicate chapter id: {}", chapter.id)));
            }
        }

        info!("Extracted {} chapters from {:?}", chapters.len(), path);
        Ok(chapters)
    }
}

/// Splits plain text or Markdown on level one and two headings
#[derive(Debug, Default)]
pub struct TextExtractor;

impl TextExtractor {
    /// Split already loaded text. `fallback_title` names a heading-less document.
    ///
    /// Front matter before the first heading becomes the `part1` metadata
    /// chapter. Body chapters get `chapter1..` ids, which sit outside the
    /// banded `partN` scheme and are assembled in source order.
    pub fn split(&self, text: &str, fallback_title: &str) -> Vec<Chapter> {
        let headings: Vec<(usize, usize, String)> = HEADING
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let title = caps.get(1)?.as_str().trim().to_string();
                Some((whole.start(), whole.end(), title))
            })
            .collect();

        if headings.is_empty() {
            if text.trim().is_empty() {
                return Vec::new();
            }
            return vec![Chapter::new("chapter1", fallback_title, text.trim())];
        }

        let mut chapters = Vec::with_capacity(headings.len() + 1);
        let preamble = text[..headings[0].0].trim();
        if !preamble.is_empty() {
            chapters.push(Chapter::new("part1", fallback_title, preamble));
        }

        for (i, (_, body_start, title)) in headings.iter().enumerate() {
            let body_end = headings.get(i + 1).map(|h| h.0).unwrap_or(text.len());
            chapters.push(Chapter::new(
                format!("chapter{}", i + 1),
                title.clone(),
                text[*body_start..body_end].trim(),
            ));
        }
        chapters
    }
}

impl Extractor for TextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<Chapter>, ExtractionError> {
        let text = std::fs::read_to_string(path)?;
        let fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string());

        let chapters = self.split(&text, &fallback);
        debug!("Split {:?} into {} chapters", path, chapters.len());
        Ok(chapters)
    }
}

/// Detect the input format from the file extension
pub fn detect_format(path: &Path) -> Result<InputFormat, ExtractionError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .ok_or_else(|| ExtractionError::UnsupportedFormat(format!("{:?} has no extension", path)))?;
    extension.parse()
}

/// Build the extractor for `path`, honouring an explicit format override
pub fn create_extractor(path: &Path, format_override: Option<&str>) -> Result<Box<dyn Extractor>, ExtractionError> {
    let format = match format_override {
        Some(format) => format.parse()?,
        None => detect_format(path)?,
    };

    match format {
        InputFormat::Json => Ok(Box::new(JsonExtractor)),
        InputFormat::Text | InputFormat::Markdown => Ok(Box::new(TextExtractor)),
        InputFormat::Epub | InputFormat::Pdf => Err(ExtractionError::UnsupportedFormat(format!(
            "{:?} containers must be converted to JSON chapters first",
            format
        ))),
    }
}
