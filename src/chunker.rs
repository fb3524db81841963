/*!
 * Text chunking engine.
 *
 * Splits chapter text into ordered fragments that fit a model's context
 * window. Fragments end on paragraph or sentence boundaries when one is close
 * to the target edge, and adjacent fragments share `overlap_size` characters.
 *
 * All positions are character offsets, never byte offsets.
 */

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extraction::Chapter;

/// Blank line between paragraphs
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// End of sentence followed by whitespace
static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());

/// Context windows in tokens, matched as case-insensitive substrings of the model id.
/// The longest matching key wins so `gpt-4-turbo` is not shadowed by `gpt-4`.
const MODEL_CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("gpt-3.5", 16_000),
    ("gpt-4", 32_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4o", 128_000),
    ("gpt-5", 200_000),
    ("claude-3", 200_000),
    ("claude-3.5", 200_000),
];

const DEFAULT_CONTEXT_WINDOW: usize = 8_000;

/// Tokens kept free for the system prompt and the response
const RESERVED_TOKENS: usize = 2_000;

const CHARS_PER_TOKEN: usize = 4;

const SAFETY_FACTOR: f64 = 0.8;

/// Smallest chunk size a model plan may produce
const MIN_CHUNK_SIZE: usize = 500;

/// Upper bound of the natural-break search radius
const MAX_SEARCH_WINDOW: usize = 200;

/// Default characters-to-tokens ratio used for planning
pub const DEFAULT_TOKEN_RATIO: f64 = 0.25;

/// A bounded slice of chapter text sent as one translation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment {
    /// Stripped fragment text
    pub content: String,
    /// Character offset where the fragment window starts
    pub start_pos: usize,
    /// Character offset where the fragment window ends (exclusive)
    pub end_pos: usize,
    /// 0-based position of the fragment within its chapter
    pub sequence_id: usize,
    /// Chapter the fragment belongs to
    pub chapter_id: String,
    /// Characters shared with the previous fragment
    pub overlap_start: usize,
    /// Characters shared with the next fragment
    pub overlap_end: usize,
}

/// Immutable chunking parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Target fragment size in characters
    pub chunk_size: usize,
    /// Characters repeated between adjacent fragments
    pub overlap_size: usize,
    /// Allow breaking on sentence boundaries
    pub preserve_sentences: bool,
    /// Allow breaking on paragraph boundaries
    pub preserve_paragraphs: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4_000,
            overlap_size: 200,
            preserve_sentences: true,
            preserve_paragraphs: true,
        }
    }
}

impl ChunkerConfig {
    /// Create a config with the given sizes and both break kinds enabled
    pub fn new(chunk_size: usize, overlap_size: usize) -> Self {
        Self {
            chunk_size,
            overlap_size,
            ..Self::default()
        }
    }

    /// Plan a config sized for `model_id`.
    ///
    /// `context_window` overrides the table lookup. The returned config keeps
    /// the break preferences of `self`; when the size changes the overlap is
    /// clamped to a twentieth of the new size.
    pub fn for_model(&self, model_id: &str, context_window: Option<usize>) -> ChunkerConfig {
        let window = context_window
            .filter(|w| *w > 0)
            .unwrap_or_else(|| context_window_for(model_id));

        let available_tokens = window.saturating_sub(RESERVED_TOKENS);
        let planned = (available_tokens as f64 * CHARS_PER_TOKEN as f64 * SAFETY_FACTOR) as usize;
        let chunk_size = planned.max(MIN_CHUNK_SIZE);

        if chunk_size == self.chunk_size {
            return self.clone();
        }

        let overlap_size = self.overlap_size.min(chunk_size / 20);
        info!(
            "Chunk size for model {} set to {} chars (was {}), overlap {}",
            model_id, chunk_size, self.chunk_size, overlap_size
        );

        ChunkerConfig {
            chunk_size,
            overlap_size,
            preserve_sentences: self.preserve_sentences,
            preserve_paragraphs: self.preserve_paragraphs,
        }
    }
}

/// Look up the context window for a model id, falling back to a conservative default
pub fn context_window_for(model_id: &str) -> usize {
    let model = model_id.to_lowercase();
    MODEL_CONTEXT_WINDOWS
        .iter()
        .filter(|(key, _)| model.contains(key))
        .max_by_key(|(key, _)| key.len())
        .map(|(_, window)| *window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

/// Rough token estimate used for planning only
pub fn estimate_tokens(text: &str, ratio: f64) -> usize {
    (text.chars().count() as f64 * ratio).floor() as usize
}

/// Splits chapter text into overlap-annotated fragments
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split one chapter into ordered fragments
    pub fn chunk_text(&self, text: &str, chapter_id: &str) -> Vec<TextFragment> {
        if text.trim().is_empty() {
            debug!("Chapter {} is empty, no fragments produced", chapter_id);
            return Vec::new();
        }

        let index = CharIndex::new(text);
        let text_len = index.char_len();
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.overlap_size;

        let mut fragments: Vec<TextFragment> = Vec::new();
        let mut current = 0usize;
        let mut natural_breaks = 0usize;
        let mut forced_breaks = 0usize;

        while current < text_len {
            let target_end = (current + chunk_size).min(text_len);
            let mut end = target_end;

            if end < text_len {
                end = self.find_natural_break(text, &index, current, target_end);
                if end != target_end {
                    natural_breaks += 1;
                } else {
                    forced_breaks += 1;
                }
            }

            let content = index.slice(text, current, end).trim();
            if content.is_empty() {
                debug!("Skipping empty fragment at position {} in {}", current, chapter_id);
            } else {
                let overlap_start = if fragments.is_empty() { 0 } else { overlap.min(current) };
                let overlap_end = if end < text_len { overlap } else { 0 };

                fragments.push(TextFragment {
                    content: content.to_string(),
                    start_pos: current,
                    end_pos: end,
                    sequence_id: fragments.len(),
                    chapter_id: chapter_id.to_string(),
                    overlap_start,
                    overlap_end,
                });
            }

            if end >= text_len {
                break;
            }

            let next = end.saturating_sub(overlap);
            current = if next <= current { current + 1 } else { next };
        }

        debug!(
            "Chapter {}: {} chars -> {} fragments ({} natural, {} forced breaks)",
            chapter_id,
            text_len,
            fragments.len(),
            natural_breaks,
            forced_breaks
        );

        fragments
    }

    /// Chunk every chapter, keeping chapter order
    pub fn chunk_chapters(&self, chapters: &[Chapter]) -> Vec<Vec<TextFragment>> {
        chapters
            .iter()
            .map(|chapter| self.chunk_text(&chapter.content, &chapter.id))
            .collect()
    }

    /// Find the best break near `target_end`, or return `target_end` unchanged
    fn find_natural_break(&self, text: &str, index: &CharIndex, start: usize, target_end: usize) -> usize {
        let window = MAX_SEARCH_WINDOW.min(self.config.chunk_size / 10);
        let search_start = target_end.saturating_sub(window).max(start);
        let search_end = (target_end + window).min(index.char_len());

        let haystack = index.slice(text, search_start, search_end);
        let base = index.byte_at(search_start);

        let closest = |pattern: &Regex| -> Option<usize> {
            pattern
                .find_iter(haystack)
                .map(|m| index.char_at(base + m.end()))
                .min_by_key(|pos| pos.abs_diff(target_end))
        };

        if self.config.preserve_paragraphs {
            if let Some(pos) = closest(&PARAGRAPH_BREAK) {
                return pos;
            }
        }

        if self.config.preserve_sentences {
            if let Some(pos) = closest(&SENTENCE_BREAK) {
                return pos;
            }
        }

        target_end
    }
}

/// Maps character offsets to byte offsets for one text
struct CharIndex {
    /// Byte offset of every char, followed by the total byte length
    boundaries: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { boundaries }
    }

    fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    fn byte_at(&self, char_pos: usize) -> usize {
        self.boundaries[char_pos.min(self.char_len())]
    }

    /// Char offset of a byte offset that sits on a char boundary
    fn char_at(&self, byte_pos: usize) -> usize {
        match self.boundaries.binary_search(&byte_pos) {
            Ok(pos) | Err(pos) => pos,
        }
    }

    fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> &'a str {
        &text[self.byte_at(start)..self.byte_at(end)]
    }
}
