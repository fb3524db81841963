/*!
 * Tests for fragment splitting and chunk planning
 */

use bookwai::chunker::{ChunkerConfig, TextChunker, context_window_for, estimate_tokens};
use bookwai::extraction::Chapter;
use crate::common;

fn long_text(sentences: usize) -> String {
    (0..sentences)
        .map(|i| format!("Sentence number {} talks about the sea and the wind.", i))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Test that fragments cover the text and overlap by the configured amount
#[test]
fn test_chunkText_withLongText_shouldCoverTextWithOverlap() {
    let text = long_text(80);
    let text_len = text.chars().count();
    let chunker = TextChunker::new(ChunkerConfig::new(500, 50));

    let fragments = chunker.chunk_text(&text, "part3");
    assert!(fragments.len() > 1);

    assert_eq!(fragments[0].start_pos, 0);
    assert_eq!(fragments[0].overlap_start, 0);
    assert_eq!(fragments.last().unwrap().end_pos, text_len);
    assert_eq!(fragments.last().unwrap().overlap_end, 0);

    for (i, pair) in fragments.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        assert_eq!(prev.sequence_id, i);
        assert_eq!(next.start_pos, prev.end_pos - 50, "fragment {} should start inside the overlap", i + 1);
        assert_eq!(next.overlap_start, 50);
        assert_eq!(prev.overlap_end, 50);
        assert!(prev.end_pos - prev.start_pos <= 500 + 50);
    }

    assert!(fragments.iter().all(|f| f.chapter_id == "part3"));
}

/// Test that a sentence end near the target edge is used as the break
#[test]
fn test_chunkText_withSentences_shouldBreakAfterSentenceEnd() {
    let text = long_text(40);
    let chunker = TextChunker::new(ChunkerConfig::new(300, 0));

    let fragments = chunker.chunk_text(&text, "part2");
    for fragment in &fragments[..fragments.len() - 1] {
        assert!(fragment.content.ends_with('.'), "fragment should end on a sentence: {:?}", fragment.content);
    }
}

/// Test that paragraph breaks win over sentence breaks
#[test]
fn test_chunkText_withParagraphs_shouldSplitOnParagraphs() {
    let text = (0..5).map(|i| common::paragraph(i, "")).collect::<Vec<_>>().join("\n\n");
    let chunker = TextChunker::new(ChunkerConfig::new(100, 0));

    let fragments = chunker.chunk_text(&text, "part2");
    assert_eq!(fragments.len(), 5);
    for (i, fragment) in fragments.iter().enumerate() {
        assert_eq!(fragment.content, common::paragraph(i, ""));
    }
}

/// Test that multi-byte text is split on character positions
#[test]
fn test_chunkText_withMultibyteText_shouldNotSplitCharacters() {
    let text = "日本語のテキスト。".repeat(100);
    let chunker = TextChunker::new(ChunkerConfig::new(64, 8));

    let fragments = chunker.chunk_text(&text, "part2");
    assert!(fragments.len() > 1);
    assert_eq!(fragments.last().unwrap().end_pos, text.chars().count());
    assert!(fragments.iter().all(|f| f.content.chars().count() <= 64 + 8));
}

/// Test that text shorter than one chunk stays whole
#[test]
fn test_chunkText_withShortText_shouldReturnOneTrimmedFragment() {
    let chunker = TextChunker::new(ChunkerConfig::new(1000, 100));
    let fragments = chunker.chunk_text("  A short chapter.  ", "part2");

    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].content, "A short chapter.");
    assert_eq!(fragments[0].overlap_end, 0);
}

/// Test chunking of several chapters keeps their order
#[test]
fn test_chunkChapters_withSeveralChapters_shouldKeepOrder() {
    let chapters = common::sample_chapters(3);
    let chunker = TextChunker::default();

    let fragments = chunker.chunk_chapters(&chapters);
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[1][0].chapter_id, "part3");

    let empty = vec![Chapter::new("part9", "Empty", "   ")];
    assert!(chunker.chunk_chapters(&empty)[0].is_empty());
}

/// Test model-aware planning of the chunk size
#[test]
fn test_forModel_withKnownAndUnknownModels_shouldPlanChunkSize() {
    let base = ChunkerConfig::new(4000, 200);

    assert_eq!(context_window_for("GPT-4o-mini"), 128_000);
    assert_eq!(context_window_for("gpt-4-turbo-preview"), 128_000);
    assert_eq!(context_window_for("gpt-4"), 32_000);
    assert_eq!(context_window_for("mistral"), 8_000);

    let local = base.for_model("mistral", None);
    assert_eq!(local.chunk_size, 19_200);
    assert_eq!(local.overlap_size, 200);

    let overridden = base.for_model("gpt-4o", Some(3_000));
    assert_eq!(overridden.chunk_size, 3_200);
    assert_eq!(overridden.overlap_size, 160);

    let tiny = base.for_model("mistral", Some(2_100));
    assert_eq!(tiny.chunk_size, 500);
    assert_eq!(tiny.overlap_size, 25);
}

/// Test the rough token estimate
#[test]
fn test_estimateTokens_withRatio_shouldScaleCharacterCount() {
    assert_eq!(estimate_tokens("abcdefgh", 0.25), 2);
    assert_eq!(estimate_tokens("", 0.25), 0);
    assert_eq!(estimate_tokens("éééé", 0.5), 2);
}
