/*!
 * Tests for the output order of chapters
 */

use bookwai::extraction::{Chapter, TextExtractor};
use bookwai::progress::{JobState, order_key, ordered_chapters};

/// Test the group and flag derived from each id shape
#[test]
fn test_orderKey_withIdShapes_shouldDeriveGroupAndFlag() {
    assert_eq!(order_key("part5", 0), (0, 5, 0, 0));
    assert_eq!(order_key("part12", 1), (0, 12, 2, 1));
    assert_eq!(order_key("part122", 2), (0, 12, 0, 2));
    assert_eq!(order_key("part121", 3), (0, 12, 1, 3));
    assert_eq!(order_key("chapter-x", 7), (1, 0, 0, 7));
}

/// Test ordering of a job that finished out of order
#[test]
fn test_orderedChapters_withMixedIds_shouldSortByGroupThenHeader() {
    let chapters = vec![
        Chapter::new("part1", "Metadata", ""),
        Chapter::new("part131", "Chapter B", ""),
        Chapter::new("part121", "Chapter A", ""),
        Chapter::new("part132", "Part Two", ""),
        Chapter::new("part5", "Preface", ""),
        Chapter::new("part122", "Part One", ""),
    ];
    let job = JobState::new("in.json", "out.md", "mock", "fr", &chapters);

    let ids: Vec<&str> = ordered_chapters(&job).iter().map(|c| c.chapter_id.as_str()).collect();
    assert_eq!(ids, vec!["part5", "part122", "part121", "part132", "part131"]);
}

/// Test that foreign ids keep their original positions
#[test]
fn test_orderedChapters_withForeignIds_shouldKeepOriginalOrder() {
    let chapters = vec![
        Chapter::new("intro", "Intro", ""),
        Chapter::new("body", "Body", ""),
        Chapter::new("outro", "Outro", ""),
    ];
    let job = JobState::new("in.json", "out.md", "mock", "fr", &chapters);

    let ids: Vec<&str> = ordered_chapters(&job).iter().map(|c| c.chapter_id.as_str()).collect();
    assert_eq!(ids, vec!["intro", "body", "outro"]);
}

/// Test that ids outside the part scheme never interleave with part groups
#[test]
fn test_orderedChapters_withMixedSchemes_shouldPlaceSourceOrderedIdsAfterParts() {
    let chapters: Vec<Chapter> = ["part122", "appendix", "part121", "cover", "part5"]
        .iter()
        .map(|id| Chapter::new(*id, *id, ""))
        .collect();
    let job = JobState::new("in.json", "out.md", "mock", "fr", &chapters);

    let ids: Vec<&str> = ordered_chapters(&job).iter().map(|c| c.chapter_id.as_str()).collect();
    assert_eq!(ids, vec!["part5", "part122", "part121", "appendix", "cover"]);
}

/// Test that a split text book with over a hundred headings keeps its source order
#[test]
fn test_orderedChapters_withLongTextBook_shouldFollowHeadingOrder() {
    let text: String = (1..=120)
        .map(|i| format!("# Chapter {}

Body {}.

", i, i))
        .collect();
    let chapters = TextExtractor.split(&format!("Front matter

{}", text), "Book");
    assert_eq!(chapters.len(), 121);
    let job = JobState::new("in.md", "out.md", "mock", "fr", &chapters);

    let titles: Vec<&str> = ordered_chapters(&job).iter().map(|c| c.title.as_str()).collect();
    let expected: Vec<String> = (1..=120).map(|i| format!("Chapter {}", i)).collect();
    assert_eq!(titles, expected);
}
