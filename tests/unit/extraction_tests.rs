/*!
 * Tests for chapter extraction from input files
 */

use std::path::Path;

use bookwai::errors::ExtractionError;
use bookwai::extraction::{Chapter, InputFormat, create_extractor, detect_format};
use crate::common;

/// Test format detection by extension
#[test]
fn test_detectFormat_withExtensions_shouldMapFormats() {
    assert_eq!(detect_format(Path::new("book.JSON")).unwrap(), InputFormat::Json);
    assert_eq!(detect_format(Path::new("a/b/novel.md")).unwrap(), InputFormat::Markdown);
    assert_eq!(detect_format(Path::new("notes.txt")).unwrap(), InputFormat::Text);
    assert_eq!(detect_format(Path::new("scan.pdf")).unwrap(), InputFormat::Pdf);
    assert!(matches!(
        detect_format(Path::new("archive.zip")),
        Err(ExtractionError::UnsupportedFormat(_))
    ));
}

/// Test reading a JSON chapter list
#[test]
fn test_extract_withJsonFile_shouldKeepChapterOrder() {
    let dir = common::create_temp_dir().unwrap();
    let chapters = vec![
        Chapter::new("part1", "Metadata", "Title page"),
        Chapter::new("part122", "Part One", "Header"),
        Chapter::new("part121", "Opening", "It was a dark night."),
    ];
    let json = serde_json::to_string(&chapters).unwrap();
    let path = common::create_test_file(dir.path(), "book.json", &json).unwrap();

    let extracted = create_extractor(&path, None).unwrap().extract(&path).unwrap();
    assert_eq!(extracted, chapters);
}

/// Test reading a Markdown book with front matter
#[test]
fn test_extract_withMarkdownFile_shouldReserveFrontMatter() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_book(dir.path(), "novel.md", 3).unwrap();

    let chapters = create_extractor(&path, None).unwrap().extract(&path).unwrap();
    let ids: Vec<&str> = chapters.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["part1", "chapter1", "chapter2", "chapter3"]);
    assert_eq!(chapters[0].title, "novel");
    assert_eq!(chapters[2].title, "Chapter 2");
    assert!(chapters[2].content.starts_with("First paragraph of chapter 2."));
}

/// Test that a format override beats the extension
#[test]
fn test_createExtractor_withOverride_shouldIgnoreExtension() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "book.data", "# Only\nText").unwrap();

    assert!(create_extractor(&path, None).is_err());
    let chapters = create_extractor(&path, Some("md")).unwrap().extract(&path).unwrap();
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].id, "chapter1");
}

/// Test that malformed JSON is a parse error
#[test]
fn test_extract_withMalformedJson_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "book.json", "[{\"id\": 1}]").unwrap();

    let result = create_extractor(&path, None).unwrap().extract(&path);
    assert!(matches!(result, Err(ExtractionError::Parse(_))));
}
