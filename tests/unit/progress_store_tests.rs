/*!
 * Tests for the persistent progress store
 */

use std::sync::Arc;
use std::time::Duration;

use bookwai::progress::{ChapterStatus, JobState, JobStatus, ProgressStore, WriterTiming};
use crate::common;

fn read_state(store: &ProgressStore) -> JobState {
    let raw = std::fs::read_to_string(store.path()).unwrap();
    serde_json::from_str(&raw).unwrap()
}

/// Test that finalize flushes fragment updates still inside the debounce window
#[tokio::test]
async fn test_finalize_withPendingNormalSaves_shouldLoseNothing() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("book.md.progress.json");
    let store = ProgressStore::new(&path, WriterTiming::default());
    store.create("book.md", "out.md", "mock", "fr", &common::sample_chapters(2));

    assert!(store.start_chapter("part2"));
    store.update_chapter_fragment_count("part2", 3).unwrap();
    for text in ["un", "deux", "trois"] {
        store.complete_fragment("part2", text).unwrap();
    }
    store.complete_chapter("part2").unwrap();
    assert!(store.start_chapter("part3"));
    store.complete_fragment("part3", "quatre").unwrap();

    store.finalize().await;

    let job = read_state(&store);
    assert_eq!(job.chapters["part2"].status, ChapterStatus::Completed);
    assert_eq!(job.chapters["part2"].translated_fragments, vec!["un", "deux", "trois"]);
    assert_eq!(job.chapters["part3"].translated_fragments, vec!["quatre"]);
    assert_eq!(job.completed_chapters, 1);
}

/// Test that a reload demotes interrupted chapters and keeps finished ones
#[tokio::test]
async fn test_load_afterInterruption_shouldDemoteInProgressChapters() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("state.json");

    let first = ProgressStore::new(&path, common::fast_timing());
    first.create("book.md", "out.md", "mock", "fr", &common::sample_chapters(3));
    first.start_chapter("part2");
    first.update_chapter_fragment_count("part2", 1).unwrap();
    first.complete_fragment("part2", "fait").unwrap();
    first.complete_chapter("part2").unwrap();
    first.start_chapter("part3");
    first.update_chapter_fragment_count("part3", 4).unwrap();
    first.complete_fragment("part3", "moitié").unwrap();
    first.finalize().await;

    let second = ProgressStore::new(&path, common::fast_timing());
    let job = second.load().unwrap().expect("state file should exist");

    let interrupted = &job.chapters["part3"];
    assert_eq!(interrupted.status, ChapterStatus::Pending);
    assert!(interrupted.translated_fragments.is_empty());
    assert_eq!(interrupted.completed_fragments, 0);
    assert!(interrupted.start_time.is_none());

    assert_eq!(job.chapters["part2"].status, ChapterStatus::Completed);
    assert_eq!(job.completed_chapters, 1);

    let pending: Vec<String> = second.pending_chapter_ids().into_iter().collect();
    assert_eq!(pending, vec!["part3", "part4"]);
    second.finalize().await;
}

/// Test the resume check against run identity and job status
#[tokio::test]
async fn test_canResume_withDifferentRunParameters_shouldRefuse() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    assert!(!store.can_resume("book.md", "mock", "fr"));

    store.create("book.md", "out.md", "mock", "fr", &common::sample_chapters(2));
    assert!(store.can_resume("book.md", "mock", "fr"));
    assert!(!store.can_resume("other.md", "mock", "fr"));
    assert!(!store.can_resume("book.md", "gpt-4o", "fr"));
    assert!(!store.can_resume("book.md", "mock", "de"));

    store.set_job_status(JobStatus::Paused).unwrap();
    assert!(store.can_resume("book.md", "mock", "fr"));

    store.set_job_status(JobStatus::Error).unwrap();
    assert!(!store.can_resume("book.md", "mock", "fr"));
    store.finalize().await;
}

/// Test the invalid transitions of the chapter state machine
#[tokio::test]
async fn test_transitions_fromWrongStatus_shouldBeRejected() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    store.create("book.md", "out.md", "mock", "fr", &common::sample_chapters(1));

    assert!(store.complete_chapter("part2").is_err());
    assert!(store.complete_fragment("missing", "x").is_err());

    store.start_chapter("part2");
    store.complete_chapter("part2").unwrap();
    assert!(store.mark_chapter_error("part2", "late failure").is_err());
    assert!(store.update_chapter_fragment_count("part2", 9).is_err());
    assert!(!store.start_chapter("part2"));

    let job = store.snapshot().unwrap();
    assert_eq!(job.chapters["part2"].status, ChapterStatus::Completed);
    assert_eq!(job.status, JobStatus::Completed);
    store.finalize().await;
}

/// Test the summary counters
#[tokio::test]
async fn test_summary_withMixedChapters_shouldCountStatusesAndFragments() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    store.create("book.md", "out.md", "mock", "fr", &common::sample_chapters(4));

    store.start_chapter("part2");
    store.update_chapter_fragment_count("part2", 2).unwrap();
    store.complete_fragment("part2", "a").unwrap();
    store.complete_fragment("part2", "b").unwrap();
    store.complete_chapter("part2").unwrap();

    store.start_chapter("part3");
    store.update_chapter_fragment_count("part3", 2).unwrap();
    store.complete_fragment("part3", "c").unwrap();

    store.start_chapter("part4");
    store.mark_chapter_error("part4", "boom").unwrap();

    let summary = store.summary().unwrap();
    assert_eq!(summary.total_chapters, 4);
    assert_eq!(summary.completed_chapters, 1);
    assert_eq!(summary.in_progress_chapters, 1);
    assert_eq!(summary.error_chapters, 1);
    assert_eq!(summary.pending_chapters, 1);
    assert_eq!(summary.total_fragments, 4);
    assert_eq!(summary.completed_fragments, 3);
    assert!((summary.progress_percentage - 75.0).abs() < 1e-9);
    store.finalize().await;
}

/// Test that normal saves land once the debounce window has passed
#[tokio::test]
async fn test_normalSaves_afterDebounce_shouldPersistLatestState() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    store.create("book.md", "out.md", "mock", "fr", &common::sample_chapters(1));
    store.start_chapter("part2");
    for i in 0..20 {
        store.complete_fragment("part2", &format!("fragment {}", i)).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(400)).await;
    let job = read_state(&store);
    assert_eq!(job.chapters["part2"].translated_fragments.len(), 20);
    assert_eq!(job.chapters["part2"].completed_fragments, 20);
    store.finalize().await;
}

/// Test concurrent chapter updates from several tasks
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrentWorkers_shouldKeepEveryChapterConsistent() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    let chapters = common::sample_chapters(8);
    store.create("book.md", "out.md", "mock", "fr", &chapters);

    let handles: Vec<_> = chapters
        .iter()
        .map(|chapter| {
            let store = Arc::clone(&store);
            let id = chapter.id.clone();
            tokio::spawn(async move {
                assert!(store.start_chapter(&id));
                store.update_chapter_fragment_count(&id, 10).unwrap();
                for i in 0..10 {
                    store.complete_fragment(&id, &format!("{}-{}", id, i)).unwrap();
                    tokio::task::yield_now().await;
                }
                store.complete_chapter(&id).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    store.finalize().await;

    let job = read_state(&store);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.completed_chapters, 8);
    for chapter in job.chapters.values() {
        assert_eq!(chapter.translated_fragments.len(), 10);
        assert_eq!(chapter.translated_fragments[9], format!("{}-9", chapter.chapter_id));
    }
}

/// Test that reset forgets the job and removes the file
#[tokio::test]
async fn test_reset_afterSave_shouldRemoveStateFile() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    store.create("book.md", "out.md", "mock", "fr", &common::sample_chapters(1));
    store.save_now().await;
    assert!(store.path().exists());
    // let the queued creation save land first
    tokio::time::sleep(Duration::from_millis(100)).await;

    store.reset().unwrap();
    assert!(!store.path().exists());
    assert!(store.snapshot().is_none());
    store.finalize().await;
    assert!(!store.path().exists());
}
