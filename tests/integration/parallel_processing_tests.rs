/*!
 * Integration tests for the worker pool over a progress store
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bookwai::chunker::{ChunkerConfig, TextChunker};
use bookwai::errors::{ParallelError, TranslationError};
use bookwai::extraction::Chapter;
use bookwai::parallel::{CoordinatorSettings, ParallelCoordinator, ProgressCallback};
use bookwai::progress::{ChapterStatus, JobStatus, ProgressStore};
use bookwai::providers::mock::MockProvider;
use bookwai::translation::TranslationPort;
use crate::common::{self, mock_ports::ScriptedPort};

fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        rate_limit: 0.0,
        validate_connection: true,
    }
}

fn coordinator(store: &Arc<ProgressStore>, chunk_size: usize) -> ParallelCoordinator {
    ParallelCoordinator::new(
        Arc::clone(store),
        TextChunker::new(ChunkerConfig::new(chunk_size, 0)),
        settings(),
    )
}

/// Chapter of five 95-character paragraphs, the third one tagged
fn five_paragraph_chapter(tag: &str) -> Chapter {
    let text = (0..5)
        .map(|i| common::paragraph(i, if i == 2 { tag } else { "" }))
        .collect::<Vec<_>>()
        .join("\n\n");
    Chapter::new("part2", "Five Paragraphs", text)
}

/// Test that a failed fragment keeps its original text and the chapter still completes
#[tokio::test]
async fn test_processChapters_withOneFailingFragment_shouldFallBackToOriginal() {
    common::init_test_logging();
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    let chapter = five_paragraph_chapter("FAILME");
    let chapters = vec![chapter.clone()];
    store.create("book.md", "out.md", "mock-model", "fr", &chapters);

    let mut coordinator = coordinator(&store, 100);
    assert_eq!(
        TextChunker::new(ChunkerConfig::new(100, 0)).chunk_text(&chapter.content, &chapter.id).len(),
        5
    );

    let provider = MockProvider::fail_when_contains("FAILME");
    let port: Arc<dyn TranslationPort> = Arc::new(provider.clone());
    coordinator.create_workers(2, |_| Ok(Arc::clone(&port))).await.unwrap();

    let stats = coordinator.process_chapters(&chapters, false, None).await.unwrap();
    store.finalize().await;

    assert_eq!(stats.chapters_succeeded, 1);
    assert_eq!(stats.fragments_processed, 5);
    assert_eq!(stats.fragment_errors, 1);

    let job = store.snapshot().unwrap();
    let state = &job.chapters["part2"];
    assert_eq!(state.status, ChapterStatus::Completed);
    assert_eq!(state.total_fragments, 5);
    assert_eq!(state.translated_fragments.len(), 5);
    assert_eq!(state.translated_fragments[2], common::paragraph(2, "FAILME"));
    assert_eq!(
        state.translated_fragments[3],
        MockProvider::translated(&common::paragraph(3, ""))
    );
    assert_eq!(job.status, JobStatus::Completed);

    assert_eq!(stats.worker_details[0].last_activity.as_deref(), Some("Completed: Five Paragraphs"));
    assert!(stats.worker_details[0].last_activity_at.is_some());
    assert!(stats.worker_details[1].last_activity.is_none());
}

/// Test that a resumed run only translates unfinished chapters
#[tokio::test]
async fn test_processChapters_withResume_shouldSkipCompletedChapters() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    let chapters = common::sample_chapters(5);
    store.create("book.md", "out.md", "scripted", "fr", &chapters);

    for chapter in &chapters[..2] {
        assert!(store.start_chapter(&chapter.id));
        store.update_chapter_fragment_count(&chapter.id, 1).unwrap();
        store.complete_fragment(&chapter.id, "done earlier").unwrap();
        store.complete_chapter(&chapter.id).unwrap();
    }

    let port = ScriptedPort::new();
    let mut coordinator = coordinator(&store, 1000);
    coordinator.create_workers(3, |_| Ok(port.as_port())).await.unwrap();

    let stats = coordinator.process_chapters(&chapters, true, None).await.unwrap();
    store.finalize().await;

    assert_eq!(stats.chapters_processed, 3);
    assert_eq!(stats.chapters_succeeded, 3);
    assert_eq!(port.calls().len(), 3);
    assert!(!port.calls().iter().any(|text| text.contains("chapter 1.") || text.contains("chapter 2.")));

    let job = store.snapshot().unwrap();
    assert_eq!(job.chapters["part2"].translated_fragments, vec!["done earlier"]);
    assert_eq!(job.completed_chapters, 5);
}

/// Test that failed chapters are picked up again on resume
#[tokio::test]
async fn test_processChapters_withErroredChapter_shouldRetryOnResume() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    let chapters = common::sample_chapters(2);
    store.create("book.md", "out.md", "scripted", "fr", &chapters);

    store.start_chapter("part3");
    store.mark_chapter_error("part3", "earlier crash").unwrap();

    let port = ScriptedPort::new();
    let mut coordinator = coordinator(&store, 1000);
    coordinator.create_workers(1, |_| Ok(port.as_port())).await.unwrap();
    let stats = coordinator.process_chapters(&chapters, true, None).await.unwrap();
    store.finalize().await;

    assert_eq!(stats.chapters_succeeded, 2);
    let job = store.snapshot().unwrap();
    assert_eq!(job.chapters["part3"].status, ChapterStatus::Completed);
    assert!(job.chapters["part3"].error.is_none());
}

/// Test that chapters run in parallel across workers
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_processChapters_withFourWorkers_shouldOverlapChapters() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    let chapters = common::sample_chapters(8);
    store.create("book.md", "out.md", "scripted", "fr", &chapters);

    let port = ScriptedPort::new().with_delay(Duration::from_millis(100));
    let mut coordinator = coordinator(&store, 1000);
    assert_eq!(coordinator.create_workers(4, |_| Ok(port.as_port())).await.unwrap(), 4);

    let started = Instant::now();
    let stats = coordinator.process_chapters(&chapters, false, None).await.unwrap();
    let elapsed = started.elapsed();
    store.finalize().await;

    assert_eq!(stats.chapters_succeeded, 8);
    assert_eq!(stats.workers_used, 4);
    assert!(elapsed < Duration::from_millis(700), "8 chapters took {:?}", elapsed);

    let per_worker: usize = stats.worker_details.iter().map(|w| w.chapters_processed).sum();
    assert_eq!(per_worker, 8);
    assert!(stats.worker_details.iter().all(|w| w.chapters_processed == 2));
}

/// Test that the progress callback fires once per fragment
#[tokio::test]
async fn test_processChapters_withCallback_shouldReportEveryFragment() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    let chapters = vec![five_paragraph_chapter("x"), Chapter::new("part3", "Short", "Tiny.")];
    store.create("book.md", "out.md", "scripted", "fr", &chapters);

    let port = ScriptedPort::new();
    let mut coordinator = coordinator(&store, 100);
    coordinator.create_workers(2, |_| Ok(port.as_port())).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let last_of_part2 = Arc::new(AtomicUsize::new(0));
    let callback: ProgressCallback = {
        let calls = Arc::clone(&calls);
        let last_of_part2 = Arc::clone(&last_of_part2);
        Arc::new(move |_worker, chapter_id, completed, total| {
            calls.fetch_add(1, Ordering::SeqCst);
            if chapter_id == "part2" {
                assert_eq!(total, 5);
                last_of_part2.fetch_max(completed, Ordering::SeqCst);
            }
        })
    };

    coordinator.process_chapters(&chapters, false, Some(callback)).await.unwrap();
    store.finalize().await;

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(last_of_part2.load(Ordering::SeqCst), 5);
}

/// Test that a failed connectivity check refuses to build the pool
#[tokio::test]
async fn test_createWorkers_withConnectionDown_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    let port = ScriptedPort::new().with_connection_down();
    let mut coordinator = coordinator(&store, 1000);

    let result = coordinator.create_workers(2, |_| Ok(port.as_port())).await;
    assert!(matches!(result, Err(ParallelError::ConnectionCheckFailed(_))));
    assert_eq!(coordinator.worker_count(), 0);

    let chapters = common::sample_chapters(1);
    let result = coordinator.process_chapters(&chapters, false, None).await;
    assert!(matches!(result, Err(ParallelError::NoWorkers)));
    store.finalize().await;
}

/// Test that a factory failure names the worker
#[tokio::test]
async fn test_createWorkers_withFactoryError_shouldReportWorker() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    let mut coordinator = coordinator(&store, 1000);

    let result = coordinator
        .create_workers(3, |worker_id| {
            if worker_id == 1 {
                Err(TranslationError::Configuration("no key".to_string()))
            } else {
                Ok(ScriptedPort::new().as_port())
            }
        })
        .await;

    assert!(matches!(result, Err(ParallelError::WorkerSetup { worker_id: 1, .. })));
    store.finalize().await;
}

/// Test that a chapter of only whitespace completes without requests
#[tokio::test]
async fn test_processChapters_withEmptyChapter_shouldCompleteWithoutRequests() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    let chapters = vec![Chapter::new("part2", "Blank", "  \n\n  ")];
    store.create("book.md", "out.md", "scripted", "fr", &chapters);

    let port = ScriptedPort::new();
    let mut coordinator = coordinator(&store, 1000);
    coordinator.create_workers(1, |_| Ok(port.as_port())).await.unwrap();
    let stats = coordinator.process_chapters(&chapters, false, None).await.unwrap();
    store.finalize().await;

    assert_eq!(stats.chapters_succeeded, 1);
    assert!(port.calls().is_empty());
    assert_eq!(store.snapshot().unwrap().chapters["part2"].status, ChapterStatus::Completed);
}

/// Test that dropping the processing future stops all translation work
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_processChapters_whenDropped_shouldStopCallingPort() {
    let dir = common::create_temp_dir().unwrap();
    let store = common::create_store(dir.path());
    let chapters = common::sample_chapters(6);
    store.create("book.md", "out.md", "scripted", "fr", &chapters);

    let port = ScriptedPort::new().with_delay(Duration::from_millis(200));
    let mut coordinator = coordinator(&store, 1000);
    coordinator.create_workers(2, |_| Ok(port.as_port())).await.unwrap();

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        coordinator.process_chapters(&chapters, false, None),
    )
    .await;
    assert!(result.is_err());

    let calls_at_drop = port.calls().len();
    assert_eq!(calls_at_drop, 2);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(port.calls().len(), calls_at_drop);

    let job = store.snapshot().unwrap();
    assert_eq!(job.completed_chapters, 0);
    store.finalize().await;
}
