//! End-to-end download jobs driven through the service with a shell script
//! standing in for the download tool.
//!
//! The tool is invoked as `sh -c <script> -u <link> -d <dir>`, so inside the
//! script `$1` is the link and `$3` is the destination directory.
#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use plexdl_core::testing::fixtures::{self, session};
use plexdl_core::testing::{MockPermissions, MockPostProcessor};
use plexdl_core::{
    ContentKind, DownloadQueue, DownloadRequest, DownloadService, JobEvent, JobOutcome,
    LibraryPostProcessor, PostProcessError, ProcessRunner,
};

struct Harness {
    service: DownloadService,
    post: Arc<MockPostProcessor>,
    permissions: Arc<MockPermissions>,
    _root: TempDir,
}

fn harness(script: &str) -> Harness {
    let root = TempDir::new().unwrap();
    let mut config = fixtures::config(root.path(), "sh");
    config.download.args = vec!["-c".to_string(), script.to_string()];

    let runner = ProcessRunner::new(config.runner.clone(), config.progress.clone());
    let post = Arc::new(MockPostProcessor::new());
    let permissions = Arc::new(MockPermissions::new());
    let service = DownloadService::with_components(
        config,
        DownloadQueue::new(),
        Arc::new(runner),
        post.clone(),
        permissions.clone(),
    );
    Harness {
        service,
        post,
        permissions,
        _root: root,
    }
}

/// Collect events until `count` jobs have finished.
async fn finished(rx: &mut broadcast::Receiver<JobEvent>, count: usize) -> Vec<JobEvent> {
    let mut events = Vec::new();
    let mut done = 0;
    tokio::time::timeout(Duration::from_secs(10), async {
        while done < count {
            let event = rx.recv().await.unwrap();
            if matches!(event, JobEvent::Finished { .. }) {
                done += 1;
            }
            events.push(event);
        }
    })
    .await
    .expect("jobs did not finish in time");
    events
}

fn outcomes(events: &[JobEvent]) -> Vec<JobOutcome> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Finished { outcome, .. } => Some(outcome.clone()),
            _ => None,
        })
        .collect()
}

fn library_root(service: &DownloadService, kind: ContentKind) -> &Path {
    &service.config().library(kind.as_str()).unwrap().root
}

#[tokio::test]
async fn test_successful_download_is_post_processed() {
    let h = harness("echo 50%; echo ok > \"$3/movie.mkv\"; echo 100%");
    let mut rx = h.service.subscribe();

    let request = DownloadRequest::new("s", "movies", "https://t.me/c/1/2", "Heat").with_year(1995);
    h.service.submit(request).await.unwrap();
    let events = finished(&mut rx, 1).await;

    assert!(matches!(events[0], JobEvent::Started { .. }));
    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress { update, .. } => Some(update.percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![50, 100]);
    assert_eq!(
        outcomes(&events),
        vec![JobOutcome::Completed {
            post_processed: true
        }]
    );

    let destination = library_root(&h.service, ContentKind::Movies).join("Heat (1995)");
    assert!(destination.join("movie.mkv").exists());

    let calls = h.post.recorded_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request.path, destination);
    assert_eq!(calls[0].request.title, "Heat (1995)");
    assert_eq!(calls[0].request.kind, ContentKind::Movies);
    assert_eq!(h.permissions.recorded_paths().await, vec![destination]);
}

#[tokio::test]
async fn test_post_processing_waits_for_last_part_of_content() {
    // Parts block until the test drops a go file next to the content root.
    let h = harness(
        "while [ ! -f \"$3/../go\" ]; do sleep 0.05; done; echo ok > \"$3/part-$1.mkv\"",
    );
    let mut rx = h.service.subscribe();

    let first = DownloadRequest::new("s", "series", "one", "Dark").with_season(1);
    let second = DownloadRequest::new("s", "series", "two", "Dark").with_season(2);
    h.service.submit(first).await.unwrap();
    h.service.submit(second).await.unwrap();

    let content_root = library_root(&h.service, ContentKind::Series).join("Dark");
    std::fs::write(content_root.join("go"), b"").unwrap();

    let events = finished(&mut rx, 2).await;
    assert_eq!(
        outcomes(&events),
        vec![
            JobOutcome::Completed {
                post_processed: false
            },
            JobOutcome::Completed {
                post_processed: true
            },
        ]
    );

    // The deferred first season is processed together with the last part.
    let calls = h.post.recorded_calls().await;
    let processed: Vec<_> = calls
        .iter()
        .map(|c| (c.request.path.clone(), c.request.season_hint))
        .collect();
    assert_eq!(
        processed,
        vec![
            (content_root.join("Season 01"), Some(1)),
            (content_root.join("Season 02"), Some(2)),
        ]
    );
    // Permissions run after every part.
    assert_eq!(h.permissions.recorded_paths().await.len(), 2);
}

#[tokio::test]
async fn test_every_season_renamed_after_last_part() {
    let root = TempDir::new().unwrap();
    let mut config = fixtures::config(root.path(), "sh");
    config.download.args = vec![
        "-c".to_string(),
        "while [ ! -f \"$3/../go\" ]; do sleep 0.05; done; echo ok > \"$3/Dark.$1.mkv\"".to_string(),
    ];
    let runner = ProcessRunner::new(config.runner.clone(), config.progress.clone());
    let post_processor = LibraryPostProcessor::new(config.post_process.clone());
    let service = DownloadService::with_components(
        config,
        DownloadQueue::new(),
        Arc::new(runner),
        Arc::new(post_processor),
        Arc::new(MockPermissions::new()),
    );
    let mut rx = service.subscribe();

    service
        .submit(DownloadRequest::new("s", "series", "S01E01", "Dark").with_season(1))
        .await
        .unwrap();
    service
        .submit(DownloadRequest::new("s", "series", "S02E01", "Dark").with_season(2))
        .await
        .unwrap();
    let content_root = library_root(&service, ContentKind::Series).join("Dark");
    std::fs::write(content_root.join("go"), b"").unwrap();
    finished(&mut rx, 2).await;

    assert!(content_root.join("Season 01/S01E01 - Dark.mkv").exists());
    assert!(!content_root.join("Season 01/Dark.S01E01.mkv").exists());
    assert!(content_root.join("Season 02/S02E01 - Dark.mkv").exists());
}

#[tokio::test]
async fn test_failed_last_part_still_processes_deferred_parts() {
    // The second season's link makes the tool fail.
    let h = harness(
        "while [ ! -f \"$3/../go\" ]; do sleep 0.05; done; [ \"$1\" = ok ] || exit 1",
    );
    let mut rx = h.service.subscribe();

    h.service
        .submit(DownloadRequest::new("s", "series", "ok", "Dark").with_season(1))
        .await
        .unwrap();
    h.service
        .submit(DownloadRequest::new("s", "series", "broken", "Dark").with_season(2))
        .await
        .unwrap();
    let content_root = library_root(&h.service, ContentKind::Series).join("Dark");
    std::fs::write(content_root.join("go"), b"").unwrap();

    let events = finished(&mut rx, 2).await;
    assert_eq!(
        outcomes(&events),
        vec![
            JobOutcome::Completed {
                post_processed: false
            },
            JobOutcome::Failed { removed_files: 0 },
        ]
    );
    let calls = h.post.recorded_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request.path, content_root.join("Season 01"));
}

#[tokio::test]
async fn test_failed_download_removes_only_new_files() {
    let h = harness("echo partial > \"$3/new.part\"; echo 'FLOOD_WAIT' >&2; exit 1");
    let mut rx = h.service.subscribe();

    let destination = library_root(&h.service, ContentKind::Movies).join("Alien");
    std::fs::create_dir_all(&destination).unwrap();
    std::fs::write(destination.join("keep.mkv"), b"old").unwrap();

    h.service
        .submit(DownloadRequest::new("s", "movies", "link", "Alien"))
        .await
        .unwrap();
    let events = finished(&mut rx, 1).await;

    assert_eq!(
        outcomes(&events),
        vec![JobOutcome::Failed { removed_files: 1 }]
    );
    assert!(destination.join("keep.mkv").exists());
    assert!(!destination.join("new.part").exists());
    assert_eq!(h.post.call_count().await, 0);
    assert!(h.permissions.recorded_paths().await.is_empty());
}

#[tokio::test]
async fn test_post_process_error_still_completes() {
    let h = harness("echo 100%");
    h.post
        .set_next_error(PostProcessError::TaskFailed("disk full".to_string()))
        .await;
    let mut rx = h.service.subscribe();

    h.service
        .submit(DownloadRequest::new("s", "anime", "link", "Frieren").with_season(1))
        .await
        .unwrap();
    let events = finished(&mut rx, 1).await;

    assert_eq!(
        outcomes(&events),
        vec![JobOutcome::Completed {
            post_processed: false
        }]
    );
    assert_eq!(h.permissions.recorded_paths().await.len(), 1);
}

#[tokio::test]
async fn test_cancelled_download_skips_post_processing() {
    let h = harness("echo 1%; exec sleep 30");
    let mut rx = h.service.subscribe();

    let (_, task_id) = h
        .service
        .submit(DownloadRequest::new("s", "movies", "link", "Ronin"))
        .await
        .unwrap();

    // Wait for the tool to report before cancelling.
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let JobEvent::Progress { .. } = rx.recv().await.unwrap() {
                break;
            }
        }
    })
    .await
    .unwrap();

    let counts = h.service.cancel(&session("s"), task_id).await;
    assert_eq!(counts.running, 1);

    let events = finished(&mut rx, 1).await;
    assert_eq!(outcomes(&events), vec![JobOutcome::Cancelled]);
    assert_eq!(h.post.call_count().await, 0);
    assert!(h.permissions.recorded_paths().await.is_empty());
    assert!(h.service.queue().registry().pids(&session("s")).is_empty());
}
