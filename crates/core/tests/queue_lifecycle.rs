//! Queue lifecycle integration tests.
//!
//! These tests drive the download queue with held work units:
//! enqueue -> run in order -> cancel by content or session -> drain

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use plexdl_core::queue::work_fn;
use plexdl_core::testing::fixtures::{
    held_work, instant_work, session, task, wait_until_idle, wait_until_running, RunLog,
};
use plexdl_core::{CancelCounts, DownloadQueue, TaskId, WorkOutcome};

#[tokio::test]
async fn test_tasks_run_in_arrival_order_across_sessions() {
    let queue = DownloadQueue::new();
    let log = RunLog::new();

    let (first, release_first) = held_work(log.clone(), "a1");
    let (first_pos, first_id) = queue.enqueue(task("a", "a1", "x"), first).await;
    assert_eq!(first_pos, 1);
    wait_until_running(&queue, first_id).await;

    queue
        .enqueue(task("b", "b1", "y"), instant_work(log.clone(), "b1"))
        .await;
    queue
        .enqueue(task("a", "a2", "z"), instant_work(log.clone(), "a2"))
        .await;
    let (pos, _) = queue
        .enqueue(task("c", "c1", "w"), instant_work(log.clone(), "c1"))
        .await;
    assert_eq!(pos, 3);

    release_first.complete();
    wait_until_idle(&queue).await;

    assert_eq!(log.started().await, vec!["a1", "b1", "a2", "c1"]);
}

#[tokio::test]
async fn test_current_task_never_listed_as_queued() {
    let queue = DownloadQueue::new();
    let log = RunLog::new();

    let (work, release) = held_work(log.clone(), "first");
    let (_, first_id) = queue.enqueue(task("s", "first", "x"), work).await;
    wait_until_running(&queue, first_id).await;
    queue
        .enqueue(task("s", "second", "y"), instant_work(log.clone(), "second"))
        .await;

    let snapshot = queue.snapshot(None).await;
    let current = snapshot.current.expect("a task is running");
    assert_eq!(current.id, first_id);
    assert!(snapshot.queued.iter().all(|t| t.id != current.id));
    assert_eq!(snapshot.queued.len(), 1);

    // Repeated reads with no mutation are equal.
    assert_eq!(queue.snapshot(None).await, queue.snapshot(None).await);
    assert_eq!(
        queue.snapshot_by_content(None).await,
        queue.snapshot_by_content(None).await
    );

    release.complete();
    wait_until_idle(&queue).await;
}

#[tokio::test]
async fn test_content_snapshot_preserves_first_seen_order() {
    let queue = DownloadQueue::new();
    let log = RunLog::new();
    let s = session("s");

    let (blocker, release) = held_work(log.clone(), "blocker");
    let (_, blocker_id) = queue.enqueue(task("other", "blocker", "q"), blocker).await;
    wait_until_running(&queue, blocker_id).await;

    let (_, a) = queue
        .enqueue(task("s", "A", "X"), instant_work(log.clone(), "A"))
        .await;
    queue
        .enqueue(task("s", "B", "X"), instant_work(log.clone(), "B"))
        .await;
    let (_, c) = queue
        .enqueue(task("s", "C", "Y"), instant_work(log.clone(), "C"))
        .await;

    let view = queue.snapshot_by_content(Some(&s)).await;
    assert!(view.running.is_none());
    assert_eq!(view.queued.len(), 2);
    assert_eq!(view.queued[0].content_id.as_str(), "X");
    assert_eq!(view.queued[0].total, 2);
    assert_eq!(view.queued[0].representative_task_id, a);
    assert_eq!(view.queued[1].content_id.as_str(), "Y");
    assert_eq!(view.queued[1].total, 1);
    assert_eq!(view.queued[1].representative_task_id, c);

    release.complete();
    wait_until_idle(&queue).await;
}

#[tokio::test]
async fn test_cancel_removes_whole_content_for_session() {
    let queue = DownloadQueue::new();
    let log = RunLog::new();

    let (part1, _release1) = held_work(log.clone(), "x1");
    let (_, x1) = queue.enqueue(task("s", "x1", "X"), part1).await;
    wait_until_running(&queue, x1).await;

    let (_, x2) = queue
        .enqueue(task("s", "x2", "X"), instant_work(log.clone(), "x2"))
        .await;
    queue
        .enqueue(task("t", "tx", "X"), instant_work(log.clone(), "tx"))
        .await;
    queue
        .enqueue(task("s", "y1", "Y"), instant_work(log.clone(), "y1"))
        .await;

    // Cancelling through a queued part takes the running part with it.
    let counts = queue.cancel_task(&session("s"), x2).await;
    assert_eq!(counts, CancelCounts { running: 1, queued: 1 });

    wait_until_idle(&queue).await;
    let entries = log.entries().await;
    assert!(entries.contains(&"end x1 cancelled".to_string()));
    // Other session's task for the same content and unrelated content still run.
    assert_eq!(log.started().await, vec!["x1", "tx", "y1"]);
}

#[tokio::test]
async fn test_cancel_foreign_or_unknown_task_is_noop() {
    let queue = DownloadQueue::new();
    let log = RunLog::new();

    let (work, release) = held_work(log.clone(), "mine");
    let (_, id) = queue.enqueue(task("s", "mine", "X"), work).await;
    wait_until_running(&queue, id).await;

    assert!(queue.cancel_task(&session("intruder"), id).await.is_empty());
    assert!(queue.cancel_task(&session("s"), TaskId(9999)).await.is_empty());
    assert_eq!(queue.status().await.running, Some(id));

    release.complete();
    wait_until_idle(&queue).await;
}

#[tokio::test]
async fn test_next_task_runs_after_running_task_cancelled() {
    let queue = DownloadQueue::new();
    let log = RunLog::new();

    let (first, _release_first) = held_work(log.clone(), "first");
    let (_, first_id) = queue.enqueue(task("s", "first", "X"), first).await;
    wait_until_running(&queue, first_id).await;

    let (second, release_second) = held_work(log.clone(), "second");
    let (_, second_id) = queue.enqueue(task("s", "second", "Y"), second).await;

    let counts = queue.cancel_task(&session("s"), first_id).await;
    assert_eq!(counts, CancelCounts { running: 1, queued: 0 });

    wait_until_running(&queue, second_id).await;
    release_second.complete();
    wait_until_idle(&queue).await;
    assert_eq!(log.started().await, vec!["first", "second"]);
}

#[tokio::test]
async fn test_cancel_session_leaves_other_sessions_running() {
    let queue = DownloadQueue::new();
    let log = RunLog::new();

    let (first, _release) = held_work(log.clone(), "s-running");
    let (_, running) = queue.enqueue(task("s", "s-running", "X"), first).await;
    wait_until_running(&queue, running).await;

    queue
        .enqueue(task("s", "s-queued", "Y"), instant_work(log.clone(), "s-queued"))
        .await;
    queue
        .enqueue(task("t", "t-queued", "Z"), instant_work(log.clone(), "t-queued"))
        .await;

    let counts = queue.cancel_session(&session("s")).await;
    assert_eq!(counts, CancelCounts { running: 1, queued: 1 });
    assert!(queue.registry().pids(&session("s")).is_empty());

    wait_until_idle(&queue).await;
    assert_eq!(log.started().await, vec!["s-running", "t-queued"]);
}

#[tokio::test]
async fn test_cancel_session_on_empty_queue() {
    let queue = DownloadQueue::new();
    let counts = queue.cancel_session(&session("nobody")).await;
    assert!(counts.is_empty());
    assert!(!queue.status().await.worker_active);
}

#[tokio::test]
async fn test_failed_work_does_not_stop_the_queue() {
    let queue = DownloadQueue::new();
    let log = RunLog::new();

    let (failing, release) = held_work(log.clone(), "bad");
    let (_, bad) = queue.enqueue(task("s", "bad", "X"), failing).await;
    wait_until_running(&queue, bad).await;
    queue
        .enqueue(task("s", "good", "Y"), instant_work(log.clone(), "good"))
        .await;

    release.fail();
    wait_until_idle(&queue).await;
    assert!(log.entries().await.contains(&"end bad failed".to_string()));
    assert_eq!(log.started().await, vec!["bad", "good"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueue_keeps_one_worker() {
    const TASKS: usize = 200;
    let queue = DownloadQueue::new();
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let ran = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(TASKS);
    for i in 0..TASKS {
        let queue = queue.clone();
        let active = active.clone();
        let max_active = max_active.clone();
        let ran = ran.clone();
        handles.push(tokio::spawn(async move {
            let work = work_fn(move |_ctx| async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                active.fetch_sub(1, Ordering::SeqCst);
                ran.fetch_add(1, Ordering::SeqCst);
                // Some work ends cancelled on its own, which stops the loop.
                if i % 7 == 0 {
                    WorkOutcome::Cancelled
                } else {
                    WorkOutcome::Completed
                }
            });
            let session = format!("s{}", i % 5);
            queue
                .enqueue(task(&session, &format!("t{}", i), &format!("c{}", i)), work)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(10), async {
        while ran.load(Ordering::SeqCst) < TASKS {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("every task should run");
    wait_until_idle(&queue).await;

    assert_eq!(max_active.load(Ordering::SeqCst), 1);
    assert_eq!(ran.load(Ordering::SeqCst), TASKS);
}
