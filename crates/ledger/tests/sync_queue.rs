//! Delivery-guarantee contract of the optimistic sync queue: FIFO ordering,
//! bounded retries with backoff, rollback on exhaustion, manual resubmission.
//!
//! Timing-sensitive tests run on paused virtual time, so the 2s/4s backoff
//! waits complete instantly.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use ledger::{
    LedgerError, MAX_ATTEMPTS, OperationStatus, OptimisticSyncQueue, SyncMetadata, SyncNotice,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn metadata(kind: &str) -> SyncMetadata {
    SyncMetadata::new(kind, format!("operación {kind}"))
}

fn recording_remote(
    log: &Arc<Mutex<Vec<String>>>,
    label: &str,
    fail_first: u32,
) -> ledger::RemoteUpdate {
    let log = Arc::clone(log);
    let label = label.to_string();
    let failures = Arc::new(AtomicU32::new(fail_first));
    Box::new(move || {
        let log = Arc::clone(&log);
        let label = label.clone();
        let failures = Arc::clone(&failures);
        Box::pin(async move {
            log.lock().unwrap().push(label.clone());
            if failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                Err(LedgerError::Store(format!("{label} transient failure")))
            } else {
                Ok(())
            }
        })
    })
}

fn no_rollback() -> ledger::Rollback {
    Box::new(|| Ok(()))
}

#[tokio::test]
async fn local_update_is_visible_before_submit_returns() {
    let queue = OptimisticSyncQueue::new();
    let applied = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&applied);
    queue.submit(
        move || flag.store(true, Ordering::SeqCst),
        Box::new(|| Box::pin(async { Ok(()) })),
        no_rollback(),
        metadata("local_first"),
    );

    assert!(applied.load(Ordering::SeqCst));
    queue.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn remote_calls_stay_in_submission_order_even_when_the_middle_retries() {
    let queue = OptimisticSyncQueue::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let started = tokio::time::Instant::now();
    queue.submit(|| {}, recording_remote(&calls, "o1", 0), no_rollback(), metadata("o1"));
    queue.submit(|| {}, recording_remote(&calls, "o2", 2), no_rollback(), metadata("o2"));
    queue.submit(|| {}, recording_remote(&calls, "o3", 0), no_rollback(), metadata("o3"));
    queue.wait_idle().await;

    // o2 fails twice and succeeds on its third attempt; o3 never jumps
    // ahead of it.
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["o1", "o2", "o2", "o2", "o3"]
    );

    // Backoff between o2's attempts: 2s then 4s.
    let elapsed = started.elapsed();
    assert!(elapsed >= std::time::Duration::from_secs(6), "elapsed {elapsed:?}");
    assert!(elapsed < std::time::Duration::from_secs(8), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn exhausted_operation_rolls_back_and_lands_on_the_failed_list() {
    init_tracing();
    let queue = OptimisticSyncQueue::new();
    let mut notices = queue.subscribe();
    let attempts = Arc::new(AtomicU32::new(0));
    let rolled_back = Arc::new(AtomicBool::new(false));

    let counter = Arc::clone(&attempts);
    let flag = Arc::clone(&rolled_back);
    let id = queue.submit(
        || {},
        Box::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(LedgerError::Store("remote is down".to_string()))
            })
        }),
        Box::new(move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }),
        metadata("doomed"),
    );
    queue.wait_idle().await;

    assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    assert!(rolled_back.load(Ordering::SeqCst));
    assert_eq!(queue.status(id), Some(OperationStatus::Failed));

    let failed = queue.failed_operations();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, id);
    assert_eq!(failed[0].attempts, MAX_ATTEMPTS);
    assert!(failed[0].last_error.as_deref().unwrap().contains("remote is down"));

    match notices.recv().await.unwrap() {
        SyncNotice::OperationFailed { id: failed_id, description } => {
            assert_eq!(failed_id, id);
            assert!(description.contains("doomed"));
        }
        other => panic!("unexpected notice: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn rollback_failure_is_reported_but_does_not_stop_the_worker() {
    init_tracing();
    let queue = OptimisticSyncQueue::new();
    let mut notices = queue.subscribe();
    let calls = Arc::new(Mutex::new(Vec::new()));

    queue.submit(
        || {},
        recording_remote(&calls, "broken", u32::MAX),
        Box::new(|| Err(LedgerError::Store("rollback is broken too".to_string()))),
        metadata("broken"),
    );
    queue.submit(|| {}, recording_remote(&calls, "next", 0), no_rollback(), metadata("next"));
    queue.wait_idle().await;

    assert!(matches!(
        notices.recv().await.unwrap(),
        SyncNotice::RollbackFailed { .. }
    ));
    assert!(matches!(
        notices.recv().await.unwrap(),
        SyncNotice::OperationFailed { .. }
    ));
    // The queue kept going after the bad rollback.
    assert_eq!(calls.lock().unwrap().last().map(String::as_str), Some("next"));
}

#[tokio::test(start_paused = true)]
async fn retry_failed_reprocesses_before_newly_submitted_operations() {
    let queue = OptimisticSyncQueue::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    // Fails its first delivery entirely (3 attempts), then succeeds once
    // resubmitted.
    let id = queue.submit(
        || {},
        recording_remote(&calls, "flaky", MAX_ATTEMPTS),
        no_rollback(),
        metadata("flaky"),
    );
    queue.wait_idle().await;
    assert_eq!(queue.status(id), Some(OperationStatus::Failed));

    queue.retry_failed_operations();
    queue.submit(|| {}, recording_remote(&calls, "newer", 0), no_rollback(), metadata("newer"));
    queue.wait_idle().await;

    assert!(queue.failed_operations().is_empty());
    // Completed operations are forgotten.
    assert_eq!(queue.status(id), None);
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["flaky", "flaky", "flaky", "flaky", "newer"]
    );
}

#[tokio::test]
async fn every_operation_terminates() {
    // Liveness under a mixed workload on real time: everything submitted
    // ends completed, nothing stays pending.
    let queue = OptimisticSyncQueue::new();
    for i in 0..20 {
        queue.submit(
            || {},
            Box::new(move || Box::pin(async move {
                if i % 3 == 0 {
                    tokio::task::yield_now().await;
                }
                Ok(())
            })),
            no_rollback(),
            metadata("bulk"),
        );
    }
    queue.wait_idle().await;
    assert_eq!(queue.pending_count(), 0);
    assert!(queue.failed_operations().is_empty());
    assert!(!queue.has_pending_operations());
}

#[test]
fn submit_after_worker_shutdown_settles_the_operation() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let queue = runtime.block_on(async { OptimisticSyncQueue::new() });
    // Dropping the runtime kills the worker task; the dropped operation
    // must not leave the depth counter stuck above zero.
    drop(runtime);

    let calls = Arc::new(Mutex::new(Vec::new()));
    let id = queue.submit(
        || {},
        recording_remote(&calls, "orphan", 0),
        no_rollback(),
        metadata("orphan"),
    );

    assert_eq!(queue.pending_count(), 0);
    assert_eq!(queue.status(id), None);
    assert!(calls.lock().unwrap().is_empty());

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(queue.wait_idle());
}
