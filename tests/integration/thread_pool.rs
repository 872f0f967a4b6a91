//! Worker pool through the public API

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pool_httpd::pool::PoolError;
use pool_httpd::ThreadPool;

#[test]
fn test_all_tasks_run() {
    let pool = ThreadPool::new(4, "it").unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..100)
        .map(|i| {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                i * 2
            })
            .unwrap()
        })
        .collect();

    let sum: usize = handles.into_iter().map(|h| h.wait().unwrap()).sum();
    assert_eq!(sum, (0..100).map(|i| i * 2).sum::<usize>());
    assert_eq!(counter.load(Ordering::SeqCst), 100);
}

#[test]
fn test_panicking_task_is_isolated() {
    let pool = ThreadPool::new(1, "it").unwrap();

    let failed = pool.submit(|| {
        panic!("boom");
    }).unwrap();
    let ok = pool.submit(|| 7).unwrap();

    assert!(matches!(failed.wait(), Err(PoolError::TaskPanicked(msg)) if msg.contains("boom")));
    assert_eq!(ok.wait().unwrap(), 7);

    let stats = pool.stats();
    assert_eq!(stats.workers, 1);
    assert_eq!(stats.tasks_failed, 1);
}

#[test]
fn test_shutdown_drains_queue_then_rejects() {
    let pool = ThreadPool::new(1, "it").unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            std::thread::sleep(Duration::from_millis(10));
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.shutdown();
    assert_eq!(counter.load(Ordering::SeqCst), 5);
    assert!(matches!(pool.submit(|| ()), Err(PoolError::Stopped)));
}
