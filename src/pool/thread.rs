//! Fixed-size thread pool over a shared FIFO queue.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use super::error::{PoolError, PoolResult};
use super::PoolStats;

/// Used when the hardware parallelism cannot be determined.
pub const FALLBACK_WORKERS: usize = 4;

/// Result of running one queued job, reported back to the worker loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task returned normally.
    Completed,
    /// The task panicked; the message is kept for logging.
    Failed(String),
}

type Job = Box<dyn FnOnce() -> TaskOutcome + Send + 'static>;

/// Lifecycle of a single worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Waiting,
    Running,
    Shutdown,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Waiting => "waiting",
            WorkerState::Running => "running",
            WorkerState::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Queue contents plus the bookkeeping that must change atomically with it.
struct QueueState {
    tasks: VecDeque<Job>,
    /// Workers currently between dequeue and completion.
    active: usize,
    stopping: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    /// Signalled when a task is queued or shutdown begins.
    available: Condvar,
    /// Signalled when the pool may have become idle.
    idle: Condvar,
    completed: AtomicU64,
    failed: AtomicU64,
    worker_count: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Jobs never run under the lock, so poisoning carries no broken invariant.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            workers: self.worker_count,
            active_workers: state.active,
            queue_len: state.tasks.len(),
            tasks_completed: self.completed.load(Ordering::Relaxed),
            tasks_failed: self.failed.load(Ordering::Relaxed),
            stopped: state.stopping,
        }
    }
}

/// Handle for retrieving the result of a submitted task.
///
/// Dropping the handle does not cancel the task.
pub struct TaskHandle<T> {
    rx: mpsc::Receiver<PoolResult<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task has run and return its result.
    pub fn wait(self) -> PoolResult<T> {
        self.rx.recv().unwrap_or(Err(PoolError::ResultDropped))
    }

    /// Return the result if the task already finished.
    pub fn try_result(&self) -> Option<PoolResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(PoolError::ResultDropped)),
        }
    }
}

/// Read-only view of pool statistics.
///
/// Holds no reference to the worker threads, so components running inside
/// the pool can report on it without keeping it alive.
#[derive(Clone)]
pub struct PoolMonitor {
    shared: Arc<Shared>,
}

impl PoolMonitor {
    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    pub fn worker_count(&self) -> usize {
        self.shared.worker_count
    }
}

/// A fixed set of long-lived workers consuming an unbounded FIFO queue.
///
/// Workers are created at construction and joined by [`ThreadPool::shutdown`].
/// A panicking task is caught at the worker boundary and never reduces the
/// number of live workers.
pub struct ThreadPool {
    shared: Arc<Shared>,
    /// Worker thread handles, drained on shutdown.
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Pool name for logging and thread names.
    name: String,
}

impl ThreadPool {
    /// Create a pool with `num_workers` threads (0 = hardware parallelism).
    pub fn new(num_workers: usize, name: impl Into<String>) -> PoolResult<Self> {
        let num_workers = resolve_worker_count(num_workers);
        let name = name.into();

        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                active: 0,
                stopping: false,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            worker_count: num_workers,
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(num_workers)),
            name,
        };

        for id in 0..num_workers {
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", pool.name, id))
                .spawn(move || worker_loop(id, &shared));

            match spawned {
                Ok(handle) => pool.lock_workers().push(handle),
                Err(e) => {
                    pool.shutdown();
                    return Err(PoolError::Spawn(e.to_string()));
                }
            }
        }

        tracing::info!(pool = %pool.name, workers = num_workers, "thread pool created");

        Ok(pool)
    }

    /// Queue `work` for execution and return a handle to its result.
    ///
    /// Fails with [`PoolError::Stopped`] once shutdown has begun. Never blocks
    /// beyond acquiring the queue lock.
    pub fn submit<F, T>(&self, work: F) -> PoolResult<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);

        let job: Job = Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(value) => {
                    // The caller may have dropped the handle.
                    let _ = tx.send(Ok(value));
                    TaskOutcome::Completed
                }
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    let _ = tx.send(Err(PoolError::TaskPanicked(msg.clone())));
                    TaskOutcome::Failed(msg)
                }
            }
        });

        {
            let mut state = self.shared.lock();
            if state.stopping {
                return Err(PoolError::Stopped);
            }
            state.tasks.push_back(job);
        }
        self.shared.available.notify_one();

        Ok(TaskHandle { rx })
    }

    /// Block until the queue is empty and no worker is mid-task.
    pub fn wait_for_idle(&self) {
        let mut state = self.shared.lock();
        while !(state.tasks.is_empty() && state.active == 0) {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        tracing::debug!(pool = %self.name, "pool idle");
    }

    /// Stop accepting work, let queued tasks drain, and join every worker.
    ///
    /// Idempotent. In-flight tasks are never interrupted.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.lock();
            if !state.stopping {
                state.stopping = true;
                tracing::info!(
                    pool = %self.name,
                    queued = state.tasks.len(),
                    "shutting down thread pool"
                );
            }
        }
        self.shared.available.notify_all();

        let handles: Vec<JoinHandle<()>> = self.lock_workers().drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            // A task that stops its own pool cannot join itself.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!(pool = %self.name, "worker thread exited abnormally");
            }
        }

        tracing::info!(
            pool = %self.name,
            completed = self.shared.completed.load(Ordering::Relaxed),
            failed = self.shared.failed.load(Ordering::Relaxed),
            "thread pool stopped"
        );
    }

    /// Whether shutdown has begun.
    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopping
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    pub fn monitor(&self) -> PoolMonitor {
        PoolMonitor {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.shared.worker_count
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Resolve a configured worker count, 0 meaning "one per CPU".
pub fn resolve_worker_count(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    match num_cpus::get() {
        0 => FALLBACK_WORKERS,
        n => n,
    }
}

fn worker_loop(id: usize, shared: &Shared) {
    tracing::debug!(worker = id, state = %WorkerState::Waiting, "worker started");

    loop {
        let job = {
            let mut state = shared.lock();
            loop {
                if let Some(job) = state.tasks.pop_front() {
                    state.active += 1;
                    break job;
                }
                if state.stopping {
                    tracing::debug!(worker = id, state = %WorkerState::Shutdown, "worker stopped");
                    return;
                }
                state = shared
                    .available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        tracing::trace!(worker = id, state = %WorkerState::Running, "task dequeued");

        match job() {
            TaskOutcome::Completed => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            TaskOutcome::Failed(msg) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(worker = id, error = %msg, "task failed");
            }
        }

        {
            let mut state = shared.lock();
            state.active -= 1;
            if state.tasks.is_empty() && state.active == 0 {
                shared.idle.notify_all();
            }
        }
    }
}

/// Render a `catch_unwind` payload for logging.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
