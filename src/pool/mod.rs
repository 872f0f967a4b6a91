//! Worker pool for connection sessions.
//!
//! Connection acceptance and connection processing are decoupled by a fixed
//! number of worker threads consuming one unbounded FIFO queue.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      ThreadPool                            │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐    ┌─────────┐    ┌─────────┐                 │
//! │  │ Worker0 │    │ Worker1 │    │ WorkerN │  ...            │
//! │  └────┬────┘    └────┬────┘    └────┬────┘                 │
//! │       │              │              │                      │
//! │       └──────────────┴──────────────┘                      │
//! │                      │  wait(non-empty or stopping)        │
//! │              ┌───────▼───────┐                             │
//! │              │ Mutex<VecDeque>│  (unbounded FIFO)          │
//! │              └───────┬───────┘                             │
//! │                      │                                     │
//! │              ┌───────▼───────┐                             │
//! │              │   submit()    │  -> TaskHandle<T>           │
//! │              └───────────────┘                             │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Shutdown rejects new submissions immediately but lets every already
//! queued task run before the workers exit.

mod error;
mod thread;

pub use error::{PoolError, PoolResult};
pub use thread::{
    panic_message, resolve_worker_count, PoolMonitor, TaskHandle, TaskOutcome, ThreadPool, WorkerState,
    FALLBACK_WORKERS,
};

use serde::Serialize;

/// Point-in-time statistics about the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Number of worker threads.
    pub workers: usize,
    /// Workers currently running a task.
    pub active_workers: usize,
    /// Tasks waiting in the queue.
    pub queue_len: usize,
    /// Tasks that returned normally.
    pub tasks_completed: u64,
    /// Tasks that panicked.
    pub tasks_failed: u64,
    /// Whether shutdown has begun.
    pub stopped: bool,
}

impl PoolStats {
    /// Workers not running a task.
    pub fn idle_workers(&self) -> usize {
        self.workers.saturating_sub(self.active_workers)
    }
}
