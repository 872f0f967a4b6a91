//! Load-aware admission control for connection reuse.
//!
//! A single process-wide counter of live sessions. Sessions register on
//! start and deregister when their [`AdmissionGuard`] drops; the keep-alive
//! decision compares the current count against a threshold derived from the
//! worker pool size.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Default share of pool workers that may be held by keep-alive sessions.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.5;

/// Shared counter of active sessions plus the keep-alive threshold.
#[derive(Debug)]
pub struct AdmissionControl {
    active: AtomicUsize,
    /// Total sessions ever admitted.
    total: AtomicUsize,
    threshold: usize,
    /// Set once the server starts stopping; denies all reuse.
    draining: AtomicBool,
}

impl AdmissionControl {
    /// Create with an absolute threshold (minimum 1).
    pub fn new(threshold: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            threshold: threshold.max(1),
            draining: AtomicBool::new(false),
        }
    }

    /// Derive the threshold as a fraction of the pool size.
    pub fn for_pool(pool_size: usize, load_factor: f64) -> Self {
        Self::new(threshold_for(pool_size, load_factor))
    }

    /// Register a starting session.
    ///
    /// The returned guard decrements the counter exactly once when dropped.
    pub fn enter(self: &Arc<Self>) -> AdmissionGuard {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.total.fetch_add(1, Ordering::Relaxed);
        AdmissionGuard {
            control: Arc::clone(self),
            active_at_entry: active,
        }
    }

    /// Whether current load permits keeping a connection open.
    pub fn allows_keep_alive(&self) -> bool {
        !self.is_draining() && self.active() <= self.threshold
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Deny every further keep-alive so live sessions wind down.
    pub fn begin_drain(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

/// Compute the keep-alive threshold for a pool of `pool_size` workers.
pub fn threshold_for(pool_size: usize, load_factor: f64) -> usize {
    let factor = if load_factor.is_finite() && load_factor > 0.0 {
        load_factor
    } else {
        DEFAULT_LOAD_FACTOR
    };
    ((pool_size as f64 * factor).floor() as usize).max(1)
}

/// Registration of one live session.
#[derive(Debug)]
pub struct AdmissionGuard {
    control: Arc<AdmissionControl>,
    active_at_entry: usize,
}

impl AdmissionGuard {
    /// Active session count observed when this session registered.
    pub fn active_at_entry(&self) -> usize {
        self.active_at_entry
    }

    pub fn control(&self) -> &AdmissionControl {
        &self.control
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.control.active.fetch_sub(1, Ordering::SeqCst);
    }
}
