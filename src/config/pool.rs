//! Worker pool configuration.

use std::num::NonZeroUsize;

use super::parse::env_parse;
use super::ConfigError;
use crate::pool::resolve_worker_count;

/// Worker pool configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Value of `WORKERS`; 0 means auto.
    pub configured: usize,
    /// Resolved worker count (never zero).
    worker_count: NonZeroUsize,
}

impl PoolConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::with_workers(env_parse("WORKERS", 0usize)?))
    }

    pub fn with_workers(configured: usize) -> Self {
        let resolved = resolve_worker_count(configured);
        Self {
            configured,
            worker_count: NonZeroUsize::new(resolved).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Get worker count (pre-computed).
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count.get()
    }

    pub fn is_auto(&self) -> bool {
        self.configured == 0
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_workers(0)
    }
}
