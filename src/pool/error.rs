//! Worker pool error types.

use std::fmt;

/// Errors that can occur during pool operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has begun shutting down and rejects new work.
    Stopped,

    /// The task panicked while running on a worker.
    TaskPanicked(String),

    /// The task was dropped before producing a result.
    ResultDropped,

    /// A worker thread could not be spawned.
    Spawn(String),
}

impl PoolError {
    /// Check if this is a stopped-pool rejection.
    pub fn is_stopped(&self) -> bool {
        matches!(self, PoolError::Stopped)
    }

    /// Check if the task itself failed.
    pub fn is_task_failure(&self) -> bool {
        matches!(self, PoolError::TaskPanicked(_))
    }

    /// Get the error message for logging.
    pub fn message(&self) -> &str {
        match self {
            PoolError::Stopped => "Pool stopped",
            PoolError::TaskPanicked(msg) => msg,
            PoolError::ResultDropped => "Result dropped",
            PoolError::Spawn(_) => "Worker spawn failed",
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Stopped => write!(f, "pool has been stopped"),
            PoolError::TaskPanicked(msg) => write!(f, "task panicked: {}", msg),
            PoolError::ResultDropped => {
                write!(f, "task was discarded before producing a result")
            }
            PoolError::Spawn(msg) => write!(f, "failed to spawn worker thread: {}", msg),
        }
    }
}

impl std::error::Error for PoolError {}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped() {
        let err = PoolError::Stopped;
        assert!(err.is_stopped());
        assert!(!err.is_task_failure());
        assert_eq!(err.message(), "Pool stopped");
    }

    #[test]
    fn test_task_panicked_display() {
        let err = PoolError::TaskPanicked("boom".to_string());
        assert!(err.is_task_failure());
        assert!(err.to_string().contains("boom"));
    }
}
