//! Connection session and keep-alive admission configuration.

use std::time::Duration;

use super::parse::{env_duration, env_opt, env_parse};
use super::ConfigError;
use crate::server::admission::{threshold_for, DEFAULT_LOAD_FACTOR};

/// Per-connection limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Requests served before the connection is closed.
    pub max_requests: usize,
    /// Timeout of each socket read.
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            timeout: Duration::from_secs(3),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_requests = env_parse("SESSION_MAX_REQUESTS", 5usize)?;
        if max_requests == 0 {
            return Err(ConfigError::Invalid {
                key: "SESSION_MAX_REQUESTS".into(),
                message: "must be at least 1".into(),
            });
        }

        let timeout = env_duration("SESSION_TIMEOUT", "3s")?.ok_or_else(|| {
            ConfigError::Invalid {
                key: "SESSION_TIMEOUT".into(),
                message: "a read timeout is required".into(),
            }
        })?;

        Ok(Self {
            max_requests,
            timeout,
        })
    }
}

/// Keep-alive admission threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeepAliveConfig {
    /// Fraction of pool workers that may be held by live sessions.
    pub load_factor: f64,
    /// Absolute threshold; overrides `load_factor` when set.
    pub max_sessions: Option<usize>,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            load_factor: DEFAULT_LOAD_FACTOR,
            max_sessions: None,
        }
    }
}

impl KeepAliveConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let load_factor = env_parse("KEEPALIVE_LOAD_FACTOR", DEFAULT_LOAD_FACTOR)?;
        if !(load_factor > 0.0 && load_factor.is_finite()) {
            return Err(ConfigError::Invalid {
                key: "KEEPALIVE_LOAD_FACTOR".into(),
                message: format!("{} is not a positive number", load_factor),
            });
        }

        let max_sessions = match env_opt("KEEPALIVE_MAX_SESSIONS") {
            Some(_) => Some(env_parse("KEEPALIVE_MAX_SESSIONS", 0usize)?),
            None => None,
        };

        Ok(Self {
            load_factor,
            max_sessions,
        })
    }

    /// Threshold for a pool of `pool_size` workers (minimum 1).
    pub fn threshold(&self, pool_size: usize) -> usize {
        match self.max_sessions {
            Some(n) => n.max(1),
            None => threshold_for(pool_size, self.load_factor),
        }
    }
}
