//! Configuration module for pool_httpd.
//!
//! All settings come from environment variables; each section has its own
//! struct with a `from_env` constructor and sensible defaults.
//!
//! # Example
//!
//! ```rust,ignore
//! use pool_httpd::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("Workers: {}", config.pool.worker_count());
//! ```

mod cache;
mod error;
mod logging;
mod parse;
mod pool;
mod server;
mod session;

pub use cache::CacheConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::{parse_duration, parse_size};
pub use pool::PoolConfig;
pub use server::{ServerConfig, StaticCacheTtl};
pub use session::{KeepAliveConfig, SessionConfig};

/// Complete application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
    pub keep_alive: KeepAliveConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            pool: PoolConfig::from_env()?,
            cache: CacheConfig::from_env()?,
            session: SessionConfig::from_env()?,
            keep_alive: KeepAliveConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Admission threshold for the configured pool.
    pub fn keep_alive_threshold(&self) -> usize {
        self.keep_alive.threshold(self.pool.worker_count())
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!(
            listen = %self.server.listen_addr,
            document_root = %self.server.document_root.display(),
            "configuration loaded"
        );
        info!(
            workers = self.pool.worker_count(),
            auto = self.pool.is_auto(),
            "worker pool"
        );
        info!(
            capacity_bytes = self.cache.capacity_bytes,
            max_entry_bytes = self.cache.max_entry_bytes,
            "file cache"
        );
        info!(
            max_requests = self.session.max_requests,
            timeout_secs = self.session.timeout.as_secs_f64(),
            keepalive_threshold = self.keep_alive_threshold(),
            "sessions"
        );

        if self.server.static_cache_ttl.is_enabled() {
            info!(
                "Static cache TTL: {}s",
                self.server.static_cache_ttl.as_secs()
            );
        }
        if let Some(dir) = &self.server.error_pages_dir {
            info!("Error pages: {}", dir.display());
        }
        if self.server.access_log {
            info!("Access log: enabled");
        }
    }
}
