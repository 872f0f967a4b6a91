//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_opt, env_or};
use super::ConfigError;

/// `Cache-Control: max-age` for static files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticCacheTtl(pub Option<Duration>);

impl StaticCacheTtl {
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    #[inline]
    pub fn as_secs(&self) -> u64 {
        self.0.map(|d| d.as_secs()).unwrap_or(0)
    }

    #[inline]
    pub fn as_duration(&self) -> Option<Duration> {
        self.0
    }
}

impl Default for StaticCacheTtl {
    fn default() -> Self {
        Self(Some(Duration::from_secs(3600)))
    }
}

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080).
    pub listen_addr: SocketAddr,
    /// Document root directory (default: ./public).
    pub document_root: PathBuf,
    /// Directory with custom `{status}.html` error pages.
    pub error_pages_dir: Option<PathBuf>,
    pub static_cache_ttl: StaticCacheTtl,
    /// Period of the statistics report; `None` disables it.
    pub stats_interval: Option<Duration>,
    /// Per-request access log lines.
    pub access_log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            document_root: PathBuf::from("./public"),
            error_pages_dir: None,
            static_cache_ttl: StaticCacheTtl::default(),
            stats_interval: Some(Duration::from_secs(30)),
            access_log: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_addr = env_or("LISTEN_ADDR", "0.0.0.0:8080");
        let listen_addr: SocketAddr = raw_addr.parse().map_err(|e| ConfigError::Parse {
            key: "LISTEN_ADDR".into(),
            value: raw_addr.clone(),
            error: format!("{}", e),
        })?;

        Ok(Self {
            listen_addr,
            document_root: PathBuf::from(env_or("DOCUMENT_ROOT", "./public")),
            error_pages_dir: env_opt("ERROR_PAGES_DIR").map(PathBuf::from),
            static_cache_ttl: StaticCacheTtl(env_duration("STATIC_CACHE_TTL", "1h")?),
            stats_interval: env_duration("STATS_INTERVAL", "30s")?,
            access_log: env_bool("ACCESS_LOG", false),
        })
    }

    /// Replace the port of the listen address (CLI override).
    pub fn with_port(mut self, port: u16) -> Self {
        self.listen_addr.set_port(port);
        self
    }
}
