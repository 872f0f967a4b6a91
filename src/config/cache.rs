//! File cache configuration.

use super::parse::env_size;
use super::ConfigError;
use crate::server::file_cache::{DEFAULT_CAPACITY_BYTES, DEFAULT_MAX_ENTRY_BYTES};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Total bytes the cache may hold.
    pub capacity_bytes: usize,
    /// Largest single file admitted to the cache.
    pub max_entry_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            capacity_bytes: env_size("CACHE_CAPACITY", "100MB")?,
            max_entry_bytes: env_size("CACHE_MAX_ENTRY", "20MB")?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entry_bytes > self.capacity_bytes {
            return Err(ConfigError::Invalid {
                key: "CACHE_MAX_ENTRY".into(),
                message: format!(
                    "{} bytes exceeds CACHE_CAPACITY ({} bytes)",
                    self.max_entry_bytes, self.capacity_bytes
                ),
            });
        }
        Ok(())
    }
}
