//! pool_httpd - keep-alive HTTP/1.1 file server on a fixed worker pool.
//!
//! Each accepted connection becomes one task on a [`pool::ThreadPool`] and
//! runs as a keep-alive session until the client leaves, the per-connection
//! request quota is used up, or load-aware admission control denies reuse.
//! Static files are served from a byte-bounded LRU cache.
//!
//! # Features
//!
//! - **Worker pool**: FIFO task queue, panic isolation, graceful drain
//! - **Keep-alive sessions**: request quota, idle timeout, pipelining
//! - **Admission control**: reuse denied once active sessions exceed a
//!   share of the pool
//! - **File cache**: LRU with a byte budget and a per-file size cap
//! - **Observability**: JSON logs with tracing, Prometheus text at `/metrics`
//!
//! # Example
//!
//! ```rust,ignore
//! use pool_httpd::{Config, Server};
//!
//! let server = Server::bind(Config::from_env()?)?;
//! server.run();
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod logging;
pub mod observability;
pub mod pool;
pub mod server;

// Re-exports for convenience
pub use config::Config;
pub use pool::ThreadPool;
pub use server::{Server, ServerStats, ShutdownHandle};
