//! Blocking HTTP/1.1 server on top of the worker pool.
//!
//! One accept loop hands every connection to the [`ThreadPool`] as a single
//! task; the task runs the whole keep-alive session. Static content goes
//! through one shared [`FileCache`], and keep-alive reuse is gated by a
//! process-wide [`AdmissionControl`].
//!
//! # Example
//!
//! ```rust,ignore
//! use pool_httpd::{Config, Server};
//!
//! let server = Server::bind(Config::from_env()?)?;
//! let shutdown = server.shutdown_handle();
//! // ... shutdown.trigger() from a signal handler or another thread
//! server.run();
//! ```
//!
//! # Architecture
//!
//! ```text
//!   accept loop (polls stop flag, reports stats)
//!        │ submit(run_session)
//!        ▼
//!   ThreadPool ── worker: ConnectionContext::run_session
//!                   │ read -> parse -> Router -> write
//!                   ├── AdmissionControl  (enter / keep-alive gate)
//!                   └── FileCache         (get / put via StaticFiles)
//! ```

pub mod access_log;
pub mod admission;
pub mod connection;
mod error;
pub mod error_pages;
pub mod file_cache;
pub mod request;
pub mod response;
pub mod routing;

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, info, warn};

pub use admission::{AdmissionControl, AdmissionGuard};
pub use connection::{CloseReason, ConnectionContext, SessionOutcome};
pub use error::ServerError;
pub use file_cache::{CacheEntry, CacheStats, FileCache};

use crate::config::Config;
use crate::observability::Metrics;
use crate::pool::{PoolMonitor, PoolStats, ThreadPool};
use error_pages::ErrorPages;
use response::{DiskSource, StaticFiles};
use routing::Router;

/// How often a blocked `accept` wakes up to check the stop flag.
const ACCEPT_POLL: Duration = Duration::from_millis(250);

/// Pause after an unexpected accept failure (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

const LISTEN_BACKLOG: i32 = 1024;

/// Session counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub active: usize,
    pub total: usize,
    pub keepalive_threshold: usize,
    pub draining: bool,
}

/// Snapshot served at `/status` and used for the periodic report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerStats {
    pub uptime_secs: f64,
    pub sessions: SessionStats,
    pub pool: PoolStats,
    pub cache: CacheStats,
}

/// Collects [`ServerStats`] from the shared components.
pub struct StatsCollector {
    started: Instant,
    pool: PoolMonitor,
    cache: Arc<FileCache>,
    admission: Arc<AdmissionControl>,
}

impl StatsCollector {
    pub fn new(
        pool: PoolMonitor,
        cache: Arc<FileCache>,
        admission: Arc<AdmissionControl>,
    ) -> Self {
        Self {
            started: Instant::now(),
            pool,
            cache,
            admission,
        }
    }

    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            uptime_secs: self.started.elapsed().as_secs_f64(),
            sessions: SessionStats {
                active: self.admission.active(),
                total: self.admission.total(),
                keepalive_threshold: self.admission.threshold(),
                draining: self.admission.is_draining(),
            },
            pool: self.pool.stats(),
            cache: self.cache.stats(),
        }
    }
}

/// Cloneable trigger for a graceful stop.
///
/// The flag can be handed to `signal_hook::flag::register` directly.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

pub struct Server {
    config: Config,
    listener: TcpListener,
    local_addr: SocketAddr,
    pool: ThreadPool,
    cache: Arc<FileCache>,
    context: Arc<ConnectionContext>,
    stats: Arc<StatsCollector>,
    shutdown: ShutdownHandle,
    /// Set once `stop` has run.
    stopped: AtomicBool,
}

impl Server {
    /// Bind the listener and start the worker pool.
    pub fn bind(config: Config) -> Result<Self, ServerError> {
        let addr = config.server.listen_addr;
        let listener =
            create_listener(addr).map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        if !config.server.document_root.is_dir() {
            warn!(
                document_root = %config.server.document_root.display(),
                "document root is not a directory, only built-in pages will be served"
            );
        }

        let pool = ThreadPool::new(config.pool.worker_count(), "session")?;
        let cache = Arc::new(FileCache::with_limits(
            config.cache.capacity_bytes,
            config.cache.max_entry_bytes,
        ));
        let admission = Arc::new(AdmissionControl::new(config.keep_alive_threshold()));
        let stats = Arc::new(StatsCollector::new(
            pool.monitor(),
            Arc::clone(&cache),
            Arc::clone(&admission),
        ));
        let metrics = Arc::new(Metrics::new()?);

        let error_pages = match &config.server.error_pages_dir {
            Some(dir) => ErrorPages::from_directory(dir),
            None => ErrorPages::new(),
        };

        let static_files = StaticFiles::new(
            Arc::clone(&cache),
            DiskSource::new(&config.server.document_root),
            config.server.static_cache_ttl.as_duration(),
        );
        let router = Router::new(
            static_files,
            error_pages.clone(),
            Arc::clone(&stats),
            Some(Arc::clone(&metrics)),
        );

        let context = ConnectionContext {
            handler: Arc::new(router),
            admission,
            session: config.session,
            error_pages,
            metrics: Some(metrics),
            access_log_enabled: config.server.access_log,
        };

        Ok(Self {
            config,
            listener,
            local_addr,
            pool,
            cache,
            context: Arc::new(context),
            stats,
            shutdown: ShutdownHandle {
                flag: Arc::new(AtomicBool::new(false)),
            },
            stopped: AtomicBool::new(false),
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> ServerStats {
        self.stats.snapshot()
    }

    pub fn cache(&self) -> &Arc<FileCache> {
        &self.cache
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accept connections until the shutdown handle fires, then stop.
    pub fn run(&self) {
        info!(
            addr = %self.local_addr,
            workers = self.pool.worker_count(),
            keepalive_threshold = self.context.admission.threshold(),
            max_requests = self.config.session.max_requests,
            "server listening"
        );

        let report_every = self.config.server.stats_interval;
        let mut last_report = Instant::now();

        while !self.shutdown.is_triggered() {
            match self.listener.accept() {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    error!(error = %e, "accept failed");
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }

            if let Some(interval) = report_every {
                if last_report.elapsed() >= interval {
                    self.log_stats();
                    last_report = Instant::now();
                }
            }
        }

        self.stop();
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
        }

        let ctx = Arc::clone(&self.context);
        // On rejection the closure, and with it the socket, is dropped.
        if let Err(e) = self.pool.submit(move || ctx.run_session(stream)) {
            warn!(peer = %peer, error = %e, "connection rejected");
        }
    }

    /// Graceful stop: deny keep-alive, drain the pool, join the workers.
    ///
    /// Idempotent; blocks until every running session has closed.
    pub fn stop(&self) {
        self.shutdown.trigger();
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let before = self.stats.snapshot();
        info!(
            active_sessions = before.sessions.active,
            queued = before.pool.queue_len,
            "stopping server"
        );

        self.context.admission.begin_drain();
        self.pool.wait_for_idle();
        self.pool.shutdown();

        let after = self.stats.snapshot();
        info!(
            sessions_total = after.sessions.total,
            tasks_completed = after.pool.tasks_completed,
            tasks_failed = after.pool.tasks_failed,
            "server stopped"
        );
    }

    fn log_stats(&self) {
        let stats = self.stats.snapshot();
        info!(
            active_sessions = stats.sessions.active,
            keepalive_threshold = stats.sessions.keepalive_threshold,
            queue_len = stats.pool.queue_len,
            active_workers = stats.pool.active_workers,
            workers = stats.pool.workers,
            tasks_completed = stats.pool.tasks_completed,
            cache_entries = stats.cache.entries,
            cache_bytes = stats.cache.size_bytes,
            cache_hit_ratio = stats.cache.hit_ratio,
            "server statistics"
        );
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Blocking listener whose `accept` times out after [`ACCEPT_POLL`].
fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    // Lingering connections from a previous run must not block a restart.
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_read_timeout(Some(ACCEPT_POLL))?;

    Ok(socket.into())
}
