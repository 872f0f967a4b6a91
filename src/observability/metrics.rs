//! Prometheus metrics for pool_httpd.
//!
//! Request and session counters are recorded as they happen. Pool, cache and
//! admission gauges are refreshed from a [`ServerStats`] snapshot right before
//! export.

use http::{Method, StatusCode};
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::server::ServerStats;

/// Prometheus metrics registry with all server metrics.
pub struct Metrics {
    registry: Registry,

    // === HTTP ===
    /// Requests by method and status.
    pub http_requests_total: CounterVec,
    /// Time from parsed request to written response.
    pub http_request_duration_seconds: HistogramVec,

    // === Sessions ===
    /// Closed sessions by close reason.
    pub sessions_closed_total: CounterVec,
    pub sessions_active: IntGauge,
    pub keepalive_threshold: IntGauge,

    // === Worker pool ===
    pub pool_workers: IntGauge,
    pub pool_workers_busy: IntGauge,
    pub pool_queue_depth: IntGauge,
    pub pool_tasks_completed: IntGauge,
    pub pool_tasks_failed: IntGauge,

    // === File cache ===
    pub cache_entries: IntGauge,
    pub cache_size_bytes: IntGauge,
    pub cache_capacity_bytes: IntGauge,
    pub cache_hits: IntGauge,
    pub cache_misses: IntGauge,
    pub cache_hit_ratio: Gauge,

    pub uptime_seconds: Gauge,
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let gauge = IntGauge::new(name, help)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_buckets = vec![
            0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
        ];

        let http_requests_total = CounterVec::new(
            Opts::new("pool_httpd_http_requests_total", "Total HTTP requests"),
            &["method", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pool_httpd_http_request_duration_seconds",
                "HTTP request handling duration in seconds",
            )
            .buckets(http_buckets),
            &["method"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        let sessions_closed_total = CounterVec::new(
            Opts::new(
                "pool_httpd_sessions_closed_total",
                "Closed connection sessions by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(sessions_closed_total.clone()))?;

        let uptime_seconds = Gauge::new("pool_httpd_uptime_seconds", "Server uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let cache_hit_ratio = Gauge::new("pool_httpd_cache_hit_ratio", "File cache hit ratio")?;
        registry.register(Box::new(cache_hit_ratio.clone()))?;

        Ok(Self {
            sessions_active: int_gauge(&registry, "pool_httpd_sessions_active", "Live sessions")?,
            keepalive_threshold: int_gauge(
                &registry,
                "pool_httpd_keepalive_threshold",
                "Maximum live sessions eligible for keep-alive",
            )?,
            pool_workers: int_gauge(&registry, "pool_httpd_pool_workers", "Worker threads")?,
            pool_workers_busy: int_gauge(
                &registry,
                "pool_httpd_pool_workers_busy",
                "Workers running a task",
            )?,
            pool_queue_depth: int_gauge(
                &registry,
                "pool_httpd_pool_queue_depth",
                "Tasks waiting for a worker",
            )?,
            pool_tasks_completed: int_gauge(
                &registry,
                "pool_httpd_pool_tasks_completed",
                "Tasks that finished normally",
            )?,
            pool_tasks_failed: int_gauge(
                &registry,
                "pool_httpd_pool_tasks_failed",
                "Tasks that panicked",
            )?,
            cache_entries: int_gauge(&registry, "pool_httpd_cache_entries", "Cached files")?,
            cache_size_bytes: int_gauge(
                &registry,
                "pool_httpd_cache_size_bytes",
                "Bytes held by the file cache",
            )?,
            cache_capacity_bytes: int_gauge(
                &registry,
                "pool_httpd_cache_capacity_bytes",
                "File cache capacity in bytes",
            )?,
            cache_hits: int_gauge(&registry, "pool_httpd_cache_hits", "File cache hits")?,
            cache_misses: int_gauge(&registry, "pool_httpd_cache_misses", "File cache misses")?,
            cache_hit_ratio,
            uptime_seconds,
            http_requests_total,
            http_request_duration_seconds,
            sessions_closed_total,
            registry,
        })
    }

    /// Record one handled request.
    pub fn record_http_request(&self, method: &Method, status: StatusCode, duration_secs: f64) {
        self.http_requests_total
            .with_label_values(&[method.as_str(), status.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method.as_str()])
            .observe(duration_secs);
    }

    pub fn record_session_closed(&self, reason: &str) {
        self.sessions_closed_total.with_label_values(&[reason]).inc();
    }

    /// Refresh the gauges from a statistics snapshot.
    pub fn update(&self, stats: &ServerStats) {
        self.uptime_seconds.set(stats.uptime_secs);

        self.sessions_active.set(stats.sessions.active as i64);
        self.keepalive_threshold.set(stats.sessions.keepalive_threshold as i64);

        self.pool_workers.set(stats.pool.workers as i64);
        self.pool_workers_busy.set(stats.pool.active_workers as i64);
        self.pool_queue_depth.set(stats.pool.queue_len as i64);
        self.pool_tasks_completed.set(stats.pool.tasks_completed as i64);
        self.pool_tasks_failed.set(stats.pool.tasks_failed as i64);

        self.cache_entries.set(stats.cache.entries as i64);
        self.cache_size_bytes.set(stats.cache.size_bytes as i64);
        self.cache_capacity_bytes.set(stats.cache.capacity_bytes as i64);
        self.cache_hits.set(stats.cache.hits as i64);
        self.cache_misses.set(stats.cache.misses as i64);
        self.cache_hit_ratio.set(stats.cache.hit_ratio);
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
