//! Observability: Prometheus metrics.
//!
//! ```rust,ignore
//! use pool_httpd::observability::Metrics;
//!
//! let metrics = Metrics::new()?;
//! metrics.record_http_request(&http::Method::GET, http::StatusCode::OK, 0.004);
//! metrics.update(&server.stats());
//! println!("{}", metrics.export());
//! ```

pub mod metrics;

pub use metrics::Metrics;
