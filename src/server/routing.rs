//! Request routing.
//!
//! Static files are tried first; the built-in pages follow:
//!
//! | Path       | Response                       |
//! |------------|--------------------------------|
//! | `/about`   | HTML page describing the server |
//! | `/status`  | JSON [`ServerStats`] snapshot  |
//! | `/metrics` | Prometheus text                |
//!
//! Anything else is a 404 page.

use std::sync::Arc;

use http::header::ALLOW;
use http::{Method, StatusCode};

use super::connection::RequestHandler;
use super::error_pages::ErrorPages;
use super::request::HttpRequest;
use super::response::{Response, StaticFiles, StaticLookup, SERVER_NAME};
use super::StatsCollector;
use crate::observability::Metrics;

const ALLOWED: &str = "GET, HEAD, OPTIONS";

/// Built-in routes plus static files.
pub struct Router {
    static_files: StaticFiles,
    error_pages: ErrorPages,
    stats: Arc<StatsCollector>,
    metrics: Option<Arc<Metrics>>,
}

impl Router {
    pub fn new(
        static_files: StaticFiles,
        error_pages: ErrorPages,
        stats: Arc<StatsCollector>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            static_files,
            error_pages,
            stats,
            metrics,
        }
    }

    pub fn route(&self, request: &HttpRequest) -> Response {
        match request.method {
            Method::GET | Method::HEAD => {}
            Method::OPTIONS => {
                return Response::new(StatusCode::NO_CONTENT).with_header(ALLOW, ALLOWED)
            }
            _ => {
                return self
                    .error_pages
                    .response(StatusCode::METHOD_NOT_ALLOWED)
                    .with_header(ALLOW, ALLOWED)
            }
        }

        match self.static_files.lookup(&request.path) {
            StaticLookup::Found(entry) => return self.static_files.response(&entry),
            StaticLookup::Forbidden => return self.error_pages.response(StatusCode::FORBIDDEN),
            StaticLookup::NotFound => {}
        }

        match request.uri_path() {
            "/about" => self.about_page(),
            "/status" => Response::json(StatusCode::OK, &self.stats.snapshot()),
            "/metrics" => self.metrics_page(),
            _ => self.error_pages.response(StatusCode::NOT_FOUND),
        }
    }

    fn about_page(&self) -> Response {
        let stats = self.stats.snapshot();
        let body = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>About</title></head>\n<body>\n\
             <h1>{server}</h1>\n\
             <p>Build: {build}</p>\n\
             <ul>\n\
             <li>Worker threads: {workers}</li>\n\
             <li>Keep-alive threshold: {threshold} sessions</li>\n\
             <li>File cache: {entries} files, {size} of {capacity} bytes</li>\n\
             <li>Uptime: {uptime:.0}s</li>\n\
             </ul>\n\
             <p>See <a href=\"/status\">/status</a> for live statistics.</p>\n\
             </body>\n</html>\n",
            server = SERVER_NAME,
            build = crate::VERSION,
            workers = stats.pool.workers,
            threshold = stats.sessions.keepalive_threshold,
            entries = stats.cache.entries,
            size = stats.cache.size_bytes,
            capacity = stats.cache.capacity_bytes,
            uptime = stats.uptime_secs,
        );
        Response::html(StatusCode::OK, body)
    }

    fn metrics_page(&self) -> Response {
        match &self.metrics {
            Some(metrics) => {
                metrics.update(&self.stats.snapshot());
                Response::new(StatusCode::OK)
                    .with_body("text/plain; version=0.0.4", metrics.export())
            }
            None => self.error_pages.response(StatusCode::NOT_FOUND),
        }
    }
}

impl RequestHandler for Router {
    fn handle(&self, request: &HttpRequest) -> Response {
        self.route(request)
    }
}
