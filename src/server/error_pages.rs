//! Error pages for 4xx/5xx responses.
//!
//! Every status gets a small built-in HTML page. A directory of
//! `{status}.html` files, when configured, overrides individual pages.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use tracing::{debug, info, warn};

use super::response::Response;

#[derive(Clone, Default)]
pub struct ErrorPages {
    /// Status code -> custom HTML.
    custom: Arc<HashMap<StatusCode, Bytes>>,
}

impl ErrorPages {
    /// Built-in pages only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{status}.html` overrides from a directory.
    ///
    /// A missing or unreadable directory is logged and yields built-in pages.
    pub fn from_directory(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref();
        let entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %path.display(), error = %e, "error pages directory unavailable");
                return Self::new();
            }
        };

        let mut pages = HashMap::new();
        for file_path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if file_path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(code) = file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u16>().ok())
                .and_then(|c| StatusCode::from_u16(c).ok())
                .filter(|c| c.is_client_error() || c.is_server_error())
            else {
                continue;
            };

            match std::fs::read(&file_path) {
                Ok(content) => {
                    debug!(path = %file_path.display(), bytes = content.len(), "loaded error page");
                    pages.insert(code, Bytes::from(content));
                }
                Err(e) => warn!(path = %file_path.display(), error = %e, "failed to read error page"),
            }
        }

        if !pages.is_empty() {
            let mut codes: Vec<_> = pages.keys().map(|c| c.as_u16()).collect();
            codes.sort_unstable();
            info!(count = pages.len(), codes = ?codes, "loaded custom error pages");
        }

        Self {
            custom: Arc::new(pages),
        }
    }

    pub fn has_custom(&self, status: StatusCode) -> bool {
        self.custom.contains_key(&status)
    }

    /// HTML error response for `status`.
    pub fn response(&self, status: StatusCode) -> Response {
        match self.custom.get(&status) {
            Some(page) => Response::html(status, page.clone()),
            None => Response::html(status, default_page(status)),
        }
    }
}

fn default_page(status: StatusCode) -> String {
    let code = status.as_u16();
    let reason = status.canonical_reason().unwrap_or("Unknown");
    let detail = match status {
        StatusCode::BAD_REQUEST => "The server could not understand the request.",
        StatusCode::FORBIDDEN => "Access to the requested resource is forbidden.",
        StatusCode::NOT_FOUND => "The requested resource was not found on this server.",
        StatusCode::INTERNAL_SERVER_ERROR => "The server encountered an unexpected condition.",
        _ => "",
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{code} {reason}</title></head>\n\
         <body>\n<h1>{code} {reason}</h1>\n<p>{detail}</p>\n<hr>\n<p>{server}</p>\n</body>\n</html>\n",
        server = super::response::SERVER_NAME,
    )
}
