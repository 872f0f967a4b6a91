//! HTTP response building.
//!
//! Responses are assembled into a byte sequence whose header block ends with
//! an empty line. Connection-control headers are not written here; the
//! session inserts them once the keep-alive decision is known.

pub mod static_file;

use bytes::Bytes;
use http::header::{self, AsHeaderName, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};

pub use static_file::{ContentSource, DiskSource, StaticFiles, StaticLookup};

/// Value of the `Server` header.
pub const SERVER_NAME: &str = concat!("pool_httpd/", env!("CARGO_PKG_VERSION"));

pub static EMPTY_BODY: Bytes = Bytes::from_static(b"");

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// A complete, buffered HTTP/1.1 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    /// Serialize headers (including the real Content-Length) but no body.
    head_only: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::with_capacity(4),
            body: EMPTY_BODY.clone(),
            head_only: false,
        }
    }

    /// HTML response with the given status.
    pub fn html(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status).with_body(DEFAULT_CONTENT_TYPE, body)
    }

    /// JSON response; serialization failures degrade to a 500.
    pub fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec_pretty(value) {
            Ok(body) => Self::new(status).with_body("application/json", body),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize JSON response");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .with_body("text/plain", "Internal Server Error")
            }
        }
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.set_header(header::CONTENT_TYPE, content_type);
        self.body = body.into();
        self
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn with_header(mut self, name: HeaderName, value: impl AsRef<str>) -> Self {
        self.set_header(name, value.as_ref());
        self
    }

    /// Strip the body when serializing (HEAD).
    pub fn head_only(mut self) -> Self {
        self.head_only = true;
        self
    }

    fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = %name, "dropping header with invalid value"),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// 1xx, 204 and 304 never carry a body or a Content-Length.
    fn permits_body(&self) -> bool {
        !(self.status.is_informational()
            || self.status == StatusCode::NO_CONTENT
            || self.status == StatusCode::NOT_MODIFIED)
    }

    /// Number of body bytes that go on the wire.
    pub fn wire_body_len(&self) -> usize {
        if self.head_only || !self.permits_body() {
            0
        } else {
            self.body.len()
        }
    }

    /// Serialize status line, headers, blank line and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.wire_body_len());
        out.extend_from_slice(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_str(),
                self.status.canonical_reason().unwrap_or("Unknown")
            )
            .as_bytes(),
        );

        let permits_body = self.permits_body();
        for (name, value) in &self.headers {
            if *name == header::CONTENT_LENGTH && !permits_body {
                continue;
            }
            write_header(&mut out, name.as_str(), value.as_bytes());
        }
        if permits_body && !self.headers.contains_key(header::CONTENT_LENGTH) {
            let len = self.body.len().to_string();
            write_header(&mut out, header::CONTENT_LENGTH.as_str(), len.as_bytes());
        }
        if !self.headers.contains_key(header::SERVER) {
            write_header(&mut out, header::SERVER.as_str(), SERVER_NAME.as_bytes());
        }
        out.extend_from_slice(b"\r\n");

        if !self.head_only && permits_body {
            out.extend_from_slice(&self.body);
        }
        out
    }
}

fn write_header(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}
