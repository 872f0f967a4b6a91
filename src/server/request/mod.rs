//! HTTP request model and parsing.
//!
//! `httparse` handles the request line and headers. Framing on the socket
//! side uses [`frame_length`] to know when a full request arrived and to
//! reject declared bodies over the size limit before reading them.

mod parser;

use bytes::Bytes;
use http::header::{AsHeaderName, HeaderName, HeaderValue, CONNECTION};
use http::{HeaderMap, Method, Version};

pub use parser::{frame_length, parse_request, percent_decode_path, Frame, ParseError};

/// Methods accepted by [`HttpRequest::is_valid`].
pub const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

/// A parsed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Request target as received, including any query string.
    pub path: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            version: Version::HTTP_11,
            ..Default::default()
        }
    }

    /// Builder-style header setter, used mostly by tests.
    pub fn with_header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.append(name, HeaderValue::from_static(value));
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Method from the allowed set and a target starting with `/`.
    pub fn is_valid(&self) -> bool {
        ALLOWED_METHODS.contains(&self.method) && self.path.starts_with('/')
    }

    /// Header value as text; the first occurrence wins.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_http11(&self) -> bool {
        self.version == Version::HTTP_11
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// Persistent-connection intent.
    ///
    /// An explicit `Connection` header decides (it must mention keep-alive);
    /// otherwise HTTP/1.1 defaults to persistent and anything older does not.
    pub fn wants_keep_alive(&self) -> bool {
        match self.header(CONNECTION) {
            Some(value) if !value.is_empty() => {
                value.to_ascii_lowercase().contains("keep-alive")
            }
            _ => self.is_http11(),
        }
    }

    /// Path without the query string.
    pub fn uri_path(&self) -> &str {
        match self.path.find('?') {
            Some(pos) => &self.path[..pos],
            None => &self.path,
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.path.find('?').map(|pos| &self.path[pos + 1..])
    }
}
