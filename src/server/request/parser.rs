//! Request framing and parsing on top of `httparse`.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use http::{HeaderMap, Method, Version};

use super::HttpRequest;

/// Most headers accepted in one request.
pub const MAX_HEADERS: usize = 64;

/// Why a buffer does not hold an acceptable request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Rejected by the HTTP/1.x head parser.
    Malformed(httparse::Error),
    /// The head is not terminated yet.
    Incomplete,
    /// `Content-Length` is not a decimal number.
    BadContentLength,
    /// Head plus declared body exceed the limit.
    TooLarge { limit: usize },
    /// A header name or value the `http` types refuse.
    InvalidHeader,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Malformed(e) => write!(f, "malformed request: {}", e),
            ParseError::Incomplete => write!(f, "incomplete request head"),
            ParseError::BadContentLength => write!(f, "invalid Content-Length"),
            ParseError::TooLarge { limit } => write!(f, "request exceeds {} bytes", limit),
            ParseError::InvalidHeader => write!(f, "invalid header"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Result of scanning a read buffer for one complete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// A full request occupies this many leading bytes.
    Complete(usize),
    /// More bytes are needed.
    Incomplete,
    /// The buffer can never become an acceptable request.
    Invalid(ParseError),
}

/// Determine whether `buf` starts with a complete request of at most
/// `limit` bytes (head plus `Content-Length` body).
pub fn frame_length(buf: &[u8], limit: usize) -> Frame {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let head_len = match req.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) if buf.len() > limit => {
            return Frame::Invalid(ParseError::TooLarge { limit })
        }
        Ok(httparse::Status::Partial) => return Frame::Incomplete,
        Err(e) => return Frame::Invalid(ParseError::Malformed(e)),
    };

    let body_len = match content_length(req.headers) {
        Ok(n) => n,
        Err(e) => return Frame::Invalid(e),
    };

    match head_len.checked_add(body_len) {
        Some(total) if total <= limit => {
            if buf.len() >= total {
                Frame::Complete(total)
            } else {
                Frame::Incomplete
            }
        }
        _ => Frame::Invalid(ParseError::TooLarge { limit }),
    }
}

/// Declared body length; absent means no body.
fn content_length(headers: &[httparse::Header<'_>]) -> Result<usize, ParseError> {
    let Some(header) = headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()))
    else {
        return Ok(0);
    };

    std::str::from_utf8(header.value)
        .ok()
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|v| v.parse::<usize>().ok())
        .ok_or(ParseError::BadContentLength)
}

/// Parse one framed request. Everything after the head is the body.
pub fn parse_request(raw: &[u8]) -> Result<HttpRequest, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let head_len = match req.parse(raw).map_err(ParseError::Malformed)? {
        httparse::Status::Complete(n) => n,
        httparse::Status::Partial => return Err(ParseError::Incomplete),
    };

    let method = req
        .method
        .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
        .ok_or(ParseError::Malformed(httparse::Error::Token))?;
    let version = match req.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut map = HeaderMap::with_capacity(req.headers.len());
    for header in req.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|_| ParseError::InvalidHeader)?;
        let value = HeaderValue::from_bytes(header.value).map_err(|_| ParseError::InvalidHeader)?;
        map.append(name, value);
    }

    Ok(HttpRequest {
        method,
        path: req.path.unwrap_or_default().to_string(),
        version,
        headers: map,
        body: Bytes::copy_from_slice(&raw[head_len..]),
    })
}

/// Percent-decode a request path, borrowing when nothing is encoded.
pub fn percent_decode_path(path: &str) -> Cow<'_, str> {
    if path.contains('%') {
        percent_encoding::percent_decode_str(path).decode_utf8_lossy()
    } else {
        Cow::Borrowed(path)
    }
}
