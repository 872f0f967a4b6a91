//! Static file serving through the shared [`FileCache`].

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::CACHE_CONTROL;
use http::StatusCode;

use super::Response;
use crate::server::file_cache::{CacheEntry, FileCache};
use crate::server::request::percent_decode_path;

/// Where file bytes come from on a cache miss.
pub trait ContentSource: Send + Sync {
    /// Load the file at a normalized request path.
    ///
    /// `Ok(None)` means the path does not name a regular file.
    fn load(&self, path: &str) -> io::Result<Option<(Bytes, String)>>;
}

/// Files below a document root on the local filesystem.
#[derive(Debug, Clone)]
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl ContentSource for DiskSource {
    fn load(&self, path: &str) -> io::Result<Option<(Bytes, String)>> {
        let file_path = self.root.join(path.trim_start_matches('/'));
        match std::fs::metadata(&file_path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        }

        let contents = std::fs::read(&file_path)?;
        let mime = mime_guess::from_path(&file_path)
            .first_or_octet_stream()
            .to_string();
        Ok(Some((Bytes::from(contents), mime)))
    }
}

/// Outcome of resolving a request path against the static files.
#[derive(Debug, Clone)]
pub enum StaticLookup {
    Found(CacheEntry),
    /// Traversal attempt or unreadable file.
    Forbidden,
    NotFound,
}

/// Static file handler: cache first, content source on miss.
pub struct StaticFiles {
    cache: Arc<FileCache>,
    source: Box<dyn ContentSource>,
    cache_ttl: Option<Duration>,
}

impl StaticFiles {
    pub fn new(
        cache: Arc<FileCache>,
        source: impl ContentSource + 'static,
        cache_ttl: Option<Duration>,
    ) -> Self {
        Self {
            cache,
            source: Box::new(source),
            cache_ttl,
        }
    }

    pub fn cache(&self) -> &Arc<FileCache> {
        &self.cache
    }

    /// Map a request target to a cache key.
    ///
    /// Drops the query string, percent-decodes, and maps directory paths to
    /// their `index.html`. Returns `None` for `..` segments or NUL bytes.
    pub fn normalize(target: &str) -> Option<String> {
        let path = target.split('?').next().unwrap_or(target);
        let decoded = percent_decode_path(path);

        if decoded.contains("..") || decoded.contains('\0') || !decoded.starts_with('/') {
            return None;
        }

        if decoded.ends_with('/') {
            Some(format!("{}index.html", decoded))
        } else {
            Some(decoded.into_owned())
        }
    }

    pub fn lookup(&self, target: &str) -> StaticLookup {
        let Some(key) = Self::normalize(target) else {
            tracing::warn!(path = target, "blocked path traversal attempt");
            return StaticLookup::Forbidden;
        };

        if let Some(entry) = self.cache.get(&key) {
            return StaticLookup::Found(entry);
        }

        match self.source.load(&key) {
            Ok(Some((content, mime))) => {
                let entry = CacheEntry::new(content, mime);
                if !self.cache.put(&key, entry.clone()) {
                    tracing::debug!(
                        path = %key,
                        size = entry.size_bytes,
                        "file too large to cache, serving uncached"
                    );
                }
                StaticLookup::Found(entry)
            }
            Ok(None) => StaticLookup::NotFound,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                tracing::warn!(path = %key, error = %e, "static file not readable");
                StaticLookup::Forbidden
            }
            Err(e) => {
                tracing::error!(path = %key, error = %e, "failed to read static file");
                StaticLookup::NotFound
            }
        }
    }

    /// 200 response for a found entry.
    pub fn response(&self, entry: &CacheEntry) -> Response {
        let mut response =
            Response::new(StatusCode::OK).with_body(&entry.mime_type, entry.content.clone());
        if let Some(ttl) = self.cache_ttl {
            response =
                response.with_header(CACHE_CONTROL, format!("public, max-age={}", ttl.as_secs()));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        loads: Arc<AtomicUsize>,
    }

    impl ContentSource for CountingSource {
        fn load(&self, path: &str) -> io::Result<Option<(Bytes, String)>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if path == "/index.html" {
                Ok(Some((Bytes::from_static(b"<h1>home</h1>"), "text/html".into())))
            } else {
                Ok(None)
            }
        }
    }

    fn handler(loads: &Arc<AtomicUsize>) -> StaticFiles {
        StaticFiles::new(
            Arc::new(FileCache::with_limits(1024, 512)),
            CountingSource {
                loads: Arc::clone(loads),
            },
            Some(Duration::from_secs(3600)),
        )
    }

    #[test]
    fn test_normalize() {
        assert_eq!(StaticFiles::normalize("/").as_deref(), Some("/index.html"));
        assert_eq!(
            StaticFiles::normalize("/docs/").as_deref(),
            Some("/docs/index.html")
        );
        assert_eq!(
            StaticFiles::normalize("/a%20b.txt?x=1").as_deref(),
            Some("/a b.txt")
        );
        assert_eq!(StaticFiles::normalize("/../etc/passwd"), None);
        assert_eq!(StaticFiles::normalize("/%2e%2e/secret"), None);
        assert_eq!(StaticFiles::normalize("/a%00b"), None);
    }

    #[test]
    fn test_second_lookup_hits_cache() {
        let loads = Arc::new(AtomicUsize::new(0));
        let files = handler(&loads);

        assert!(matches!(files.lookup("/"), StaticLookup::Found(_)));
        assert!(matches!(files.lookup("/index.html"), StaticLookup::Found(_)));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let stats = files.cache().stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_missing_and_forbidden() {
        let loads = Arc::new(AtomicUsize::new(0));
        let files = handler(&loads);
        assert!(matches!(files.lookup("/nope.css"), StaticLookup::NotFound));
        assert!(matches!(files.lookup("/../x"), StaticLookup::Forbidden));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_response_headers() {
        let loads = Arc::new(AtomicUsize::new(0));
        let files = handler(&loads);
        let StaticLookup::Found(entry) = files.lookup("/") else {
            panic!("expected index");
        };
        let resp = files.response(&entry);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.header("Content-Type"), Some("text/html"));
        assert_eq!(resp.header(CACHE_CONTROL), Some("public, max-age=3600"));
    }

    #[test]
    fn test_disk_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let source = DiskSource::new(dir.path());
        let (bytes, mime) = source.load("/style.css").unwrap().unwrap();
        assert_eq!(&bytes[..], b"body{}");
        assert_eq!(mime, "text/css");
        assert!(source.load("/sub").unwrap().is_none());
        assert!(source.load("/missing.js").unwrap().is_none());
    }
}
