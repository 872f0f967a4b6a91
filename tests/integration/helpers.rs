//! Test helpers and utilities

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pool_httpd::config::PoolConfig;
use pool_httpd::{Config, Server, ServerStats};
use tempfile::TempDir;

/// In-process server with its own document root.
pub struct TestServer {
    pub addr: SocketAddr,
    pub root: TempDir,
    server: Arc<Server>,
    runner: Option<JoinHandle<()>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Start with test defaults: 2 workers, 5 requests per session, 2s timeout.
    pub fn start() -> Self {
        Self::start_with(|_| {})
    }

    /// Start after applying `configure` to the test defaults.
    pub fn start_with(configure: impl FnOnce(&mut Config)) -> Self {
        let root = tempfile::tempdir().expect("Failed to create document root");

        let mut config = Config::default();
        config.server.listen_addr = SocketAddr::from(([127, 0, 0, 1], 0));
        config.server.document_root = root.path().to_path_buf();
        config.server.stats_interval = None;
        config.pool = PoolConfig::with_workers(2);
        config.session.timeout = Duration::from_secs(2);
        configure(&mut config);

        let server = Arc::new(Server::bind(config).expect("Failed to bind test server"));
        let addr = server.local_addr();

        let runner = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.run())
        };

        Self {
            addr,
            root,
            server,
            runner: Some(runner),
        }
    }

    /// Create a file under the document root.
    pub fn write_file(&self, path: &str, contents: &[u8]) {
        let full = self.root.path().join(path.trim_start_matches('/'));
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directory");
        }
        std::fs::write(full, contents).expect("Failed to write file");
    }

    /// Open a client connection with a 5s read timeout.
    pub fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).expect("Failed to connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("Failed to set read timeout");
        stream
    }

    /// One `GET` on a fresh connection with `Connection: close`.
    pub fn get(&self, path: &str) -> RawResponse {
        let mut stream = self.connect();
        send(
            &mut stream,
            &format!("GET {} HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n", path),
        );
        read_response(&mut stream, false)
    }

    pub fn stats(&self) -> ServerStats {
        self.server.stats()
    }

    /// Trigger a graceful stop without waiting for it.
    pub fn trigger_shutdown(&self) {
        self.server.shutdown_handle().trigger();
    }

    /// Poll until `check` holds or `timeout` elapses.
    pub fn wait_until(&self, timeout: Duration, check: impl Fn(&ServerStats) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check(&self.stats()) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    /// Stop the server and wait for the accept loop to return.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.server.shutdown_handle().trigger();
        if let Some(runner) = self.runner.take() {
            runner.join().expect("Server thread panicked");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if !thread::panicking() {
            self.shutdown_and_join();
        } else {
            self.server.shutdown_handle().trigger();
        }
    }
}

/// Parsed HTTP response read off the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[allow(dead_code)]
impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_keep_alive(&self) -> bool {
        self.header("Connection") == Some("keep-alive")
    }
}

pub fn send(stream: &mut TcpStream, raw: &str) {
    stream
        .write_all(raw.as_bytes())
        .expect("Failed to write request");
}

/// Read exactly one response. `head` skips the body for HEAD requests.
pub fn read_response(stream: &mut TcpStream, head: bool) -> RawResponse {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).expect("Failed to read response");
        assert!(n > 0, "Connection closed before response headers");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head_text = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head_text.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split(' ')
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("Bad status line: {}", status_line));

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let body_len = if head { 0 } else { content_length };

    let mut body = buf.split_off(header_end + 4);
    while body.len() < body_len {
        let n = stream.read(&mut chunk).expect("Failed to read body");
        assert!(n > 0, "Connection closed before end of body");
        body.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(body.len(), body_len, "Unexpected bytes after response body");

    RawResponse {
        status,
        headers,
        body,
    }
}

/// Whether the server closed the connection (EOF within the read timeout).
pub fn is_closed(stream: &mut TcpStream) -> bool {
    let mut byte = [0u8; 1];
    match stream.read(&mut byte) {
        Ok(0) => true,
        Err(e) => e.kind() == std::io::ErrorKind::ConnectionReset,
        Ok(_) => false,
    }
}

/// Assert that response has expected status
pub fn assert_status(response: &RawResponse, expected: u16) {
    assert_eq!(
        response.status, expected,
        "Expected status {}, got {}",
        expected, response.status
    );
}

/// Assert that response contains header
pub fn assert_header(response: &RawResponse, name: &str, expected: &str) {
    let value = response
        .header(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name));
    assert_eq!(value, expected, "Header '{}' mismatch", name);
}

/// Assert that response body contains substring
pub fn assert_body_contains(response: &RawResponse, substring: &str) {
    let body = response.body_text();
    assert!(
        body.contains(substring),
        "Body does not contain '{}'. Body: {}",
        substring,
        &body[..body.len().min(500)]
    );
}
