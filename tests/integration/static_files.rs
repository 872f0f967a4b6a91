//! Static file serving tests

use crate::helpers::*;

/// Test serving CSS file with type and caching headers
#[test]
fn test_serve_css_file() {
    let server = TestServer::start();
    server.write_file("styles.css", b"body { color: red; }");

    let resp = server.get("/styles.css");
    assert_status(&resp, 200);
    assert_header(&resp, "Content-Type", "text/css");
    assert_header(&resp, "Content-Length", "20");
    assert_header(&resp, "Cache-Control", "public, max-age=3600");
    assert_eq!(resp.body, b"body { color: red; }");
}

/// Test index.html for directory paths
#[test]
fn test_directory_index() {
    let server = TestServer::start();
    server.write_file("index.html", b"<h1>root</h1>");
    server.write_file("docs/index.html", b"<h1>docs</h1>");

    assert_body_contains(&server.get("/"), "root");
    assert_body_contains(&server.get("/docs/"), "docs");
}

/// Test percent-encoded paths and query strings
#[test]
fn test_encoded_path_and_query() {
    let server = TestServer::start();
    server.write_file("my file.txt", b"spaced");

    let resp = server.get("/my%20file.txt?v=2");
    assert_status(&resp, 200);
    assert_eq!(resp.body, b"spaced");
}

/// Test repeated requests are served from the cache
#[test]
fn test_repeat_requests_hit_cache() {
    let server = TestServer::start();
    server.write_file("cached.txt", b"original");

    assert_eq!(server.get("/cached.txt").body, b"original");
    let after_first = server.stats().cache;
    assert_eq!(after_first.entries, 1);
    assert_eq!(after_first.size_bytes, 8);

    // Disk changes are not seen while the entry is cached
    server.write_file("cached.txt", b"changed!");
    assert_eq!(server.get("/cached.txt").body, b"original");
    assert_eq!(server.stats().cache.hits, after_first.hits + 1);
}

/// Test files above the entry limit are served but not cached
#[test]
fn test_oversized_file_bypasses_cache() {
    let server = TestServer::start_with(|config| config.cache.max_entry_bytes = 16);
    server.write_file("big.txt", &[b'x'; 64]);

    let resp = server.get("/big.txt");
    assert_status(&resp, 200);
    assert_eq!(resp.body.len(), 64);
    assert_eq!(server.stats().cache.entries, 0);
}

/// Test cache capacity is never exceeded
#[test]
fn test_cache_stays_within_capacity() {
    let server = TestServer::start_with(|config| {
        config.cache.capacity_bytes = 100;
        config.cache.max_entry_bytes = 50;
    });
    for i in 0..5 {
        server.write_file(&format!("f{}.txt", i), &[b'a'; 40]);
        assert_status(&server.get(&format!("/f{}.txt", i)), 200);
    }

    let cache = server.stats().cache;
    assert_eq!(cache.entries, 2);
    assert!(cache.size_bytes <= 100);
}

/// Test HEAD returns headers only
#[test]
fn test_head_request() {
    let server = TestServer::start();
    server.write_file("page.html", b"<p>hello</p>");
    let mut stream = server.connect();

    send(&mut stream, "HEAD /page.html HTTP/1.1\r\nHost: test\r\n\r\n");
    let resp = read_response(&mut stream, true);
    assert_status(&resp, 200);
    assert_header(&resp, "Content-Length", "12");
    assert!(resp.body.is_empty());

    // The connection is still usable, so no body bytes were sent
    send(&mut stream, "GET /page.html HTTP/1.1\r\nHost: test\r\n\r\n");
    assert_eq!(read_response(&mut stream, false).body, b"<p>hello</p>");
}

/// Test 404 for non-existent file
#[test]
fn test_not_found() {
    let server = TestServer::start();
    let resp = server.get("/nonexistent.css");

    assert_status(&resp, 404);
    assert_body_contains(&resp, "404 Not Found");
}

/// Test directory traversal protection
#[test]
fn test_directory_traversal_protection() {
    let server = TestServer::start();
    server.write_file("public.txt", b"public");

    for path in ["/../public.txt", "/%2e%2e/etc/passwd", "/a/../public.txt"] {
        assert_status(&server.get(path), 403);
    }
}

/// Test custom error pages from ERROR_PAGES_DIR
#[test]
fn test_custom_error_page() {
    let pages = tempfile::tempdir().unwrap();
    std::fs::write(pages.path().join("404.html"), "<h1>Lost?</h1>").unwrap();
    let dir = pages.path().to_path_buf();

    let server = TestServer::start_with(move |config| config.server.error_pages_dir = Some(dir));
    let resp = server.get("/missing");
    assert_status(&resp, 404);
    assert_eq!(resp.body_text(), "<h1>Lost?</h1>");
}
