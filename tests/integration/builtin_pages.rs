//! Built-in pages and method handling

use crate::helpers::*;

#[test]
fn test_about_page() {
    let server = TestServer::start();
    let resp = server.get("/about");

    assert_status(&resp, 200);
    assert_body_contains(&resp, "pool_httpd/");
    assert_body_contains(&resp, "Worker threads: 2");
    assert!(resp.header("Server").unwrap().starts_with("pool_httpd/"));
}

#[test]
fn test_status_page() {
    let server = TestServer::start();
    let resp = server.get("/status");

    assert_status(&resp, 200);
    assert_header(&resp, "Content-Type", "application/json");
    let json: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(json["pool"]["workers"], 2);
    assert_eq!(json["sessions"]["keepalive_threshold"], 1);
    // The session serving this request is counted
    assert_eq!(json["sessions"]["active"], 1);
    assert_eq!(json["sessions"]["draining"], false);
}

#[test]
fn test_metrics_page() {
    let server = TestServer::start();
    let resp = server.get("/metrics");

    assert_status(&resp, 200);
    let body = resp.body_text();
    assert!(body.contains("pool_httpd_pool_workers 2"));
    assert!(body.contains("pool_httpd_keepalive_threshold 1"));
    assert!(body.contains("pool_httpd_sessions_active 1"));
}

#[test]
fn test_method_handling() {
    let server = TestServer::start();

    let mut stream = server.connect();
    send(&mut stream, "OPTIONS / HTTP/1.1\r\nConnection: close\r\n\r\n");
    let resp = read_response(&mut stream, false);
    assert_status(&resp, 204);
    assert_header(&resp, "Allow", "GET, HEAD, OPTIONS");
    assert!(resp.header("Content-Length").is_none());
    assert!(resp.body.is_empty());

    let mut stream = server.connect();
    send(
        &mut stream,
        "POST /about HTTP/1.1\r\nContent-Length: 3\r\nConnection: close\r\n\r\nabc",
    );
    let resp = read_response(&mut stream, false);
    assert_status(&resp, 405);
    assert_header(&resp, "Allow", "GET, HEAD, OPTIONS");
}
