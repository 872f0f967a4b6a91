//! Keep-alive session lifecycle over real sockets.

use std::thread;
use std::time::Duration;

use crate::helpers::*;

const KEEP_ALIVE_ABOUT: &str = "GET /about HTTP/1.1\r\nHost: test\r\nConnection: keep-alive\r\n\r\n";

/// Two requests share one connection
#[test]
fn test_connection_is_reused() {
    let server = TestServer::start();
    let mut stream = server.connect();

    send(&mut stream, KEEP_ALIVE_ABOUT);
    let first = read_response(&mut stream, false);
    assert_status(&first, 200);
    assert_header(&first, "Connection", "keep-alive");
    assert_header(&first, "Keep-Alive", "timeout=2, max=5");

    send(&mut stream, KEEP_ALIVE_ABOUT);
    let second = read_response(&mut stream, false);
    assert_status(&second, 200);
    assert!(second.is_keep_alive());

    assert_eq!(server.stats().sessions.total, 1);
}

/// HTTP/1.1 without a Connection header defaults to keep-alive
#[test]
fn test_http11_defaults_to_keep_alive() {
    let server = TestServer::start();
    let mut stream = server.connect();

    send(&mut stream, "GET /about HTTP/1.1\r\nHost: test\r\n\r\n");
    assert!(read_response(&mut stream, false).is_keep_alive());
}

/// The session closes after its request quota even if the client wants more
#[test]
fn test_max_requests_closes_connection() {
    let server = TestServer::start_with(|config| config.session.max_requests = 3);
    let mut stream = server.connect();

    for _ in 0..2 {
        send(&mut stream, KEEP_ALIVE_ABOUT);
        let resp = read_response(&mut stream, false);
        assert_status(&resp, 200);
        assert_header(&resp, "Keep-Alive", "timeout=2, max=3");
    }

    send(&mut stream, KEEP_ALIVE_ABOUT);
    let last = read_response(&mut stream, false);
    assert_status(&last, 200);
    assert_header(&last, "Connection", "close");
    assert!(last.header("Keep-Alive").is_none());
    assert!(is_closed(&mut stream));
}

/// HTTP/1.0 and explicit close both end the session after one response
#[test]
fn test_client_requested_close() {
    let server = TestServer::start();

    let mut stream = server.connect();
    send(&mut stream, "GET /about HTTP/1.0\r\n\r\n");
    assert_header(&read_response(&mut stream, false), "Connection", "close");
    assert!(is_closed(&mut stream));

    let mut stream = server.connect();
    send(&mut stream, "GET /about HTTP/1.1\r\nConnection: close\r\n\r\n");
    assert_header(&read_response(&mut stream, false), "Connection", "close");
    assert!(is_closed(&mut stream));
}

/// HTTP/1.0 client opting in to keep-alive
#[test]
fn test_http10_keep_alive_opt_in() {
    let server = TestServer::start();
    let mut stream = server.connect();

    send(&mut stream, "GET /about HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n");
    assert!(read_response(&mut stream, false).is_keep_alive());
}

/// An idle keep-alive connection is closed after the read timeout
#[test]
fn test_idle_timeout_closes_connection() {
    let server =
        TestServer::start_with(|config| config.session.timeout = Duration::from_millis(300));
    let mut stream = server.connect();

    send(&mut stream, KEEP_ALIVE_ABOUT);
    assert!(read_response(&mut stream, false).is_keep_alive());

    assert!(is_closed(&mut stream));
    assert!(server.wait_until(Duration::from_secs(2), |s| s.sessions.active == 0));
}

/// A connection that never sends a request is closed too
#[test]
fn test_silent_client_times_out() {
    let server =
        TestServer::start_with(|config| config.session.timeout = Duration::from_millis(200));
    let mut stream = server.connect();
    assert!(is_closed(&mut stream));
}

/// Sessions above the admission threshold are not kept alive
#[test]
fn test_admission_denies_keep_alive_under_load() {
    // 2 workers with the default load factor admit 1 keep-alive session
    let server = TestServer::start();
    assert_eq!(server.stats().sessions.keepalive_threshold, 1);

    let mut first = server.connect();
    send(&mut first, KEEP_ALIVE_ABOUT);
    assert!(read_response(&mut first, false).is_keep_alive());

    let mut second = server.connect();
    send(&mut second, KEEP_ALIVE_ABOUT);
    let denied = read_response(&mut second, false);
    assert_status(&denied, 200);
    assert_header(&denied, "Connection", "close");
    assert!(is_closed(&mut second));

    // Load back under the threshold: reuse is granted again
    assert!(server.wait_until(Duration::from_secs(2), |s| s.sessions.active == 1));
    send(&mut first, KEEP_ALIVE_ABOUT);
    assert!(read_response(&mut first, false).is_keep_alive());
}

/// Requests written back to back are answered in order
#[test]
fn test_pipelined_requests() {
    let server = TestServer::start();
    server.write_file("a.txt", b"first");
    server.write_file("b.txt", b"second");
    let mut stream = server.connect();

    send(
        &mut stream,
        "GET /a.txt HTTP/1.1\r\nHost: test\r\n\r\nGET /b.txt HTTP/1.1\r\nHost: test\r\n\r\n",
    );
    assert_eq!(read_response(&mut stream, false).body, b"first");
    assert_eq!(read_response(&mut stream, false).body, b"second");
}

/// Malformed requests get a 400 and the connection is dropped
#[test]
fn test_bad_request_closes_connection() {
    let server = TestServer::start();
    let mut stream = server.connect();

    send(&mut stream, "NONSENSE\r\n\r\n");
    let resp = read_response(&mut stream, false);
    assert_status(&resp, 400);
    assert_header(&resp, "Connection", "close");
    assert!(is_closed(&mut stream));
}

/// A Content-Length that cannot fit the request limit is refused up front
#[test]
fn test_overflowing_content_length_rejected() {
    let server = TestServer::start();
    let mut stream = server.connect();

    send(
        &mut stream,
        "POST / HTTP/1.1\r\nContent-Length: 18446744073709551615\r\n\r\n",
    );
    let resp = read_response(&mut stream, false);
    assert_status(&resp, 400);
    assert_header(&resp, "Connection", "close");
    assert!(is_closed(&mut stream));

    // The server keeps serving afterwards
    let resp = server.get("/about");
    assert_status(&resp, 200);
}

/// Stopping denies further reuse and waits for live sessions
#[test]
fn test_graceful_stop_drains_sessions() {
    let server = TestServer::start();
    let mut stream = server.connect();

    send(&mut stream, KEEP_ALIVE_ABOUT);
    assert!(read_response(&mut stream, false).is_keep_alive());

    server.trigger_shutdown();
    assert!(server.wait_until(Duration::from_secs(2), |s| s.sessions.draining));

    send(&mut stream, KEEP_ALIVE_ABOUT);
    let resp = read_response(&mut stream, false);
    assert_status(&resp, 200);
    assert_header(&resp, "Connection", "close");
    assert!(is_closed(&mut stream));

    server.stop();
}

/// More concurrent clients than workers are all served
#[test]
fn test_clients_beyond_pool_size() {
    let server = TestServer::start();
    let addr = server.addr;

    let clients: Vec<_> = (0..8)
        .map(|_| {
            thread::spawn(move || {
                let mut stream = std::net::TcpStream::connect(addr).unwrap();
                stream
                    .set_read_timeout(Some(Duration::from_secs(5)))
                    .unwrap();
                send(&mut stream, "GET /about HTTP/1.1\r\nConnection: close\r\n\r\n");
                read_response(&mut stream, false).status
            })
        })
        .collect();

    for client in clients {
        assert_eq!(client.join().unwrap(), 200);
    }
    assert!(server.wait_until(Duration::from_secs(2), |s| s.sessions.total == 8));
}
