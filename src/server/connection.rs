//! Connection sessions.
//!
//! One pool task drives one connection through
//! `Reading -> Processing -> Writing -> {KeepAlive -> Reading | Closing}`.
//! Every step returns an explicit result; all failures funnel into a single
//! close that releases the socket and the admission slot exactly once.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::StatusCode;
use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::access_log;
use super::admission::AdmissionControl;
use super::error_pages::ErrorPages;
use super::request::{frame_length, parse_request, Frame, HttpRequest};
use super::response::Response;
use crate::config::SessionConfig;
use crate::observability::Metrics;
use crate::pool::panic_message;

/// Upper bound for one buffered request (headers plus body).
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

const READ_CHUNK: usize = 8 * 1024;

/// Byte transport a session runs over.
pub trait Connection: Read + Write + Send {
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Timeout applied to every subsequent read.
    fn set_timeout(&self, timeout: Duration) -> io::Result<()>;

    /// Shut down both directions.
    fn close(&self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn remote_addr(&self) -> Option<SocketAddr> {
        self.peer_addr().ok()
    }

    fn set_timeout(&self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }

    fn close(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// Produces a response for a parsed, valid request.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &HttpRequest) -> Response;
}

impl<F> RequestHandler for F
where
    F: Fn(&HttpRequest) -> Response + Send + Sync,
{
    fn handle(&self, request: &HttpRequest) -> Response {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Reading,
    Processing,
    Writing,
    KeepAlive,
    /// Terminal.
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Reading => "reading",
            SessionState::Processing => "processing",
            SessionState::Writing => "writing",
            SessionState::KeepAlive => "keep_alive",
            SessionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Timeout,
    ClientClosed,
    ReadError,
    BadRequest,
    SendError,
    MaxRequests,
    /// Keep-alive refused for any reason other than the request quota:
    /// load, shutdown, or a client that did not ask for it.
    AdmissionDenied,
    /// A request cycle panicked.
    Exception,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Timeout => "timeout",
            CloseReason::ClientClosed => "client_closed",
            CloseReason::ReadError => "read_error",
            CloseReason::BadRequest => "bad_request",
            CloseReason::SendError => "send_error",
            CloseReason::MaxRequests => "max_requests",
            CloseReason::AdmissionDenied => "admission_denied",
            CloseReason::Exception => "exception",
        }
    }

    /// Ended by an I/O or protocol failure rather than a policy decision.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CloseReason::ReadError
                | CloseReason::BadRequest
                | CloseReason::SendError
                | CloseReason::Exception
        )
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three independent signals that must all hold to reuse a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveDecision {
    pub client_wants: bool,
    pub under_quota: bool,
    pub load_allows: bool,
}

impl KeepAliveDecision {
    pub fn keep_alive(&self) -> bool {
        self.client_wants && self.under_quota && self.load_allows
    }

    /// Most specific reason to close, or `None` to keep the connection.
    pub fn close_reason(&self) -> Option<CloseReason> {
        if self.keep_alive() {
            None
        } else if !self.under_quota {
            Some(CloseReason::MaxRequests)
        } else {
            Some(CloseReason::AdmissionDenied)
        }
    }
}

/// Insert connection-control headers right before the end of the header block.
///
/// `keep_alive` carries `(timeout, max_requests)` when the connection stays
/// open; `None` writes `connection: close`. Names are lowercase like the
/// rest of the header block. The body is never touched.
pub fn add_connection_headers(
    mut response: Vec<u8>,
    keep_alive: Option<(Duration, usize)>,
) -> Vec<u8> {
    let headers = match keep_alive {
        Some((timeout, max)) => format!(
            "\r\nconnection: keep-alive\r\nkeep-alive: timeout={}, max={}",
            timeout.as_secs(),
            max
        ),
        None => "\r\nconnection: close".to_string(),
    };

    if let Some(pos) = response.windows(4).position(|w| w == b"\r\n\r\n") {
        response.splice(pos..pos, headers.into_bytes());
    }
    response
}

/// Per-connection state.
pub struct ConnectionSession<C: Connection> {
    stream: C,
    /// Correlates the access lines of one connection.
    id: Uuid,
    client: Option<SocketAddr>,
    state: SessionState,
    requests_served: usize,
    max_requests: usize,
    timeout: Duration,
    last_activity: Instant,
    close_requested: bool,
    /// Bytes read but not yet consumed (pipelined requests).
    buffer: Vec<u8>,
    released: bool,
}

impl<C: Connection> ConnectionSession<C> {
    pub fn new(stream: C, config: &SessionConfig) -> Self {
        let client = stream.remote_addr();
        Self {
            stream,
            id: Uuid::new_v4(),
            client,
            state: SessionState::Reading,
            requests_served: 0,
            max_requests: config.max_requests,
            timeout: config.timeout,
            last_activity: Instant::now(),
            close_requested: false,
            buffer: Vec::with_capacity(READ_CHUNK),
            released: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        if self.state != SessionState::Closing {
            self.state = state;
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn client(&self) -> Option<SocketAddr> {
        self.client
    }

    pub fn requests_served(&self) -> usize {
        self.requests_served
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn increment_request_count(&mut self) {
        self.requests_served += 1;
        self.last_activity = Instant::now();
    }

    pub fn has_reached_max_requests(&self) -> bool {
        self.requests_served >= self.max_requests
    }

    pub fn mark_for_closing(&mut self) {
        self.close_requested = true;
    }

    pub fn can_continue(&self) -> bool {
        !self.close_requested && !self.has_reached_max_requests()
    }

    /// Read until one complete request is buffered and return its bytes.
    ///
    /// Requests over [`MAX_REQUEST_BYTES`], counting the declared body,
    /// are rejected before the body is read.
    fn read_request(&mut self) -> Result<Vec<u8>, CloseReason> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match frame_length(&self.buffer, MAX_REQUEST_BYTES) {
                Frame::Complete(len) => return Ok(self.buffer.drain(..len).collect()),
                Frame::Invalid(e) => {
                    debug!(
                        session = %self.id,
                        client = ?self.client,
                        error = %e,
                        "unframeable request"
                    );
                    return Err(CloseReason::BadRequest);
                }
                Frame::Incomplete => {}
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(CloseReason::ClientClosed),
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    self.last_activity = Instant::now();
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(CloseReason::Timeout)
                }
                Err(e) => {
                    debug!(client = ?self.client, error = %e, "read failed");
                    return Err(CloseReason::ReadError);
                }
            }
        }
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    /// Enter `Closing` and release the socket. Only the first call acts.
    fn release(&mut self) {
        self.state = SessionState::Closing;
        self.close_requested = true;
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.stream.close() {
            debug!(client = ?self.client, error = %e, "socket shutdown failed");
        }
    }
}

/// Final record of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub id: Uuid,
    pub reason: CloseReason,
    pub requests_served: usize,
    pub client: Option<SocketAddr>,
    pub duration: Duration,
}

/// Result of one request cycle.
enum Step {
    Continue,
    Close(CloseReason),
}

/// Everything a session needs besides its socket.
pub struct ConnectionContext {
    pub handler: Arc<dyn RequestHandler>,
    pub admission: Arc<AdmissionControl>,
    pub session: SessionConfig,
    pub error_pages: ErrorPages,
    pub metrics: Option<Arc<Metrics>>,
    pub access_log_enabled: bool,
}

impl ConnectionContext {
    pub fn new(
        handler: Arc<dyn RequestHandler>,
        admission: Arc<AdmissionControl>,
        session: SessionConfig,
    ) -> Self {
        Self {
            handler,
            admission,
            session,
            error_pages: ErrorPages::new(),
            metrics: None,
            access_log_enabled: false,
        }
    }

    /// Drive one connection until it closes.
    pub fn run_session<C: Connection>(&self, stream: C) -> SessionOutcome {
        let started = Instant::now();
        let guard = self.admission.enter();
        let mut session = ConnectionSession::new(stream, &self.session);

        debug!(
            session = %session.id(),
            client = ?session.client(),
            active = guard.active_at_entry(),
            "session started"
        );

        let reason = match session.stream.set_timeout(session.timeout) {
            Ok(()) => self.serve(&mut session),
            Err(e) => {
                warn!(client = ?session.client(), error = %e, "failed to set read timeout");
                CloseReason::ReadError
            }
        };

        session.release();
        drop(guard);

        if let Some(metrics) = &self.metrics {
            metrics.record_session_closed(reason.as_str());
        }

        let outcome = SessionOutcome {
            id: session.id(),
            reason,
            requests_served: session.requests_served(),
            client: session.client(),
            duration: started.elapsed(),
        };
        debug!(
            session = %outcome.id,
            client = ?outcome.client,
            reason = %outcome.reason,
            requests = outcome.requests_served,
            duration_ms = outcome.duration.as_secs_f64() * 1000.0,
            "session closed"
        );
        outcome
    }

    fn serve<C: Connection>(&self, session: &mut ConnectionSession<C>) -> CloseReason {
        loop {
            session.set_state(SessionState::Reading);
            let raw = match session.read_request() {
                Ok(raw) => raw,
                Err(CloseReason::BadRequest) => {
                    self.send_best_effort(session, StatusCode::BAD_REQUEST);
                    return CloseReason::BadRequest;
                }
                Err(reason) => return reason,
            };

            session.set_state(SessionState::Processing);
            let step = match catch_unwind(AssertUnwindSafe(|| self.serve_one(session, &raw))) {
                Ok(step) => step,
                Err(payload) => {
                    error!(
                        session = %session.id(),
                        client = ?session.client(),
                        panic = %panic_message(payload.as_ref()),
                        "request cycle panicked"
                    );
                    self.send_best_effort(session, StatusCode::INTERNAL_SERVER_ERROR);
                    Step::Close(CloseReason::Exception)
                }
            };
            match step {
                Step::Continue if session.can_continue() => {
                    session.set_state(SessionState::KeepAlive);
                }
                Step::Continue => return CloseReason::MaxRequests,
                Step::Close(reason) => {
                    session.mark_for_closing();
                    return reason;
                }
            }
        }
    }

    fn serve_one<C: Connection>(&self, session: &mut ConnectionSession<C>, raw: &[u8]) -> Step {
        let started = Instant::now();
        session.increment_request_count();

        let request = match parse_request(raw) {
            Ok(request) if request.is_valid() => request,
            Ok(request) => {
                debug!(
                    session = %session.id(),
                    method = %request.method,
                    path = %request.path,
                    "invalid request"
                );
                self.send_best_effort(session, StatusCode::BAD_REQUEST);
                return Step::Close(CloseReason::BadRequest);
            }
            Err(e) => {
                debug!(session = %session.id(), error = %e, "unparseable request");
                self.send_best_effort(session, StatusCode::BAD_REQUEST);
                return Step::Close(CloseReason::BadRequest);
            }
        };

        let response = self.handler.handle(&request);
        let response = if request.is_head() {
            response.head_only()
        } else {
            response
        };

        session.set_state(SessionState::Writing);
        let decision = KeepAliveDecision {
            client_wants: request.wants_keep_alive(),
            under_quota: !session.has_reached_max_requests(),
            load_allows: self.admission.allows_keep_alive(),
        };
        let keep_alive = decision.keep_alive();
        let bytes = add_connection_headers(
            response.to_bytes(),
            keep_alive.then_some((session.timeout(), session.max_requests())),
        );
        let sent = session.send(&bytes);

        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_http_request(&request.method, response.status(), elapsed.as_secs_f64());
        }
        if self.access_log_enabled {
            access_log::log_request(
                session.id(),
                session.client(),
                &request,
                response.status(),
                response.wire_body_len(),
                elapsed,
                keep_alive,
            );
        }

        if let Err(e) = sent {
            debug!(client = ?session.client(), error = %e, "send failed");
            return Step::Close(CloseReason::SendError);
        }

        match decision.close_reason() {
            None => Step::Continue,
            Some(reason) => Step::Close(reason),
        }
    }

    /// Error page with `Connection: close`; write failures are ignored.
    fn send_best_effort<C: Connection>(
        &self,
        session: &mut ConnectionSession<C>,
        status: StatusCode,
    ) {
        session.set_state(SessionState::Writing);
        let bytes = add_connection_headers(self.error_pages.response(status).to_bytes(), None);
        if let Err(e) = session.send(&bytes) {
            debug!(
                client = ?session.client(),
                status = status.as_u16(),
                error = %e,
                "error response not delivered"
            );
        }
    }
}
