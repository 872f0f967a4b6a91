//! Access logging.

use std::net::SocketAddr;
use std::time::Duration;

use http::header::USER_AGENT;
use http::StatusCode;
use uuid::Uuid;

use super::request::HttpRequest;
use crate::logging::ACCESS_TARGET;

/// Emit one access line for a served request.
pub fn log_request(
    session: Uuid,
    client: Option<SocketAddr>,
    request: &HttpRequest,
    status: StatusCode,
    bytes: usize,
    elapsed: Duration,
    keep_alive: bool,
) {
    let ip = client.map(|a| a.ip().to_string()).unwrap_or_default();
    tracing::info!(
        target: ACCESS_TARGET,
        session = %session,
        ip = %ip,
        method = %request.method,
        path = %request.path,
        http = ?request.version,
        status = status.as_u16() as u64,
        bytes = bytes as u64,
        duration_ms = elapsed.as_secs_f64() * 1000.0,
        keep_alive,
        ua = request.header(USER_AGENT).unwrap_or(""),
    );
}
