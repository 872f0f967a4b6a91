//! Server setup errors.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use crate::pool::PoolError;

/// Failures while bringing the server up. All are fatal.
#[derive(Debug)]
pub enum ServerError {
    /// The listening socket could not be created, bound or configured.
    Bind { addr: SocketAddr, source: io::Error },
    /// The worker pool could not be started.
    Pool(PoolError),
    /// The metrics registry rejected a metric.
    Metrics(prometheus::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Bind { addr, source } => {
                write!(f, "failed to listen on {}: {}", addr, source)
            }
            ServerError::Pool(e) => write!(f, "worker pool: {}", e),
            ServerError::Metrics(e) => write!(f, "metrics registry: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind { source, .. } => Some(source),
            ServerError::Pool(e) => Some(e),
            ServerError::Metrics(e) => Some(e),
        }
    }
}

impl From<PoolError> for ServerError {
    fn from(e: PoolError) -> Self {
        ServerError::Pool(e)
    }
}

impl From<prometheus::Error> for ServerError {
    fn from(e: prometheus::Error) -> Self {
        ServerError::Metrics(e)
    }
}
