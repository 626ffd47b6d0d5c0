use std::net::SocketAddr;

use thiserror::Error;

/// Failures surfaced by the public server contract.
///
/// Everything that happens to a single connection stays inside its session;
/// only failing to acquire the listening endpoint escalates to the caller.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unable to bind {endpoint}: {source}")]
    Bind {
        endpoint: SocketAddr,
        source: std::io::Error,
    },

    #[error("server is already running")]
    AlreadyRunning,
}
