use std::net::SocketAddr;
use std::sync::{atomic::AtomicU64, Arc};

use tokio::{net::TcpStream, sync::broadcast};

use crate::{server::Signal, store::MessageStore};

/// One session's unit of concurrency.
///
/// `run` owns the session for its whole lifetime. The shutdown receiver is
/// the disposal capability: a session that observes the signal must abort
/// any blocked read promptly and terminate cleanly.
pub trait SessionHandler {
    fn run(
        self,
        shutdown: broadcast::Receiver<Signal>,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// Builds a session around a freshly accepted connection.
///
/// The store handle is the only capability a session receives for reporting
/// decoded mail; the queue counter hands out message ids shared across all
/// sessions of one server.
pub trait Protocol: Default + Send + Sync + 'static {
    type Session: SessionHandler + Send + Sync + 'static;

    fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        messages: MessageStore,
        queue: Arc<AtomicU64>,
        banner: String,
    ) -> Self::Session;
}
