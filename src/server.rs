use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex, RwLock,
};

use futures_util::future::join_all;
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};

use crate::{
    config::Config,
    error::ServerError,
    internal,
    mail::Mail,
    registry::SessionRegistry,
    smtp::Smtp,
    store::MessageStore,
    traits::protocol::{Protocol, SessionHandler},
};

/// Notification fanned out to the accept loop and every live session when
/// the server shuts down.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
}

/// An embedded SMTP server.
///
/// `start` binds the endpoint and arms the accept loop; every accepted
/// connection is handled by its own session task, and every message a
/// session decodes lands in the shared store, readable at any time through
/// [`SmtpServer::messages`]. `stop` tears everything down: no socket stays
/// bound and no session task keeps running.
///
/// A stopped server stays stopped; start a fresh instance instead of
/// restarting one. `start` must not be called concurrently from two tasks.
pub struct SmtpServer<Proto: Protocol = Smtp> {
    address: IpAddr,
    port: u16,
    banner: String,
    messages: MessageStore,
    sessions: Arc<SessionRegistry>,
    queue: Arc<AtomicU64>,
    stopped: Arc<AtomicBool>,
    failed: Arc<AtomicUsize>,
    shutdown: broadcast::Sender<Signal>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    local_addr: RwLock<Option<SocketAddr>>,
    marker: PhantomData<Proto>,
}

impl<Proto: Protocol> Default for SmtpServer<Proto> {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 25)
    }
}

impl From<Config> for SmtpServer {
    fn from(config: Config) -> Self {
        Self {
            banner: config.banner,
            ..Self::new(config.address, config.port)
        }
    }
}

impl<Proto: Protocol> SmtpServer<Proto> {
    pub fn new(address: IpAddr, port: u16) -> Self {
        let (shutdown, _) = broadcast::channel(64);

        Self {
            address,
            port,
            shutdown,
            banner: String::default(),
            messages: MessageStore::default(),
            sessions: Arc::default(),
            queue: Arc::default(),
            stopped: Arc::default(),
            failed: Arc::default(),
            acceptor: Mutex::default(),
            local_addr: RwLock::default(),
            marker: PhantomData,
        }
    }

    /// Binds the endpoint and arms the accept loop, then returns; sessions
    /// run on their own tasks from here on.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be bound, or if this instance
    /// is already running. The server cannot run without its endpoint, so
    /// nothing is started in either case.
    pub async fn start(&self) -> Result<(), ServerError> {
        if self
            .acceptor
            .lock()
            .expect("acceptor lock poisoned")
            .is_some()
        {
            return Err(ServerError::AlreadyRunning);
        }

        let endpoint = SocketAddr::new(self.address, self.port);
        let listener = TcpListener::bind(endpoint)
            .await
            .map_err(|source| ServerError::Bind { endpoint, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { endpoint, source })?;

        *self
            .local_addr
            .write()
            .expect("local address lock poisoned") = Some(local_addr);
        self.stopped.store(false, Ordering::SeqCst);

        internal!(level = INFO, "Server started at {local_addr}");

        // Subscribed before the task spawns, so a stop() racing right behind
        // this start() cannot broadcast into a channel nobody listens to
        let receiver = self.shutdown.subscribe();

        let acceptor = tokio::spawn(Self::accept_loop(
            Proto::default(),
            listener,
            self.banner.clone(),
            self.messages.clone(),
            Arc::clone(&self.sessions),
            Arc::clone(&self.queue),
            Arc::clone(&self.stopped),
            Arc::clone(&self.failed),
            self.shutdown.clone(),
            receiver,
        ));

        *self.acceptor.lock().expect("acceptor lock poisoned") = Some(acceptor);

        Ok(())
    }

    /// Stops accepting, closes the endpoint, and cancels every session.
    ///
    /// The stopped flag is raised before anything else, so an accept racing
    /// with shutdown can never produce a new session. Safe to call twice,
    /// and on a server that never started; the second call is a no-op.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        internal!(level = INFO, "Stopping listener");

        let _ = self.shutdown.send(Signal::Shutdown);

        let acceptor = self.acceptor.lock().expect("acceptor lock poisoned").take();
        if let Some(acceptor) = acceptor {
            let _ = acceptor.await;
        }

        // The accept loop is done, so the registry can no longer grow
        join_all(self.sessions.take()).await;

        internal!(level = INFO, "Stopped listener");
    }

    /// Every message received so far, in arrival order.
    pub fn messages(&self) -> Vec<Mail> {
        self.messages.snapshot()
    }

    /// The address the listener actually bound, once running. Useful when
    /// binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .read()
            .expect("local address lock poisoned")
    }

    /// How many sessions were abandoned because of a failure unrelated to
    /// shutdown.
    pub fn failed_session_count(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    #[allow(clippy::too_many_arguments)]
    async fn accept_loop(
        handler: Proto,
        listener: TcpListener,
        banner: String,
        messages: MessageStore,
        sessions: Arc<SessionRegistry>,
        queue: Arc<AtomicU64>,
        stopped: Arc<AtomicBool>,
        failed: Arc<AtomicUsize>,
        shutdown: broadcast::Sender<Signal>,
        mut receiver: broadcast::Receiver<Signal>,
    ) {
        loop {
            tokio::select! {
                sig = receiver.recv() => {
                    if matches!(
                        sig,
                        Ok(Signal::Shutdown) | Err(broadcast::error::RecvError::Closed)
                    ) {
                        internal!(level = INFO, "Listener received shutdown, no longer accepting");
                        break;
                    }
                }

                connection = listener.accept() => {
                    // Subscribing before the flag check closes the race with
                    // stop(): either the raised flag is observed here, or the
                    // receiver predates the shutdown signal and the session
                    // will be cancelled through it.
                    let session_shutdown = shutdown.subscribe();

                    if stopped.load(Ordering::SeqCst) {
                        break;
                    }

                    match connection {
                        Ok((stream, peer)) => {
                            tracing::debug!("Connection received from {peer}");

                            let session = handler.handle(
                                stream,
                                peer,
                                messages.clone(),
                                Arc::clone(&queue),
                                banner.clone(),
                            );
                            let failed = Arc::clone(&failed);

                            sessions.register(tokio::spawn(async move {
                                if let Err(err) = session.run(session_shutdown).await {
                                    internal!(level = ERROR, "Session {peer} failed: {err}");
                                    failed.fetch_add(1, Ordering::Relaxed);
                                }
                            }));
                        }
                        Err(err) => {
                            internal!(level = ERROR, "Failed to accept connection: {err}");
                        }
                    }
                }
            }
        }

        // Dropping the listener releases the endpoint
    }
}
