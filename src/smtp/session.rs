use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;

use crate::{
    incoming, internal, mail::Mail, outgoing, server::Signal, store::MessageStore,
    traits::fsm::FiniteStateMachine,
};

use super::{command::Command, connection::Connection, envelope::Envelope, status::Status, State};

#[derive(PartialEq, Eq, Debug)]
pub enum Event {
    ConnectionClose,
    ConnectionKeepAlive,
}

#[derive(Debug, Clone)]
pub struct Context {
    pub state: State,
    pub message: Vec<u8>,
    pub sent: bool,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            state: State::Connect,
            message: Vec::default(),
            sent: false,
        }
    }
}

pub type Response = (Option<Vec<String>>, Event);

/// One accepted connection's SMTP exchange.
///
/// The session owns its transport exclusively and runs on its own task. It
/// appends each fully decoded message to the store it was created with, and
/// never reads the store back.
pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    peer: SocketAddr,
    banner: String,
    queue: Arc<AtomicU64>,
    context: Context,
    envelope: Envelope,
    reply: Option<(Status, String)>,
    messages: MessageStore,
    connection: Connection<Stream>,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    pub(crate) fn create(
        stream: Stream,
        peer: SocketAddr,
        messages: MessageStore,
        queue: Arc<AtomicU64>,
        banner: String,
    ) -> Self {
        Self {
            peer,
            queue,
            messages,
            connection: Connection::new(stream),
            context: Context::default(),
            envelope: Envelope::default(),
            reply: None,
            banner: if banner.is_empty() {
                "localhost".to_string()
            } else {
                banner
            },
        }
    }

    /// Drives the exchange to completion.
    ///
    /// Terminates cleanly on QUIT, on end-of-stream, and on the shutdown
    /// broadcast; the latter closes the transport immediately, which is the
    /// cancellation path `SmtpServer::stop` relies on. Anything else that
    /// goes wrong with the transport is an error of this one connection.
    pub(crate) async fn run(
        mut self,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> anyhow::Result<()> {
        internal!("Connected to {}", self.peer);

        loop {
            let (response, event) = self.response();
            self.context.sent = true;

            for response in response.unwrap_or_default() {
                outgoing!("{response}");
                self.connection.send(&response).await?;
            }

            if event == Event::ConnectionClose {
                break;
            }

            tokio::select! {
                sig = shutdown.recv() => {
                    if matches!(
                        sig,
                        Ok(Signal::Shutdown) | Err(broadcast::error::RecvError::Closed)
                    ) {
                        internal!("Session {} cancelled by shutdown", self.peer);
                        self.connection.close().await;
                        return Ok(());
                    }
                }

                received = self.receive() => {
                    if received? {
                        break;
                    }
                }
            }
        }

        internal!("Connection closed");

        Ok(())
    }

    /// Generate the response(s) that should be sent back to the client
    /// depending on the session's state
    fn response(&mut self) -> Response {
        if self.context.sent {
            return (None, Event::ConnectionKeepAlive);
        }

        if let Some((status, message)) = self.reply.take() {
            return (
                Some(vec![format!("{status} {message}")]),
                if status.is_permanent() {
                    Event::ConnectionClose
                } else {
                    Event::ConnectionKeepAlive
                },
            );
        }

        match self.context.state {
            State::Connect => (
                Some(vec![format!("{} {}", Status::ServiceReady, self.banner)]),
                Event::ConnectionKeepAlive,
            ),
            State::Helo | State::Ehlo => (
                Some(vec![format!(
                    "{} Hello {}",
                    Status::Ok,
                    self.envelope.client_id().unwrap_or_default()
                )]),
                Event::ConnectionKeepAlive,
            ),
            State::MailFrom | State::RcptTo | State::Rset => (
                Some(vec![format!("{} Ok", Status::Ok)]),
                Event::ConnectionKeepAlive,
            ),
            State::Data => {
                self.context.state = State::Reading;
                (
                    Some(vec![format!(
                        "{} End data with <CR><LF>.<CR><LF>",
                        Status::StartMailInput
                    )]),
                    Event::ConnectionKeepAlive,
                )
            }
            State::DataReceived => {
                let queue = self.queue.fetch_add(1, Ordering::Relaxed);
                let data = std::mem::take(&mut self.context.message);

                self.messages.append(Mail::new(
                    self.envelope.sender_address(),
                    self.envelope.recipient_addresses(),
                    data,
                ));
                self.envelope.clear_transaction();

                (
                    Some(vec![format!("{} Ok: queued as {queue}", Status::Ok)]),
                    Event::ConnectionKeepAlive,
                )
            }
            State::Quit => (
                Some(vec![format!("{} Bye", Status::GoodBye)]),
                Event::ConnectionClose,
            ),
            State::Reading => (None, Event::ConnectionKeepAlive),
            State::InvalidCommandSequence => (
                Some(vec![format!(
                    "{} Bad sequence of commands",
                    Status::InvalidCommandSequence
                )]),
                Event::ConnectionClose,
            ),
            State::Invalid => (
                Some(vec![format!(
                    "{} Syntax error, command unrecognized",
                    Status::SyntaxError
                )]),
                Event::ConnectionClose,
            ),
        }
    }

    /// Returns `Ok(true)` once the peer is done writing.
    async fn receive(&mut self) -> anyhow::Result<bool> {
        let mut received_data = [0; 4096];

        match self.connection.receive(&mut received_data).await {
            // Consider any errors received here to be fatal for the session
            Err(err) => Err(err),
            Ok(0) => {
                // Reading 0 bytes means the other side has closed the
                // connection or is done writing, then so are we.
                Ok(true)
            }
            Ok(bytes_read) => {
                let received = &received_data[..bytes_read];

                if self.context.state == State::Reading {
                    self.context.message.extend(received);

                    // A lone dot line is a message whose payload is empty
                    if self.context.message.ends_with(b"\r\n.\r\n")
                        || self.context.message.as_slice() == b".\r\n"
                    {
                        let mut data = std::mem::take(&mut self.context.message);
                        data.truncate(data.len().saturating_sub(3));

                        self.context = Context {
                            state: State::DataReceived,
                            message: data,
                            sent: false,
                        };
                    }
                } else {
                    let command = Command::try_from(received).map_or_else(|e| e, |c| c);

                    incoming!("{command}");

                    if command == Command::Noop {
                        self.reply = Some((Status::Ok, String::from("Ok")));
                        self.context.sent = false;
                    } else {
                        let message = command.inner().into_bytes();

                        self.context = Context {
                            state: self.context.state.transition(command, &mut self.envelope),
                            message,
                            sent: false,
                        };
                    }
                }

                Ok(false)
            }
        }
    }
}
