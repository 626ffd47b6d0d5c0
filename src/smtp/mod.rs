pub mod command;
pub mod connection;
pub mod envelope;
pub mod session;
pub mod status;

use core::fmt::{self, Display, Formatter};
use std::net::SocketAddr;
use std::sync::{atomic::AtomicU64, Arc};

use tokio::{net::TcpStream, sync::broadcast};

use crate::{
    server::Signal,
    store::MessageStore,
    traits::{
        fsm::FiniteStateMachine,
        protocol::{Protocol, SessionHandler},
    },
};

use self::{
    command::{Command, HeloVariant},
    envelope::Envelope,
    session::Session,
};

/// The SMTP protocol, as far as receiving mail goes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Smtp;

impl Protocol for Smtp {
    type Session = Session<TcpStream>;

    fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        messages: MessageStore,
        queue: Arc<AtomicU64>,
        banner: String,
    ) -> Self::Session {
        Session::create(stream, peer, messages, queue, banner)
    }
}

impl SessionHandler for Session<TcpStream> {
    async fn run(self, shutdown: broadcast::Receiver<Signal>) -> anyhow::Result<()> {
        Self::run(self, shutdown).await
    }
}

#[derive(PartialEq, PartialOrd, Eq, Hash, Debug, Clone, Copy, Default)]
pub enum State {
    #[default]
    Connect,
    Ehlo,
    Helo,
    MailFrom,
    RcptTo,
    Data,
    Reading,
    DataReceived,
    Rset,
    Quit,
    InvalidCommandSequence,
    Invalid,
}

impl Display for State {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            Self::Reading | Self::DataReceived => "",
            Self::Connect => "Connect",
            Self::Ehlo => "EHLO",
            Self::Helo => "HELO",
            Self::MailFrom => "MAIL",
            Self::RcptTo => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
            Self::Invalid => "INVALID",
            Self::InvalidCommandSequence => "Invalid Command Sequence",
        })
    }
}

impl FiniteStateMachine for State {
    type Input = Command;
    type Context = Envelope;

    fn transition(self, input: Self::Input, envelope: &mut Self::Context) -> Self {
        match (self, input) {
            (_, Command::Helo(HeloVariant::Ehlo(id))) => {
                envelope.greet(id);
                Self::Ehlo
            }
            (_, Command::Helo(HeloVariant::Helo(id))) => {
                envelope.greet(id);
                Self::Helo
            }
            (
                Self::Ehlo | Self::Helo | Self::Rset | Self::DataReceived,
                Command::MailFrom(from),
            ) => {
                envelope.set_sender(from);
                Self::MailFrom
            }
            (Self::MailFrom | Self::RcptTo, Command::RcptTo(to)) => {
                envelope.add_recipients(to);
                Self::RcptTo
            }
            (Self::RcptTo, Command::Data) => Self::Data,
            (
                Self::Ehlo | Self::Helo | Self::MailFrom | Self::RcptTo | Self::DataReceived
                | Self::Rset,
                Command::Rset,
            ) => {
                envelope.clear_transaction();
                Self::Rset
            }
            (_, Command::Quit) => Self::Quit,
            (_, Command::Invalid(_)) => Self::Invalid,
            _ => Self::InvalidCommandSequence,
        }
    }
}
