//! An embedded SMTP server for tests.
//!
//! `mailsink` listens on a real socket, speaks enough SMTP to receive mail,
//! and keeps every decoded message in memory so the software under test can
//! assert on what would have been sent, without a real mail transfer agent.

mod config;
mod error;
pub mod logging;
mod mail;
mod registry;
mod server;
mod smtp;
mod store;
mod traits;

pub use config::Config;
pub use error::ServerError;
pub use mail::Mail;
pub use server::{Signal, SmtpServer};
pub use smtp::Smtp;
pub use store::MessageStore;
pub use traits::protocol::{Protocol, SessionHandler};

pub use tracing;
