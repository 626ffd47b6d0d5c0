//! Proves a stock SMTP client can deliver to the server.

use std::net::{IpAddr, Ipv4Addr};

use lettre::message::Mailbox;
use lettre::{Message, SmtpTransport, Transport};
use mailsink::SmtpServer;

#[tokio::test(flavor = "multi_thread")]
async fn a_real_client_can_deliver_mail() {
    let server: SmtpServer = SmtpServer::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
    server.start().await.expect("server should start");
    let addr = server.local_addr().expect("server should know its address");

    let message = Message::builder()
        .from("Sender <sender@example.com>".parse::<Mailbox>().unwrap())
        .to("Recipient <recipient@example.com>".parse::<Mailbox>().unwrap())
        .subject("Interop")
        .body(String::from("Hello from a real SMTP client"))
        .unwrap();

    let mailer = SmtpTransport::builder_dangerous("127.0.0.1")
        .port(addr.port())
        .build();

    tokio::task::spawn_blocking(move || mailer.send(&message).expect("send failed"))
        .await
        .expect("sender task panicked");

    let messages = server.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_from("sender@example.com"));
    assert!(messages[0].has_recipient("recipient@example.com"));
    assert_eq!(messages[0].subject().as_deref(), Some("Interop"));
    assert!(messages[0]
        .body()
        .unwrap()
        .contains("Hello from a real SMTP client"));

    server.stop().await;
}
