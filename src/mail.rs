use std::time::SystemTime;

use mailparse::MailHeaderMap;

/// One decoded piece of mail, as a session committed it.
///
/// Immutable once created; the store owns it and sessions never read it
/// back. The payload is kept as the raw bytes the client transmitted (with
/// the end-of-data terminator stripped), with helpers for the things tests
/// usually assert on.
#[derive(Debug, Clone)]
pub struct Mail {
    sender: String,
    recipients: Vec<String>,
    data: Vec<u8>,
    received_at: SystemTime,
}

impl Mail {
    pub(crate) fn new(sender: String, recipients: Vec<String>, data: Vec<u8>) -> Self {
        Self {
            sender,
            recipients,
            data,
            received_at: SystemTime::now(),
        }
    }

    /// The envelope sender. Empty for the null reverse-path (`MAIL FROM:<>`).
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// The envelope recipients, in the order the client named them.
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// The raw message payload, headers included.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// The payload decoded to text.
    pub fn message(&self) -> String {
        charset::Charset::for_encoding(encoding_rs::UTF_8)
            .decode(&self.data)
            .0
            .to_string()
    }

    /// The value of the `Subject` header, if the payload carries one.
    pub fn subject(&self) -> Option<String> {
        mailparse::parse_mail(&self.data)
            .ok()?
            .headers
            .get_first_value("Subject")
    }

    /// The decoded message body, without headers.
    pub fn body(&self) -> Option<String> {
        mailparse::parse_mail(&self.data).ok()?.get_body().ok()
    }

    pub fn is_from(&self, sender: &str) -> bool {
        self.sender == sender
    }

    pub fn has_recipient(&self, recipient: &str) -> bool {
        self.recipients.iter().any(|addr| addr == recipient)
    }
}
