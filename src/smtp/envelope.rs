use mailparse::{MailAddr, MailAddrList};

/// The transaction a session is accumulating: who greeted us, who the mail
/// is from, and who it is for. Cleared and refilled once per message on a
/// connection that delivers several.
#[derive(Default, Debug)]
pub struct Envelope {
    client_id: Option<String>,
    sender: Option<MailAddr>,
    recipients: Option<MailAddrList>,
}

impl Envelope {
    /// Records the HELO/EHLO identity. Greeting again abandons any
    /// transaction in progress.
    pub fn greet(&mut self, id: String) {
        self.client_id = Some(id);
        self.clear_transaction();
    }

    pub fn set_sender(&mut self, sender: Option<MailAddr>) {
        self.sender = sender;
        self.recipients = None;
    }

    pub fn add_recipients(&mut self, recipients: MailAddrList) {
        if let Some(existing) = self.recipients.as_mut() {
            existing.extend_from_slice(&recipients[..]);
        } else {
            self.recipients = Some(recipients);
        }
    }

    pub fn clear_transaction(&mut self) {
        self.sender = None;
        self.recipients = None;
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// The sender's bare address; empty for the null reverse-path.
    pub fn sender_address(&self) -> String {
        self.sender
            .as_ref()
            .map(|sender| match sender {
                MailAddr::Single(single) => single.addr.clone(),
                MailAddr::Group(group) => group.group_name.clone(),
            })
            .unwrap_or_default()
    }

    /// Every recipient's bare address, groups flattened.
    pub fn recipient_addresses(&self) -> Vec<String> {
        self.recipients
            .as_ref()
            .map(|recipients| {
                recipients
                    .iter()
                    .flat_map(|addr| match addr {
                        MailAddr::Single(single) => vec![single.addr.clone()],
                        MailAddr::Group(group) => {
                            group.addrs.iter().map(|s| s.addr.clone()).collect()
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::Envelope;

    #[test]
    fn accumulates_recipients() {
        let mut envelope = Envelope::default();
        envelope.set_sender(Some(
            mailparse::addrparse("from@example.com").unwrap()[0].clone(),
        ));
        envelope.add_recipients(mailparse::addrparse("one@example.com").unwrap());
        envelope.add_recipients(mailparse::addrparse("two@example.com").unwrap());

        assert_eq!(envelope.sender_address(), "from@example.com");
        assert_eq!(
            envelope.recipient_addresses(),
            vec!["one@example.com", "two@example.com"]
        );
    }

    #[test]
    fn greet_abandons_the_transaction() {
        let mut envelope = Envelope::default();
        envelope.set_sender(Some(
            mailparse::addrparse("from@example.com").unwrap()[0].clone(),
        ));
        envelope.greet(String::from("client.example.com"));

        assert_eq!(envelope.client_id(), Some("client.example.com"));
        assert_eq!(envelope.sender_address(), "");
        assert!(envelope.recipient_addresses().is_empty());
    }

    #[test]
    fn new_sender_clears_previous_recipients() {
        let mut envelope = Envelope::default();
        envelope.set_sender(Some(
            mailparse::addrparse("a@example.com").unwrap()[0].clone(),
        ));
        envelope.add_recipients(mailparse::addrparse("one@example.com").unwrap());

        envelope.set_sender(Some(
            mailparse::addrparse("b@example.com").unwrap()[0].clone(),
        ));
        assert!(envelope.recipient_addresses().is_empty());
    }

    #[test]
    fn null_sender_is_empty() {
        let mut envelope = Envelope::default();
        envelope.set_sender(None);
        assert_eq!(envelope.sender_address(), "");
    }
}
