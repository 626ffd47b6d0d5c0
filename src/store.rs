use std::sync::{Arc, RwLock};

use crate::mail::Mail;

/// Shared, append-only collection of every message the server has decoded.
///
/// Clones are handles to the same storage. A clone is the only capability a
/// session is given for reporting mail; the store grows for the lifetime of
/// the server and is never pruned, so "all received mail" stays queryable.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    inner: Arc<RwLock<Vec<Mail>>>,
}

impl MessageStore {
    pub fn append(&self, mail: Mail) {
        self.inner
            .write()
            .expect("message store lock poisoned")
            .push(mail);
    }

    /// A consistent copy of the messages received so far, in arrival order.
    pub fn snapshot(&self) -> Vec<Mail> {
        self.inner
            .read()
            .expect("message store lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .expect("message store lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::MessageStore;
    use crate::mail::Mail;

    fn mail(sender: &str) -> Mail {
        Mail::new(
            sender.to_string(),
            vec![String::from("rcpt@example.com")],
            b"Subject: test\r\n\r\nbody\r\n".to_vec(),
        )
    }

    #[test]
    fn append_preserves_arrival_order() {
        let store = MessageStore::default();
        store.append(mail("first@example.com"));
        store.append(mail("second@example.com"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].sender(), "first@example.com");
        assert_eq!(snapshot[1].sender(), "second@example.com");
    }

    #[test]
    fn snapshot_is_a_copy() {
        let store = MessageStore::default();
        store.append(mail("a@example.com"));

        let snapshot = store.snapshot();
        store.append(mail("b@example.com"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let store = MessageStore::default();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    for j in 0..50 {
                        store.append(mail(&format!("sender-{i}-{j}@example.com")));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 8 * 50);
    }
}
