use std::sync::Mutex;

use tokio::task::JoinHandle;

/// Every session task spawned during the server's lifetime.
///
/// Entries are never removed individually; the registry is drained exactly
/// once at shutdown and discarded with the server. Finished tasks cost
/// nothing to join again at that point.
#[derive(Debug, Default)]
pub(crate) struct SessionRegistry {
    inner: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionRegistry {
    pub(crate) fn register(&self, session: JoinHandle<()>) {
        self.inner
            .lock()
            .expect("session registry lock poisoned")
            .push(session);
    }

    /// Removes and returns everything registered so far. Sessions registered
    /// by a racing accept after this point are not visited; shutdown only
    /// promises to stop what exists when it runs.
    pub(crate) fn take(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(
            &mut *self
                .inner
                .lock()
                .expect("session registry lock poisoned"),
        )
    }
}
