//! One-shot readiness signal

use tokio::sync::watch;

/// Fire-once gate marking the moment a peer's transport becomes usable.
///
/// `fire` is idempotent; any number of tasks can `wait` and each unblocks
/// exactly once. There is no reset: a reconnecting peer gets a fresh
/// session and a fresh gate.
#[derive(Clone)]
pub struct ReadyGate {
    tx: watch::Sender<bool>,
}

impl ReadyGate {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Fire the gate. Returns `true` only on the firing transition.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the gate has fired. Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so wait_for cannot fail here.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}
