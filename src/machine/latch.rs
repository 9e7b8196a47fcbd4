//! One-shot latch signalling that the stopping state's action has run.

use tokio::sync::watch;

/// A latch that can be released once and awaited any number of times.
///
/// Releasing an already released latch is a no-op, so re-entering the
/// stopping state can never signal completion twice.
pub(crate) struct StopLatch {
    tx: watch::Sender<bool>,
}

impl StopLatch {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Release the latch. Returns `true` only for the call that released it.
    pub(crate) fn release(&self) -> bool {
        self.tx.send_if_modified(|released| {
            if *released {
                false
            } else {
                *released = true;
                true
            }
        })
    }

    pub(crate) fn is_released(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the latch is released; returns at once if it already is.
    pub(crate) async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|released| *released).await;
    }
}
