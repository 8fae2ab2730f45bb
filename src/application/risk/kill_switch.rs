//! Process-wide trading halt latch.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::watch;

/// Latch that stops all new trading until an operator resets it.
///
/// Engagement is broadcast on a `watch` channel so running sessions can
/// abort without polling.
pub struct KillSwitch {
    engaged: AtomicBool,
    reason: RwLock<Option<String>>,
    tx: watch::Sender<bool>,
}

impl KillSwitch {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            engaged: AtomicBool::new(false),
            reason: RwLock::new(None),
            tx,
        }
    }

    /// Engage the switch. Returns `true` if this call engaged it; the reason
    /// of the first engagement is kept.
    pub fn engage(&self, reason: impl Into<String>) -> bool {
        if self.engaged.swap(true, Ordering::SeqCst) {
            return false;
        }
        *self.reason.write() = Some(reason.into());
        self.tx.send_replace(true);
        true
    }

    /// Clear the switch. Returns `true` if it was engaged.
    pub fn reset(&self) -> bool {
        let was = self.engaged.swap(false, Ordering::SeqCst);
        *self.reason.write() = None;
        self.tx.send_replace(false);
        was
    }

    #[must_use]
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Receiver that observes engagement changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let switch = KillSwitch::new();
        assert!(switch.engage("disconnect"));
        assert!(!switch.engage("pl floor"));
        assert_eq!(switch.reason().as_deref(), Some("disconnect"));
    }

    #[test]
    fn reset_clears_reason() {
        let switch = KillSwitch::new();
        switch.engage("disconnect");
        assert!(switch.reset());
        assert!(!switch.is_engaged());
        assert!(switch.reason().is_none());
        assert!(!switch.reset());
    }

    #[tokio::test]
    async fn subscribers_see_engagement() {
        let switch = KillSwitch::new();
        let mut rx = switch.subscribe();
        assert!(!*rx.borrow());

        switch.engage("manual");
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[test]
    fn waiting_session_is_woken() {
        let switch = KillSwitch::new();
        let mut rx = switch.subscribe();
        let mut waiting =
            tokio_test::task::spawn(async move { rx.wait_for(|engaged| *engaged).await.is_ok() });
        tokio_test::assert_pending!(waiting.poll());

        switch.engage("pl floor");

        assert!(waiting.is_woken());
        tokio_test::assert_ready_eq!(waiting.poll(), true);
    }
}
