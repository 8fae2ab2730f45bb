//! Notifier that keeps every event for later assertions.

use parking_lot::Mutex;

use crate::port::outbound::notifier::{Event, EventKind, Notifier, Severity};

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Events matching `pred`.
    pub fn count(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(&e.kind)).count()
    }

    /// Events at or above `severity`.
    #[must_use]
    pub fn at_least(&self, severity: Severity) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.severity() >= severity)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: Event) {
        self.events.lock().push(event);
    }
}
