//! Consecutive broker error tracking.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Counts consecutive broker errors that fall inside a rolling window.
///
/// A success breaks the streak. Errors older than the window no longer count.
#[derive(Debug)]
pub struct ErrorWindow {
    threshold: usize,
    window: Duration,
    errors: VecDeque<Instant>,
}

impl ErrorWindow {
    #[must_use]
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            threshold: threshold.max(1) as usize,
            window,
            errors: VecDeque::new(),
        }
    }

    /// Record an error at `now`. Returns `true` once the streak reaches the threshold.
    pub fn record_error(&mut self, now: Instant) -> bool {
        self.errors.push_back(now);
        while let Some(&first) = self.errors.front() {
            if now.duration_since(first) > self.window {
                self.errors.pop_front();
            } else {
                break;
            }
        }
        self.errors.len() >= self.threshold
    }

    pub fn record_success(&mut self) {
        self.errors.clear();
    }

    #[must_use]
    pub fn streak(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_at_threshold() {
        let now = Instant::now();
        let mut window = ErrorWindow::new(3, Duration::from_secs(60));
        assert!(!window.record_error(now));
        assert!(!window.record_error(now));
        assert!(window.record_error(now));
    }

    #[test]
    fn success_breaks_streak() {
        let now = Instant::now();
        let mut window = ErrorWindow::new(2, Duration::from_secs(60));
        window.record_error(now);
        window.record_success();
        assert!(!window.record_error(now));
    }

    #[test]
    fn old_errors_age_out() {
        let now = Instant::now();
        let mut window = ErrorWindow::new(2, Duration::from_secs(10));
        window.record_error(now);
        assert!(!window.record_error(now + Duration::from_secs(11)));
        assert_eq!(window.streak(), 1);
    }
}
