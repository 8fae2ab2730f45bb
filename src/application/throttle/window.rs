//! Sliding-window admission control.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::port::outbound::broker::ThrottleTicket;

/// Sliding window that grants at most `capacity` tickets in any span of
/// length `period`.
///
/// Every grant is recorded with its timestamp. A new grant at `now` is allowed
/// when fewer than `capacity` grants fall in `(now - period, now]`; otherwise
/// the caller is told when the oldest grant ages out.
#[derive(Debug)]
pub struct RateWindow {
    capacity: usize,
    period: Duration,
    grants: VecDeque<Instant>,
}

impl RateWindow {
    /// Create a window. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: u32, period: Duration) -> Self {
        let capacity = capacity.max(1) as usize;
        Self {
            capacity,
            period,
            grants: VecDeque::with_capacity(capacity),
        }
    }

    /// Window of `capacity` requests per second.
    #[must_use]
    pub fn per_second(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(1))
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.grants.front() {
            if oldest + self.period <= now {
                self.grants.pop_front();
            } else {
                break;
            }
        }
    }

    /// Grant a ticket at `now`, or return the instant the next slot opens.
    pub fn try_grant(&mut self, now: Instant) -> Result<ThrottleTicket, Instant> {
        self.prune(now);
        if self.grants.len() < self.capacity {
            self.grants.push_back(now);
            return Ok(ThrottleTicket::issue(now));
        }
        // Saturated: the front entry is the oldest grant still inside the window.
        let reopens = self.grants.front().map_or(now, |&oldest| oldest + self.period);
        Err(reopens)
    }

    /// Grants currently inside the window.
    pub fn in_flight(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.grants.len()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}
