//! Inactivity watchdog.

use std::time::Duration;

use tokio::time::Instant;

/// Deadline that moves forward on every accepted event.
///
/// The watchdog only holds the deadline; the runner sleeps until it and
/// reports the fire back to the engine.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Arm (or re-arm) the deadline from `now`.
    ///
    /// A timeout too large to represent as an instant leaves the watchdog
    /// without a deadline.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = now.checked_add(self.timeout);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}
