//! Cumulative thinking-time accounting.

use tokio::time::Instant;

/// Tracks how long ephemeral activity has been on screen.
///
/// The open period start doubles as the single authoritative "is thinking"
/// flag for the session.
#[derive(Debug, Default, Clone)]
pub struct ThinkingClock {
    accumulated_secs: u64,
    period_start: Option<Instant>,
}

impl ThinkingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_thinking(&self) -> bool {
        self.period_start.is_some()
    }

    pub fn accumulated_secs(&self) -> u64 {
        self.accumulated_secs
    }

    /// Open a period at `now` unless one is already open. Returns true if opened.
    pub fn open(&mut self, now: Instant) -> bool {
        if self.period_start.is_some() {
            return false;
        }
        self.period_start = Some(now);
        true
    }

    /// Close the open period, adding its floored length. Returns the seconds added.
    pub fn close(&mut self, now: Instant) -> Option<u64> {
        let start = self.period_start.take()?;
        let elapsed = now.saturating_duration_since(start).as_secs();
        self.accumulated_secs = self.accumulated_secs.saturating_add(elapsed);
        Some(elapsed)
    }

    /// Accumulated time plus the open period so far, for the live readout
    pub fn live_secs(&self, now: Instant) -> u64 {
        let open = self
            .period_start
            .map(|start| now.saturating_duration_since(start).as_secs())
            .unwrap_or(0);
        self.accumulated_secs.saturating_add(open)
    }

    /// Close any open period and return the total to persist
    pub fn finish(&mut self, now: Instant) -> u64 {
        self.close(now);
        self.accumulated_secs
    }
}
