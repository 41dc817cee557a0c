//! Coalescing of buffer growth into bounded-rate recompute ticks.
//!
//! The scheduler is a plain state machine over [`Instant`]s; the driver owns
//! the actual timer. A tick becomes due once arrivals have been quiet for the
//! batch interval (trailing edge), or once the first unprocessed arrival is
//! `max_wait` old, whichever comes first. The second bound keeps a feed that
//! never goes quiet from starving the view.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::LiveLogsConfig;

/// Debounce state for recompute ticks.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    interval: Duration,
    max_wait: Duration,
    first_pending: Option<Instant>,
    last_growth: Option<Instant>,
    ticks: u64,
}

impl BatchScheduler {
    /// Creates a scheduler.
    ///
    /// A `max_wait` shorter than `interval` is raised to `interval`.
    #[must_use]
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval,
            max_wait: max_wait.max(interval),
            first_pending: None,
            last_growth: None,
            ticks: 0,
        }
    }

    /// Creates a scheduler from configuration.
    #[must_use]
    pub fn from_config(config: &LiveLogsConfig) -> Self {
        Self::new(config.batch_interval, config.max_batch_wait)
    }

    /// Records that a buffer grew at `now`.
    pub fn note_growth(&mut self, now: Instant) {
        if self.first_pending.is_none() {
            self.first_pending = Some(now);
        }
        self.last_growth = Some(now);
    }

    /// When the next tick is due, if any growth is pending.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        let first = self.first_pending?;
        let last = self.last_growth.unwrap_or(first);
        Some((last + self.interval).min(first + self.max_wait))
    }

    /// Returns true if a tick is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| deadline <= now)
    }

    /// Consumes a due tick. Returns false if nothing is due yet.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.clear();
        self.ticks += 1;
        true
    }

    /// Forgets pending growth, e.g. after an out-of-band recompute.
    pub const fn clear(&mut self) {
        self.first_pending = None;
        self.last_growth = None;
    }

    /// Returns true if growth is waiting for a tick.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.first_pending.is_some()
    }

    /// Number of ticks fired so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Quiet period before a trailing-edge tick.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound between first pending growth and its tick.
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        self.max_wait
    }
}
