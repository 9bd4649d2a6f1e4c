use std::time::Duration;

use web_time::Instant;

/// Rate gate for high-frequency values.
///
/// At most one value is emitted per interval. The first value after an idle
/// period goes through immediately; values arriving inside the interval
/// replace each other, and the latest one is emitted once the interval has
/// elapsed (see [`Throttle::poll`]) so the final value is never lost.
#[derive(Debug)]
pub struct Throttle<T> {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Submit a value. Returns it back when it may be emitted right away.
    pub fn offer(&mut self, value: T, now: Instant) -> Option<T> {
        if self.is_open(now) {
            self.last_emit = Some(now);
            self.pending = None;
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Emit the trailing value once its interval has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.pending.is_some() && self.is_open(now) {
            self.last_emit = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    /// Emit the trailing value regardless of timing.
    pub fn flush(&mut self, now: Instant) -> Option<T> {
        let value = self.pending.take()?;
        self.last_emit = Some(now);
        Some(value)
    }

    /// When the pending trailing value becomes due, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        Some(self.last_emit.map_or_else(Instant::now, |last| last + self.interval))
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn is_open(&self, now: Instant) -> bool {
        self.last_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }
}
