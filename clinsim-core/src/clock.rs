//! Time sources for sessions.
use chrono::{DateTime, TimeDelta, Utc};
use std::cell::Cell;

/// Supplies the timestamps that transitions stamp onto state.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock that starts at a fixed instant and advances by a fixed
/// step every time it is read.
#[derive(Debug, Clone)]
pub struct SteppingClock {
    next: Cell<DateTime<Utc>>,
    step: TimeDelta,
}

impl SteppingClock {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, step: TimeDelta) -> Self {
        Self {
            next: Cell::new(start),
            step,
        }
    }
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH, TimeDelta::seconds(1))
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let current = self.next.get();
        self.next
            .set(current.checked_add_signed(self.step).unwrap_or(current));
        current
    }
}
