//! Time sources.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, Utc, Weekday};
use std::cell::Cell;
use std::rc::Rc;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Weekday as the user sees it.
    fn weekday(&self, at: DateTime<Utc>) -> Weekday {
        at.with_timezone(&Local).weekday()
    }
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Clones share the same instant, so a test can keep
/// a handle after moving the clock into an engine. Weekdays are taken in UTC.
#[derive(Clone, Debug)]
pub struct FixedClock(Rc<Cell<DateTime<Utc>>>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Rc::new(Cell::new(at)))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.0.set(at);
    }

    pub fn advance(&self, by: ChronoDuration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }

    fn weekday(&self, at: DateTime<Utc>) -> Weekday {
        at.weekday()
    }
}
