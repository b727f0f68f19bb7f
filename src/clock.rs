use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Source of the current calendar date used for date-encoded serials
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

/// Wall clock, read in a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Returns `None` if the offset is a day or more from UTC
    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// A clock that reports whatever date it was last set to
#[derive(Debug)]
pub struct FixedClock {
    date: RwLock<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: RwLock::new(date),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.write() = date;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.date.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        assert!(SystemClock::with_offset_minutes(120).is_some());
        assert!(SystemClock::with_offset_minutes(-600).is_some());
        assert!(SystemClock::with_offset_minutes(24 * 60).is_none());
        assert_eq!(SystemClock::utc().offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_fixed_clock() {
        let start = NaiveDate::from_ymd_opt(2011, 5, 26).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        assert_eq!(clock.today(), start);

        let next = NaiveDate::from_ymd_opt(2011, 5, 27).unwrap();
        clock.set(next);
        assert_eq!(Clock::today(&clock), next);
    }
}
