//! Zone serial arithmetic
//!
//! Serials are either date encoded (`YYYYMMDDnn`, where `nn` is the revision
//! of the day) or plain counters. Secondaries only transfer a zone when its
//! serial is greater than the one they hold, in the sense of RFC 1982, so
//! every committed change must produce a strictly greater serial.

use crate::error::SerialError;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::cmp::Ordering;

/// Serial value meaning "not managed here"; it is never bumped
pub const UNSET_SERIAL: u32 = 0;

/// Highest revision a date-encoded serial can carry within one day
pub const MAX_DAILY_REVISION: u32 = 99;

/// How a stored serial is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum SerialFormat {
    Unset,
    Dated { date: NaiveDate, revision: u32 },
    Counter,
}

impl SerialFormat {
    pub fn of(serial: u32) -> Self {
        if serial == UNSET_SERIAL {
            return SerialFormat::Unset;
        }
        match decode_date(serial) {
            Some((date, revision)) => SerialFormat::Dated { date, revision },
            None => SerialFormat::Counter,
        }
    }
}

/// Compute the serial that must follow `current` when a change is committed
/// on `today`.
///
/// Reaching revision 99 on the current day is an error rather than a silent
/// freeze or wrap; callers surface it to the operator.
pub fn next_serial(current: u32, today: NaiveDate) -> Result<u32, SerialError> {
    let (stored_date, revision) = match SerialFormat::of(current) {
        SerialFormat::Unset => return Ok(UNSET_SERIAL),
        SerialFormat::Counter => return Ok(increment(current)),
        SerialFormat::Dated { date, revision } => (date, revision),
    };

    let Some(today_encoded) = encode_date(today) else {
        return Ok(increment(current));
    };

    match stored_date.cmp(&today) {
        Ordering::Equal if revision >= MAX_DAILY_REVISION => {
            Err(SerialError::Overflow { serial: current })
        }
        Ordering::Equal => Ok(current + 1),
        Ordering::Less => Ok(today_encoded),
        // Clock skew or a hand-edited serial; keep counting
        Ordering::Greater => Ok(increment(current)),
    }
}

/// Encode a date as `YYYYMMDD00`, or `None` if it does not fit a `u32`
pub fn encode_date(date: NaiveDate) -> Option<u32> {
    let year = u32::try_from(date.year()).ok()?;
    if !(1000..=9999).contains(&year) {
        return None;
    }
    let ymd = year * 10_000 + date.month() * 100 + date.day();
    ymd.checked_mul(100)
}

fn decode_date(serial: u32) -> Option<(NaiveDate, u32)> {
    let ymd = serial / 100;
    if !(10_000_000..=99_999_999).contains(&ymd) {
        return None;
    }
    let year = i32::try_from(ymd / 10_000).ok()?;
    let month = (ymd / 100) % 100;
    let day = ymd % 100;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some((date, serial % 100))
}

fn increment(serial: u32) -> u32 {
    match serial.wrapping_add(1) {
        UNSET_SERIAL => 1,
        next => next,
    }
}

/// Compare two serials using RFC 1982 sequence space arithmetic.
///
/// Returns `None` for pairs exactly 2^31 apart, whose order is undefined.
pub fn serial_cmp(a: u32, b: u32) -> Option<Ordering> {
    const HALF: u32 = 1 << 31;
    if a == b {
        return Some(Ordering::Equal);
    }
    let distance = b.wrapping_sub(a);
    match distance.cmp(&HALF) {
        Ordering::Less => Some(Ordering::Less),
        Ordering::Greater => Some(Ordering::Greater),
        Ordering::Equal => None,
    }
}

/// `a` is strictly greater than `b` in RFC 1982 terms
pub fn serial_gt(a: u32, b: u32) -> bool {
    serial_cmp(a, b) == Some(Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_unset_serial_is_never_bumped() {
        assert_eq!(next_serial(0, date(2011, 5, 26)).unwrap(), 0);
        assert_eq!(next_serial(0, date(1999, 1, 1)).unwrap(), 0);
    }

    #[test]
    fn test_same_day_increments_revision() {
        assert_eq!(
            next_serial(2011052600, date(2011, 5, 26)).unwrap(),
            2011052601
        );
        assert_eq!(
            next_serial(2011052698, date(2011, 5, 26)).unwrap(),
            2011052699
        );
    }

    #[test]
    fn test_same_day_revision_exhausted() {
        assert_eq!(
            next_serial(2011052699, date(2011, 5, 26)),
            Err(SerialError::Overflow { serial: 2011052699 })
        );
    }

    #[test]
    fn test_older_date_resets_revision() {
        assert_eq!(
            next_serial(2011052607, date(2011, 5, 27)).unwrap(),
            2011052700
        );
        assert_eq!(
            next_serial(2011052699, date(2012, 1, 1)).unwrap(),
            2012010100
        );
    }

    #[test]
    fn test_future_date_counts_up() {
        assert_eq!(
            next_serial(2030010105, date(2011, 5, 26)).unwrap(),
            2030010106
        );
        assert_eq!(
            next_serial(2030010199, date(2011, 5, 26)).unwrap(),
            2030010200
        );
    }

    #[test]
    fn test_non_date_serials_count_up() {
        assert_eq!(next_serial(1, date(2011, 5, 26)).unwrap(), 2);
        assert_eq!(next_serial(12345, date(2011, 5, 26)).unwrap(), 12346);
        // 2011-13-40 is not a calendar date
        assert_eq!(
            next_serial(2011134000, date(2011, 5, 26)).unwrap(),
            2011134001
        );
    }

    #[test]
    fn test_counter_wraps_past_sentinel() {
        assert_eq!(next_serial(u32::MAX, date(2011, 5, 26)).unwrap(), 1);
    }

    #[test]
    fn test_later_dates_always_reset() {
        let stored = date(2011, 5, 26);
        for days in 1..800 {
            let today = stored.checked_add_days(Days::new(days)).unwrap();
            for revision in [0, 1, 42, 99] {
                let current = encode_date(stored).unwrap() + revision;
                let next = next_serial(current, today).unwrap();
                assert_eq!(next, encode_date(today).unwrap());
                assert_eq!(next % 100, 0);
                assert!(serial_gt(next, current));
            }
        }
    }

    #[test]
    fn test_serial_format() {
        assert_eq!(SerialFormat::of(0), SerialFormat::Unset);
        assert_eq!(SerialFormat::of(17), SerialFormat::Counter);
        assert_eq!(
            SerialFormat::of(2011052603),
            SerialFormat::Dated {
                date: date(2011, 5, 26),
                revision: 3
            }
        );
        assert_eq!(SerialFormat::of(2011022900), SerialFormat::Counter);
    }

    #[test]
    fn test_rfc1982_comparison() {
        assert!(serial_gt(2, 1));
        assert!(!serial_gt(1, 2));
        assert!(serial_gt(1, u32::MAX));
        assert!(!serial_gt(5, 5));
        assert_eq!(serial_cmp(0, 1 << 31), None);
        assert_eq!(serial_cmp(7, 7), Some(Ordering::Equal));
    }
}
