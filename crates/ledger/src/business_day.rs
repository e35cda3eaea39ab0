//! Calendar-day semantics for the ledger.
//!
//! A "business day" is a calendar date in one fixed reporting timezone, not
//! a UTC date. Every timestamp is normalized to `DateTime<Utc>` at the store
//! boundary; this module is the only place that maps instants to dates.

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Maps instants to reporting-timezone calendar dates and back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusinessDay {
    tz: Tz,
}

impl BusinessDay {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// The calendar date `instant` falls on in the reporting timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Today's business date.
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    /// Half-open UTC bounds `[start, end)` of a business date, for range
    /// queries against the transaction log.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.day_start(date), self.day_start(date + TimeDelta::days(1)))
    }

    fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        // On a DST gap there is no local midnight; take the earliest valid
        // instant of the day.
        match self.tz.from_local_datetime(&midnight) {
            chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
                dt.with_timezone(&Utc)
            }
            chrono::LocalResult::None => self
                .tz
                .from_utc_datetime(&midnight)
                .with_timezone(&Utc),
        }
    }
}

impl Default for BusinessDay {
    /// Lima is the reporting timezone of the product; it observes no DST.
    fn default() -> Self {
        Self::new(chrono_tz::America::Lima)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn utc_evening_is_still_the_same_lima_day() {
        let day = BusinessDay::default();
        // 04:59 UTC = 23:59 in Lima the previous day.
        let instant = Utc.with_ymd_and_hms(2026, 7, 2, 4, 59, 0).unwrap();
        assert_eq!(
            day.local_date(instant),
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
        );
    }

    #[test]
    fn day_bounds_are_half_open_and_contiguous() {
        let day = BusinessDay::default();
        let date = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let next = NaiveDate::from_ymd_opt(2026, 7, 2).unwrap();

        let (start, end) = day.day_bounds(date);
        assert_eq!(end - start, TimeDelta::days(1));
        assert_eq!(day.day_bounds(next).0, end);
        assert_eq!(day.local_date(start), date);
        assert_eq!(day.local_date(end - TimeDelta::seconds(1)), date);
        assert_eq!(day.local_date(end), next);
    }
}
