//! Closure streaks for gamified reporting.
//!
//! Pure functions over the recorded cash events; no clock access, callers
//! pass "today" explicitly.

use std::collections::HashSet;

use chrono::{NaiveDate, TimeDelta};

use crate::cash_event::{CashEvent, CashEventKind};

/// Days a streak may idle before it is considered lost.
pub const DEFAULT_ALLOWED_GAP: u32 = 5;

/// Counts consecutive calendar days with a completed closure, walking
/// backward from `today`.
///
/// A day not yet closed does not break the count while the business day is
/// still running: if `today` has no closure the walk starts from yesterday.
pub fn closure_streak(events: &[CashEvent], today: NaiveDate) -> u32 {
    let closed_days: HashSet<NaiveDate> = events
        .iter()
        .filter(|event| event.kind == CashEventKind::Closure)
        .map(|event| event.date)
        .collect();

    let mut cursor = if closed_days.contains(&today) {
        today
    } else {
        today - TimeDelta::days(1)
    };

    let mut streak = 0;
    while closed_days.contains(&cursor) {
        streak += 1;
        cursor -= TimeDelta::days(1);
    }
    streak
}

/// Risk of losing the current streak.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreakRisk {
    /// No closure ever recorded.
    None,
    /// More than 4 days of slack left.
    Safe,
    /// 3 to 4 days left.
    Medium,
    /// 1 to 2 days left.
    High,
    /// Out of slack: last day, or already lost.
    Critical,
}

/// Derives the risk level from the last closure date and the allowed gap.
pub fn streak_risk(
    events: &[CashEvent],
    today: NaiveDate,
    allowed_gap: u32,
) -> StreakRisk {
    let Some(last_closed) = events
        .iter()
        .filter(|event| event.kind == CashEventKind::Closure)
        .map(|event| event.date)
        .max()
    else {
        return StreakRisk::None;
    };

    let days_since = (today - last_closed).num_days().max(0);
    let remaining = i64::from(allowed_gap) - days_since;

    if remaining <= 0 {
        StreakRisk::Critical
    } else if remaining <= 2 {
        StreakRisk::High
    } else if remaining <= 4 {
        StreakRisk::Medium
    } else {
        StreakRisk::Safe
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::cash_event::CashEventStatus;

    fn closure_on(date: NaiveDate) -> CashEvent {
        CashEvent {
            id: Uuid::new_v4(),
            date,
            kind: CashEventKind::Closure,
            accounts: Vec::new(),
            status: CashEventStatus::Success,
            created_at: Utc::now(),
        }
    }

    fn opening_on(date: NaiveDate) -> CashEvent {
        CashEvent {
            kind: CashEventKind::Opening,
            ..closure_on(date)
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn counts_consecutive_closures() {
        let events = vec![closure_on(day(10)), closure_on(day(9)), closure_on(day(8))];
        assert_eq!(closure_streak(&events, day(10)), 3);
    }

    #[test]
    fn unclosed_today_does_not_break_yesterdays_streak() {
        let events = vec![closure_on(day(9)), closure_on(day(8))];
        assert_eq!(closure_streak(&events, day(10)), 2);
    }

    #[test]
    fn gap_stops_the_count() {
        let events = vec![closure_on(day(10)), closure_on(day(8)), closure_on(day(7))];
        assert_eq!(closure_streak(&events, day(10)), 1);
    }

    #[test]
    fn openings_do_not_count() {
        let events = vec![opening_on(day(10)), closure_on(day(9))];
        assert_eq!(closure_streak(&events, day(10)), 1);
    }

    #[test]
    fn no_events_means_zero() {
        assert_eq!(closure_streak(&[], day(10)), 0);
    }

    #[test]
    fn risk_levels_follow_remaining_slack() {
        let events = vec![closure_on(day(10))];
        assert_eq!(streak_risk(&[], day(10), DEFAULT_ALLOWED_GAP), StreakRisk::None);
        assert_eq!(
            streak_risk(&events, day(10), DEFAULT_ALLOWED_GAP),
            StreakRisk::Safe
        );
        assert_eq!(
            streak_risk(&events, day(11), DEFAULT_ALLOWED_GAP),
            StreakRisk::Medium
        );
        assert_eq!(
            streak_risk(&events, day(13), DEFAULT_ALLOWED_GAP),
            StreakRisk::High
        );
        assert_eq!(
            streak_risk(&events, day(15), DEFAULT_ALLOWED_GAP),
            StreakRisk::Critical
        );
    }
}
