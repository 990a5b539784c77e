//! Tutor availability — recurring weekly rules, one-off date rules, and
//! vacation/blackout exceptions.
//!
//! Rules are local wall-clock windows in the tutor's IANA timezone. For a
//! given calendar date they are resolved to UTC instants, exception dates are
//! subtracted, and overlapping windows are merged so downstream tiling always
//! sees a sorted, non-overlapping window list.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Which calendar days a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleDay {
    /// Recurs every week on the given weekday.
    Weekly(Weekday),
    /// Applies to one specific calendar date only.
    Date(NaiveDate),
}

/// A bookable window in a tutor's schedule. Immutable once created; the whole
/// rule set is replaced on edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub day: RuleDay,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl AvailabilityRule {
    fn applies_to(&self, date: NaiveDate) -> bool {
        match self.day {
            RuleDay::Weekly(weekday) => date.weekday() == weekday,
            RuleDay::Date(d) => d == date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    Vacation,
    Blackout,
}

/// A date range subtracted from availability, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub kind: ExceptionKind,
}

impl AvailabilityException {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Resolve a local wall-clock time on `date` to a UTC instant.
///
/// Ambiguous local times (DST fall-back) take the earlier instant. Times
/// inside a spring-forward gap do not exist on the wall clock and resolve to
/// the first valid wall-clock minute after the transition, so a window that
/// straddles the gap is clipped rather than dropped. A window lying entirely
/// inside the gap collapses to an empty range and yields nothing.
fn resolve_local(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    let naive = date.and_time(time);
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return Some(dt.with_timezone(&Utc));
    }
    // Inside a spring-forward gap. Gaps are minute-aligned and at most a few
    // hours wide, so probe forward to the first representable local time.
    let mut probe = naive;
    for _ in 0..240 {
        probe += Duration::minutes(1);
        if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
            return Some(dt.with_timezone(&Utc));
        }
    }
    None
}

/// Expand a tutor's rules into UTC availability windows for one calendar date.
///
/// A date covered by any exception has no availability at all. Rules whose
/// start is not strictly before their end contribute nothing. Overlapping or
/// adjacent windows from different rules are merged; the result is sorted by
/// start and non-overlapping.
pub fn windows_for_date(
    rules: &[AvailabilityRule],
    exceptions: &[AvailabilityException],
    tz: Tz,
    date: NaiveDate,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    if exceptions.iter().any(|e| e.covers(date)) {
        return Vec::new();
    }

    let mut windows: Vec<(DateTime<Utc>, DateTime<Utc>)> = rules
        .iter()
        .filter(|r| r.applies_to(date))
        .filter(|r| r.start_time < r.end_time)
        .filter_map(|r| {
            let start = resolve_local(tz, date, r.start_time)?;
            let end = resolve_local(tz, date, r.end_time)?;
            (start < end).then_some((start, end))
        })
        .collect();

    if windows.is_empty() {
        return windows;
    }

    // Sort by start time (then by end time for stability).
    windows.sort_by_key(|&(start, end)| (start, end));

    // Merge overlapping or adjacent windows.
    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for (start, end) in windows {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    merged
}
