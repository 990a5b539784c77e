//! The shared interval-overlap predicate.
//!
//! Both the hold path and the finalize path decide "conflict" through this one
//! function, so the two call sites can never drift apart. Adjacent intervals
//! (one ends exactly when the other starts) are NOT conflicts.

use chrono::{DateTime, Utc};

/// Half-open interval overlap test over `[start, end)` ranges.
///
/// Two intervals overlap iff `a_start < b_end && b_start < a_end`. This
/// excludes the adjacent case where `a_end == b_start`. Symmetric in its two
/// interval arguments.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Whether the candidate `[start, end)` overlaps any interval in `existing`.
pub fn has_conflict(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: impl IntoIterator<Item = (DateTime<Utc>, DateTime<Utc>)>,
) -> bool {
    existing
        .into_iter()
        .any(|(s, e)| overlaps(start, end, s, e))
}
