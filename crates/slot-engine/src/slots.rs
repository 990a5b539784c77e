//! Candidate slot tiling.
//!
//! Walks each availability window with a cursor, emitting duration-sized
//! candidates and discarding any partial trailing slot. Occupancy against
//! confirmed bookings and live holds is decided by [`crate::conflict`]; past
//! candidates are excluded entirely, not merely marked unavailable.

use chrono::{DateTime, Duration, Utc};

use crate::conflict;
use crate::types::Slot;

/// Tile availability windows into bookable slots for one tutor.
///
/// Windows must be sorted and non-overlapping (as produced by
/// [`crate::availability::windows_for_date`]), which makes the output sorted
/// ascending by `start_at`. A candidate overlapping anything in `occupied` is
/// kept but marked `available = false`; a candidate with `start_at < now` is
/// dropped.
pub fn generate_slots(
    tutor_id: &str,
    windows: &[(DateTime<Utc>, DateTime<Utc>)],
    duration: Duration,
    occupied: &[(DateTime<Utc>, DateTime<Utc>)],
    now: DateTime<Utc>,
) -> Vec<Slot> {
    let mut slots = Vec::new();
    if duration <= Duration::zero() {
        return slots;
    }

    for &(window_start, window_end) in windows {
        let mut cursor = window_start;
        while cursor + duration <= window_end {
            let end_at = cursor + duration;
            if cursor >= now {
                let available = !conflict::has_conflict(cursor, end_at, occupied.iter().copied());
                slots.push(Slot {
                    tutor_id: tutor_id.to_string(),
                    start_at: cursor,
                    end_at,
                    available,
                });
            }
            cursor = end_at;
        }
    }

    slots
}

/// Whether `start_at` lands exactly on the candidate grid for these windows:
/// a whole number of durations past a window start, with the full slot inside
/// the window.
///
/// This mirrors the tiling in [`generate_slots`], so a client-supplied start
/// is accepted iff the generator would have emitted a slot there. Occupancy is
/// deliberately not consulted — the conflict check that follows alignment is
/// the single authority on that.
pub fn is_aligned(
    windows: &[(DateTime<Utc>, DateTime<Utc>)],
    duration: Duration,
    start_at: DateTime<Utc>,
) -> bool {
    if duration <= Duration::zero() {
        return false;
    }
    windows.iter().any(|&(window_start, window_end)| {
        if start_at < window_start || start_at + duration > window_end {
            return false;
        }
        // Full precision: a fractional-second start must not truncate onto
        // the grid and sit off-phase against the real slots.
        let offset = start_at - window_start;
        match (offset.num_nanoseconds(), duration.num_nanoseconds()) {
            (Some(offset_ns), Some(duration_ns)) => offset_ns % duration_ns == 0,
            _ => false,
        }
    })
}
