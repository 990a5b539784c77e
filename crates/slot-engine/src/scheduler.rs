//! The scheduler store — tutor registry plus per-tutor holds and bookings.
//!
//! Correctness hinges on one rule: for a given tutor, the conflict check and
//! the write that follows it happen under that tutor's mutex, so concurrent
//! hold and finalize attempts serialize per tutor. Expired holds are ignored
//! by every read path the moment they lapse; [`Scheduler::sweep_expired`] only
//! reclaims memory.
//!
//! Lock order: a tutor mutex may be held while touching an id index, but an
//! index guard is always dropped before acquiring a tutor mutex.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};
use uuid::Uuid;

use crate::availability::{self, AvailabilityException, AvailabilityRule};
use crate::config::SchedulerConfig;
use crate::conflict;
use crate::error::{Result, ScheduleError};
use crate::slots;
use crate::types::{Booking, BookingStatus, Hold, Slot};

/// A tutor's published schedule settings.
#[derive(Debug, Clone)]
pub struct TutorSchedule {
    pub timezone: Tz,
    pub duration_minutes: u32,
    pub rules: Vec<AvailabilityRule>,
    pub exceptions: Vec<AvailabilityException>,
}

/// Per-tutor state guarded by a single mutex: the schedule plus the interval
/// set (holds ∪ bookings) that the no-overlap invariant ranges over.
#[derive(Debug)]
struct TutorBook {
    schedule: TutorSchedule,
    holds: HashMap<Uuid, Hold>,
    bookings: HashMap<Uuid, Booking>,
}

impl TutorBook {
    fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.schedule.duration_minutes))
    }

    fn windows(&self, date: NaiveDate) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        availability::windows_for_date(
            &self.schedule.rules,
            &self.schedule.exceptions,
            self.schedule.timezone,
            date,
        )
    }

    /// Intervals currently occupying the tutor's calendar: confirmed bookings
    /// plus unexpired holds, optionally excluding the hold being finalized.
    fn occupied(
        &self,
        now: DateTime<Utc>,
        exclude_hold: Option<Uuid>,
    ) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let holds = self
            .holds
            .values()
            .filter(|h| !h.is_expired(now))
            .filter(|h| Some(h.id) != exclude_hold)
            .map(|h| (h.start_at, h.end_at));
        let bookings = self
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .map(|b| (b.start_at, b.end_at));
        holds.chain(bookings).collect()
    }
}

/// Recover the guard if a previous holder panicked mid-request.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Thread-safe booking engine for a fleet of tutors.
///
/// All operations take `now` explicitly so behavior is deterministic and
/// directly testable — the engine never reads the system clock.
pub struct Scheduler {
    config: SchedulerConfig,
    tutors: RwLock<HashMap<String, Arc<Mutex<TutorBook>>>>,
    /// hold id → tutor id, so finalize can find the right book to lock.
    hold_index: RwLock<HashMap<Uuid, String>>,
    /// booking id → tutor id, for cancellation.
    booking_index: RwLock<HashMap<Uuid, String>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            tutors: RwLock::new(HashMap::new()),
            hold_index: RwLock::new(HashMap::new()),
            booking_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a tutor, or replace an existing tutor's schedule wholesale.
    /// Holds and bookings already on the calendar survive a schedule edit.
    ///
    /// # Errors
    /// Returns [`ScheduleError::Validation`] for an unknown IANA timezone, a
    /// zero session duration, or a rule whose start is not before its end.
    pub fn register_tutor(
        &self,
        tutor_id: &str,
        timezone: &str,
        duration_minutes: u32,
        rules: Vec<AvailabilityRule>,
        exceptions: Vec<AvailabilityException>,
    ) -> Result<()> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| ScheduleError::Validation(format!("invalid timezone: {timezone}")))?;
        if duration_minutes == 0 {
            return Err(ScheduleError::Validation(
                "duration_minutes must be positive".to_string(),
            ));
        }
        for rule in &rules {
            if rule.start_time >= rule.end_time {
                return Err(ScheduleError::Validation(format!(
                    "rule start {} must be before end {}",
                    rule.start_time, rule.end_time
                )));
            }
        }

        let schedule = TutorSchedule {
            timezone: tz,
            duration_minutes,
            rules,
            exceptions,
        };

        let mut tutors = self
            .tutors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match tutors.entry(tutor_id.to_string()) {
            Entry::Occupied(entry) => {
                lock(entry.get()).schedule = schedule;
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(TutorBook {
                    schedule,
                    holds: HashMap::new(),
                    bookings: HashMap::new(),
                })));
            }
        }
        debug!(tutor = tutor_id, "schedule registered");
        Ok(())
    }

    fn book_for(&self, tutor_id: &str) -> Result<Arc<Mutex<TutorBook>>> {
        self.tutors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(tutor_id)
            .cloned()
            .ok_or_else(|| ScheduleError::NotFound(format!("unknown tutor: {tutor_id}")))
    }

    /// Bookable slots for a tutor on one calendar date (in the tutor's
    /// timezone), sorted ascending by start.
    ///
    /// Past slots are excluded entirely. A date with no applicable rules
    /// yields an empty list, not an error. Idempotent for unchanged state.
    ///
    /// # Errors
    /// Returns [`ScheduleError::NotFound`] for an unknown tutor.
    pub fn generate_slots(
        &self,
        tutor_id: &str,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<Slot>> {
        let book_arc = self.book_for(tutor_id)?;
        let book = lock(&book_arc);
        let windows = book.windows(date);
        let occupied = book.occupied(now, None);
        Ok(slots::generate_slots(
            tutor_id,
            &windows,
            book.duration(),
            &occupied,
            now,
        ))
    }

    /// Place a time-boxed hold on a slot.
    ///
    /// The conflict check and the hold insert run under the tutor's mutex, so
    /// two concurrent calls for the same free slot cannot both pass the check
    /// — exactly one succeeds, the other gets [`ScheduleError::Conflict`] and
    /// no partial state is left behind.
    ///
    /// # Errors
    /// - [`ScheduleError::NotFound`] — unknown tutor.
    /// - [`ScheduleError::Validation`] — `start_at` not in the future,
    ///   duration not matching the tutor's session length, or a start that
    ///   does not align with the slot grid for that date.
    /// - [`ScheduleError::Conflict`] — the interval overlaps an unexpired hold
    ///   or a confirmed booking.
    pub fn create_hold(
        &self,
        tutor_id: &str,
        consumer_id: &str,
        start_at: DateTime<Utc>,
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Hold> {
        let book_arc = self.book_for(tutor_id)?;
        let mut book = lock(&book_arc);

        if duration_minutes != book.schedule.duration_minutes {
            return Err(ScheduleError::Validation(format!(
                "duration {duration_minutes} does not match the tutor's session length of {}",
                book.schedule.duration_minutes
            )));
        }
        if start_at <= now {
            return Err(ScheduleError::Validation(format!(
                "start_at {start_at} must be in the future"
            )));
        }

        let duration = book.duration();
        let end_at = start_at + duration;

        // Guard against client-supplied arbitrary times: the start must land
        // on the same grid generate_slots would have produced for that date.
        let local_date = start_at.with_timezone(&book.schedule.timezone).date_naive();
        let windows = book.windows(local_date);
        if !slots::is_aligned(&windows, duration, start_at) {
            return Err(ScheduleError::Validation(format!(
                "start_at {start_at} does not align with a bookable slot"
            )));
        }

        let occupied = book.occupied(now, None);
        if conflict::has_conflict(start_at, end_at, occupied.iter().copied()) {
            return Err(ScheduleError::Conflict(format!(
                "tutor {tutor_id} at {start_at}"
            )));
        }

        let hold = Hold {
            id: Uuid::new_v4(),
            tutor_id: tutor_id.to_string(),
            consumer_id: consumer_id.to_string(),
            start_at,
            end_at,
            created_at: now,
            expires_at: now + self.config.hold_ttl(),
        };
        book.holds.insert(hold.id, hold.clone());
        self.hold_index
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(hold.id, tutor_id.to_string());

        debug!(
            hold = %hold.id,
            tutor = tutor_id,
            consumer = consumer_id,
            start = %start_at,
            expires = %hold.expires_at,
            "hold created"
        );
        Ok(hold)
    }

    /// Convert a valid, unexpired hold into a confirmed booking.
    ///
    /// The conflict policy is re-run at commit time against confirmed bookings
    /// and live holds of other consumers — defense in depth against anything
    /// that claimed the interval between hold creation and finalize. The
    /// consumed hold is removed; it can never be finalized again.
    ///
    /// # Errors
    /// - [`ScheduleError::Expired`] — unknown, already-consumed, or lapsed
    ///   hold. A stale hold must not silently succeed.
    /// - [`ScheduleError::Validation`] — the hold belongs to another consumer.
    /// - [`ScheduleError::Conflict`] — the interval was claimed by another
    ///   path; the hold is left to expire on its own.
    pub fn finalize_booking(
        &self,
        hold_id: Uuid,
        consumer_id: &str,
        student_id: &str,
        intake: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let tutor_id = self
            .hold_index
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&hold_id)
            .cloned()
            .ok_or_else(|| {
                ScheduleError::Expired(format!("unknown or consumed hold: {hold_id}"))
            })?;
        let book_arc = self.book_for(&tutor_id)?;
        let mut book = lock(&book_arc);

        let hold = match book.holds.get(&hold_id) {
            Some(h) => h.clone(),
            // Consumed or swept between the index read and the book lock.
            None => {
                return Err(ScheduleError::Expired(format!(
                    "unknown or consumed hold: {hold_id}"
                )))
            }
        };

        if hold.is_expired(now) {
            book.holds.remove(&hold_id);
            self.hold_index
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(&hold_id);
            debug!(hold = %hold_id, "expired hold purged at finalize");
            return Err(ScheduleError::Expired(format!(
                "hold {hold_id} lapsed at {}",
                hold.expires_at
            )));
        }
        if hold.consumer_id != consumer_id {
            return Err(ScheduleError::Validation(format!(
                "hold {hold_id} belongs to another consumer"
            )));
        }

        let occupied = book.occupied(now, Some(hold_id));
        if conflict::has_conflict(hold.start_at, hold.end_at, occupied.iter().copied()) {
            return Err(ScheduleError::Conflict(format!(
                "tutor {tutor_id} at {}",
                hold.start_at
            )));
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            tutor_id: tutor_id.clone(),
            consumer_id: consumer_id.to_string(),
            student_id: student_id.to_string(),
            start_at: hold.start_at,
            end_at: hold.end_at,
            status: BookingStatus::Confirmed,
            intake,
            confirmed_at: now,
            cancelled_at: None,
        };
        book.holds.remove(&hold_id);
        book.bookings.insert(booking.id, booking.clone());
        self.hold_index
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&hold_id);
        self.booking_index
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(booking.id, tutor_id.clone());

        // Notification dispatch to the tutor is fire-and-forget and lives
        // outside this crate; a delivery failure cannot roll back the booking.
        info!(
            booking = %booking.id,
            tutor = %tutor_id,
            consumer = consumer_id,
            start = %booking.start_at,
            "booking confirmed"
        );
        Ok(booking)
    }

    /// Cancel a confirmed booking, freeing its interval for future holds.
    ///
    /// # Errors
    /// - [`ScheduleError::NotFound`] — unknown booking id.
    /// - [`ScheduleError::Validation`] — wrong consumer, already cancelled, or
    ///   inside the configured cancellation window.
    pub fn cancel_booking(
        &self,
        booking_id: Uuid,
        consumer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let tutor_id = self
            .booking_index
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| ScheduleError::NotFound(format!("unknown booking: {booking_id}")))?;
        let book_arc = self.book_for(&tutor_id)?;
        let mut book = lock(&book_arc);

        let booking = book
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| ScheduleError::NotFound(format!("unknown booking: {booking_id}")))?;
        if booking.consumer_id != consumer_id {
            return Err(ScheduleError::Validation(format!(
                "booking {booking_id} belongs to another consumer"
            )));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(ScheduleError::Validation(format!(
                "booking {booking_id} is already cancelled"
            )));
        }
        if booking.start_at - now < self.config.cancellation_window() {
            return Err(ScheduleError::Validation(format!(
                "booking {booking_id} is inside the {}-hour cancellation window",
                self.config.cancellation_window_hours
            )));
        }

        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(now);
        info!(booking = %booking_id, tutor = %tutor_id, "booking cancelled");
        Ok(booking.clone())
    }

    /// Best-effort garbage collection of lapsed holds. Returns how many were
    /// purged. Never required for correctness — every read path already
    /// ignores expired holds.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let books: Vec<Arc<Mutex<TutorBook>>> = self
            .tutors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect();

        let mut purged = 0;
        for book_arc in books {
            let mut book = lock(&book_arc);
            let expired: Vec<Uuid> = book
                .holds
                .values()
                .filter(|h| h.is_expired(now))
                .map(|h| h.id)
                .collect();
            for id in &expired {
                book.holds.remove(id);
            }
            if !expired.is_empty() {
                let mut index = self
                    .hold_index
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                for id in &expired {
                    index.remove(id);
                }
            }
            purged += expired.len();
        }

        if purged > 0 {
            debug!(purged, "expired holds swept");
        }
        purged
    }

    /// Snapshot of a tutor's unexpired holds, sorted by start.
    pub fn live_holds(&self, tutor_id: &str, now: DateTime<Utc>) -> Result<Vec<Hold>> {
        let book_arc = self.book_for(tutor_id)?;
        let book = lock(&book_arc);
        let mut holds: Vec<Hold> = book
            .holds
            .values()
            .filter(|h| !h.is_expired(now))
            .cloned()
            .collect();
        holds.sort_by_key(|h| h.start_at);
        Ok(holds)
    }

    /// Snapshot of a tutor's confirmed bookings, sorted by start.
    pub fn confirmed_bookings(&self, tutor_id: &str) -> Result<Vec<Booking>> {
        let book_arc = self.book_for(tutor_id)?;
        let book = lock(&book_arc);
        let mut bookings: Vec<Booking> = book
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start_at);
        Ok(bookings)
    }
}
