//! # slot-engine
//!
//! Overlap-safe booking core for a tutor marketplace: slot generation from
//! weekly availability, time-boxed holds, and conflict-checked finalization.
//!
//! The engine owns one invariant: for any tutor, the set of unexpired holds
//! and confirmed bookings never contains two overlapping `[start, end)`
//! intervals. Both the hold path and the finalize path enforce it through the
//! same predicate in [`conflict`], serialized per tutor by the [`Scheduler`].
//!
//! ## Modules
//!
//! - [`availability`] — weekly rules + exceptions → UTC windows for a date
//! - [`slots`] — tile windows into duration-sized bookable candidates
//! - [`conflict`] — the single shared interval-overlap predicate
//! - [`scheduler`] — tutor registry, holds, bookings, expiry sweep
//! - [`config`] — hold TTL and cancellation-window tunables
//! - [`types`] — slot, hold, and booking records
//! - [`error`] — error types

pub mod availability;
pub mod config;
pub mod conflict;
pub mod error;
pub mod scheduler;
pub mod slots;
pub mod types;

pub use availability::{AvailabilityException, AvailabilityRule, ExceptionKind, RuleDay};
pub use config::SchedulerConfig;
pub use conflict::overlaps;
pub use error::{Result, ScheduleError};
pub use scheduler::{Scheduler, TutorSchedule};
pub use types::{Booking, BookingStatus, Hold, Slot};
