//! Core record types: slots, holds, and bookings.
//!
//! Tutor, consumer, and student ids are opaque strings owned by the identity
//! layer; the engine only generates ids for the records it creates (holds and
//! bookings), as `uuid` v4.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A derived bookable slot. Never persisted — recomputed on every query from
/// availability windows and the current interval set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub tutor_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub available: bool,
}

/// A short-lived reservation on a slot. While live and unexpired, a hold
/// occupies its `[start_at, end_at)` interval exclusively for the tutor.
///
/// Lifecycle: created → consumed (successful finalize) or expired (TTL
/// elapsed). There are no other transitions; a consumed or expired hold can
/// never be finalized again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub id: Uuid,
    pub tutor_id: String,
    pub consumer_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    /// A hold is live strictly before `expires_at`. Expiry is evaluated at
    /// read time; sweeping expired holds is only garbage collection.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

/// A confirmed session. Created only by finalizing a valid hold; occupies its
/// interval while `status` is [`BookingStatus::Confirmed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub tutor_id: String,
    pub consumer_id: String,
    pub student_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: BookingStatus,
    /// Free-form intake metadata supplied at finalization (subject, goals,
    /// notes). Opaque to the engine.
    pub intake: serde_json::Value,
    pub confirmed_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}
