//! Error types for booking operations.

use thiserror::Error;

/// Client-visible failure taxonomy. Every variant is terminal for the current
/// request; nothing here is retried engine-side.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Unknown tutor or booking id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input (bad timezone, past start, misaligned slot, wrong
    /// owner). Carries field-level detail; never retried automatically.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The interval is already held or booked. The caller should offer the
    /// user another time, not resubmit the same request.
    #[error("Slot already held or booked: {0}")]
    Conflict(String),

    /// The hold lapsed or was already consumed before finalization. Distinct
    /// from [`ScheduleError::Conflict`] so the caller can restart slot
    /// selection instead of assuming the time is taken.
    #[error("Hold expired: {0}")]
    Expired(String),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
