//! Scheduler tunables.
//!
//! Hold TTL and the cancellation window are deployment policy, not engine
//! constants — callers supply them and the defaults exist only so tooling and
//! tests have a baseline.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Business policy knobs for a [`crate::Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minutes a hold stays live before it lapses.
    pub hold_ttl_minutes: i64,
    /// Hours before a session start inside which a confirmed booking can no
    /// longer be cancelled.
    pub cancellation_window_hours: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            hold_ttl_minutes: 10,
            cancellation_window_hours: 24,
        }
    }
}

impl SchedulerConfig {
    pub fn hold_ttl(&self) -> Duration {
        Duration::minutes(self.hold_ttl_minutes)
    }

    pub fn cancellation_window(&self) -> Duration {
        Duration::hours(self.cancellation_window_hours)
    }
}
