//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for `last_run`, `next_run` and zone start times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Whole seconds elapsed from `since` to `until`, clamped at zero.
#[must_use]
pub fn elapsed_seconds(since: Timestamp, until: Timestamp) -> u32 {
    let secs = (until - since).num_seconds();
    u32::try_from(secs.max(0)).unwrap_or(u32::MAX)
}
