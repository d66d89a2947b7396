//! Time source port.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use sprinkler_domain::time::Timestamp;

/// Wall-clock time in the controller's local time zone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;

    /// The current instant in UTC.
    fn utc_now(&self) -> Timestamp {
        self.now().with_timezone(&Utc)
    }
}

impl<T: Clock> Clock for std::sync::Arc<T> {
    fn now(&self) -> DateTime<Tz> {
        (**self).now()
    }
}

/// System clock viewed through a fixed time zone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    #[must_use]
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}
