//! Weekly day masks and next-run computation.
//!
//! A [`DayMask`] is a 7-bit set where bit 0 is Sunday and bit 6 is Saturday.
//! [`next_run`] evaluates "now" and every candidate in the same time zone so
//! that a daylight-saving shift never moves a run to the wrong hour.

use chrono::{DateTime, Datelike, Days, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Set of weekdays on which a program runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayMask(u8);

impl DayMask {
    /// No day selected: the program never runs on its own.
    pub const EMPTY: Self = Self(0);

    /// All seven days.
    pub const EVERY_DAY: Self = Self(0x7f);

    /// Wrap a raw bitfield.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDayMask`] when bit 7 is set.
    pub fn new(bits: u8) -> Result<Self, ValidationError> {
        if bits & 0x80 != 0 {
            return Err(ValidationError::InvalidDayMask(bits));
        }
        Ok(Self(bits))
    }

    /// Build a mask from day indices (0 = Sunday … 6 = Saturday).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDay`] for an index above 6.
    pub fn from_days(days: &[u8]) -> Result<Self, ValidationError> {
        days.iter().try_fold(Self::EMPTY, |mask, &day| {
            if day > 6 {
                return Err(ValidationError::InvalidDay(day));
            }
            Ok(Self(mask.0 | (1 << day)))
        })
    }

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn add(&mut self, day: Weekday) {
        self.0 |= bit(day);
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !bit(day);
    }

    #[must_use]
    pub fn contains(self, day: Weekday) -> bool {
        self.0 & bit(day) != 0
    }

    /// Selected day indices in ascending order (0 = Sunday).
    pub fn days(self) -> impl Iterator<Item = u8> {
        (0..7u8).filter(move |day| self.0 & (1 << day) != 0)
    }
}

impl TryFrom<u8> for DayMask {
    type Error = ValidationError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl From<DayMask> for u8 {
    fn from(mask: DayMask) -> Self {
        mask.0
    }
}

impl FromIterator<Weekday> for DayMask {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut mask = Self::EMPTY;
        for day in iter {
            mask.add(day);
        }
        mask
    }
}

fn bit(day: Weekday) -> u8 {
    1 << day.num_days_from_sunday()
}

/// Next instant, strictly after `now`, at which a schedule fires.
///
/// Today counts only if its target time is still ahead; otherwise the next
/// seven days are scanned, so a mask holding only today's weekday yields the
/// same day next week. Returns `None` for an empty mask.
pub fn next_run<Tz: TimeZone>(
    days: DayMask,
    start: NaiveTime,
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    if days.is_empty() {
        return None;
    }
    let tz = now.timezone();
    let today = now.date_naive();

    (0..=7u64).find_map(|ahead| {
        let date = today.checked_add_days(Days::new(ahead))?;
        if !days.contains(date.weekday()) {
            return None;
        }
        let candidate = resolve_local(&tz, date.and_time(start))?;
        (candidate > *now).then_some(candidate)
    })
}

/// Map a wall-clock time to an instant in `tz`.
///
/// Ambiguous times (clocks going back) take the earlier instant; times that
/// do not exist (clocks going forward) move to the first minute after the gap.
pub fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&local).earliest().or_else(|| {
        (1..=180).find_map(|minutes| {
            tz.from_local_datetime(&(local + TimeDelta::minutes(minutes)))
                .earliest()
        })
    })
}
