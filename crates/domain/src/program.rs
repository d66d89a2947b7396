//! Program — an ordered list of zone runs on a weekly schedule.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::MAX_ZONES_PER_PROGRAM;
use crate::days::{self, DayMask};
use crate::error::{CapacityError, SprinklerError, ValidationError};
use crate::id::{ProgramId, ZoneId};
use crate::time::Timestamp;
use crate::zone::normalize_name;

/// When a program starts: a set of weekdays and a local time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub days: DayMask,
    pub start_hour: u8,
    pub start_minute: u8,
}

impl Schedule {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidStartTime`] when the hour is above 23
    /// or the minute above 59.
    pub fn new(days: DayMask, start_hour: u8, start_minute: u8) -> Result<Self, ValidationError> {
        let schedule = Self {
            days,
            start_hour,
            start_minute,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Parse an `HH:MM` start time.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedStartTime`] when the text is not two
    /// colon-separated numbers, or [`ValidationError::InvalidStartTime`] when
    /// they are out of range.
    pub fn parse_start_time(text: &str) -> Result<(u8, u8), ValidationError> {
        let malformed = || ValidationError::MalformedStartTime(text.to_string());
        let (hour, minute) = text.split_once(':').ok_or_else(malformed)?;
        let hour: u8 = hour.trim().parse().map_err(|_| malformed())?;
        let minute: u8 = minute.trim().parse().map_err(|_| malformed())?;
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidStartTime { hour, minute });
        }
        Ok((hour, minute))
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidStartTime`] for an out-of-range time.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.start_time().map(|_| ())
    }

    /// The start time as a [`NaiveTime`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidStartTime`] for an out-of-range time.
    pub fn start_time(&self) -> Result<NaiveTime, ValidationError> {
        NaiveTime::from_hms_opt(u32::from(self.start_hour), u32::from(self.start_minute), 0).ok_or(
            ValidationError::InvalidStartTime {
                hour: self.start_hour,
                minute: self.start_minute,
            },
        )
    }

    /// `HH:MM` rendering of the start time.
    #[must_use]
    pub fn start_time_label(&self) -> String {
        format!("{:02}:{:02}", self.start_hour, self.start_minute)
    }

    /// Next start strictly after `now`, evaluated in `now`'s time zone.
    #[must_use]
    pub fn next_run<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let start = self.start_time().ok()?;
        days::next_run(self.days, start, now)
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            days: DayMask::EMPTY,
            start_hour: 0,
            start_minute: 0,
        }
    }
}

/// One step of a program: run `zone_id` for `duration_minutes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramZone {
    pub zone_id: ZoneId,
    pub duration_minutes: u16,
    pub order: u8,
}

impl ProgramZone {
    #[must_use]
    pub fn new(zone_id: ZoneId, duration_minutes: u16, order: u8) -> Self {
        Self {
            zone_id,
            duration_minutes,
            order,
        }
    }

    /// Duration in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        u32::from(self.duration_minutes) * 60
    }
}

/// A watering program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    pub enabled: bool,
    pub schedule: Schedule,
    pub zones: Vec<ProgramZone>,
    pub last_run: Option<Timestamp>,
    pub next_run: Option<Timestamp>,
}

impl Program {
    /// Create a builder for constructing a [`Program`].
    #[must_use]
    pub fn builder(id: ProgramId) -> ProgramBuilder {
        ProgramBuilder {
            id,
            name: None,
            enabled: true,
            schedule: Schedule::default(),
            zones: Vec::new(),
            last_run: None,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::InvalidArgument`] when the name is empty, the
    /// start time is out of range, a duration is zero, or the program holds
    /// more than [`MAX_ZONES_PER_PROGRAM`] zones.
    pub fn validate(&self) -> Result<(), SprinklerError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        self.schedule.validate()?;
        if self.zones.len() > MAX_ZONES_PER_PROGRAM {
            return Err(ValidationError::TooManyZones {
                count: self.zones.len(),
                max: MAX_ZONES_PER_PROGRAM,
            }
            .into());
        }
        if self.zones.iter().any(|z| z.duration_minutes == 0) {
            return Err(ValidationError::ZeroDuration.into());
        }
        Ok(())
    }

    /// Sort zone references by `order` (stable) and rewrite `order` as
    /// `0..n-1`.
    pub fn renumber(&mut self) {
        self.zones.sort_by_key(|z| z.order);
        for (index, zone) in (0u8..).zip(self.zones.iter_mut()) {
            zone.order = index;
        }
    }

    /// Insert a zone reference at `min(position, len)` and renumber.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::ProgramZonesFull`] when the list is full.
    pub fn insert_zone(
        &mut self,
        zone_id: ZoneId,
        duration_minutes: u16,
        position: u8,
    ) -> Result<(), SprinklerError> {
        if duration_minutes == 0 {
            return Err(ValidationError::ZeroDuration.into());
        }
        if self.zones.len() >= MAX_ZONES_PER_PROGRAM {
            return Err(CapacityError::ProgramZonesFull {
                program_id: self.id.get(),
                max: MAX_ZONES_PER_PROGRAM,
            }
            .into());
        }
        let at = usize::from(position).min(self.zones.len());
        self.zones
            .insert(at, ProgramZone::new(zone_id, duration_minutes, 0));
        for (index, zone) in (0u8..).zip(self.zones.iter_mut()) {
            zone.order = index;
        }
        Ok(())
    }

    /// Drop every reference to `zone_id`, keeping the remaining order
    /// contiguous. Returns whether anything was removed.
    pub fn remove_zone_refs(&mut self, zone_id: ZoneId) -> bool {
        let before = self.zones.len();
        self.zones.retain(|z| z.zone_id != zone_id);
        if self.zones.len() == before {
            return false;
        }
        self.renumber();
        true
    }

    /// Recompute `next_run` from the schedule; a disabled program never runs.
    pub fn refresh_next_run<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) {
        self.next_run = if self.enabled {
            self.schedule
                .next_run(now)
                .map(|next| next.with_timezone(&Utc))
        } else {
            None
        };
    }
}

/// Step-by-step builder for [`Program`].
#[derive(Debug)]
pub struct ProgramBuilder {
    id: ProgramId,
    name: Option<String>,
    enabled: bool,
    schedule: Schedule,
    zones: Vec<ProgramZone>,
    last_run: Option<Timestamp>,
}

impl ProgramBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    #[must_use]
    pub fn zones(mut self, zones: Vec<ProgramZone>) -> Self {
        self.zones = zones;
        self
    }

    #[must_use]
    pub fn zone(mut self, zone: ProgramZone) -> Self {
        self.zones.push(zone);
        self
    }

    #[must_use]
    pub fn last_run(mut self, last_run: Timestamp) -> Self {
        self.last_run = Some(last_run);
        self
    }

    /// Consume the builder, renumber zone orders, validate, and return a
    /// [`Program`]. `next_run` is left empty; call
    /// [`Program::refresh_next_run`] to compute it.
    ///
    /// # Errors
    ///
    /// See [`Program::validate`].
    pub fn build(self) -> Result<Program, SprinklerError> {
        let mut program = Program {
            id: self.id,
            name: normalize_name(self.name.as_deref().unwrap_or_default()),
            enabled: self.enabled,
            schedule: self.schedule,
            zones: self.zones,
            last_run: self.last_run,
            next_run: None,
        };
        program.validate()?;
        program.renumber();
        Ok(program)
    }
}
