//! Resume a program that was interrupted by a restart.
//!
//! A program is resumable when today is one of its days and `now` falls
//! between its start and the end of its last enabled zone. Time is measured
//! in whole seconds so the resumed zone ends exactly on schedule.

use chrono::{DateTime, Datelike, TimeZone};

use crate::catalog::Catalog;
use crate::days::resolve_local;
use crate::id::{ProgramId, ZoneId};
use crate::program::Program;

/// Where to pick a program back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPlan {
    pub program_id: ProgramId,
    /// Index of the reference in the program's zone list.
    pub zone_index: usize,
    pub zone_id: ZoneId,
    /// Seconds left for that zone.
    pub remaining: u32,
}

/// First enabled program, in slot order, whose window contains `now`.
#[must_use]
pub fn find_resumable<Tz: TimeZone>(catalog: &Catalog, now: &DateTime<Tz>) -> Option<RecoveryPlan> {
    catalog
        .programs()
        .filter(|p| p.enabled && p.schedule.days.contains(now.weekday()))
        .find_map(|program| resume_point(catalog, program, now))
}

fn resume_point<Tz: TimeZone>(
    catalog: &Catalog,
    program: &Program,
    now: &DateTime<Tz>,
) -> Option<RecoveryPlan> {
    let start_time = program.schedule.start_time().ok()?;
    let program_start = resolve_local(&now.timezone(), now.date_naive().and_time(start_time))?;
    if *now < program_start {
        return None;
    }
    let elapsed = u32::try_from((now.clone() - program_start).num_seconds()).ok()?;

    let mut cumulative = 0u32;
    for (zone_index, zone_ref) in catalog.enabled_refs(program) {
        cumulative += zone_ref.duration_seconds();
        if cumulative > elapsed {
            return Some(RecoveryPlan {
                program_id: program.id,
                zone_index,
                zone_id: zone_ref.zone_id,
                remaining: cumulative - elapsed,
            });
        }
    }
    None
}
