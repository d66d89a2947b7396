//! Client-facing snapshots of the catalog.
//!
//! These are the JSON shapes published by the update fan-out and returned by
//! read commands. Field names are camelCase and timestamps are Unix seconds.

use serde::{Deserialize, Serialize};

use sprinkler_domain::catalog::Catalog;
use sprinkler_domain::execution::{ExecutionState, RunKind};
use sprinkler_domain::program::Program;
use sprinkler_domain::time::Timestamp;
use sprinkler_domain::zone::Zone;

/// What a zone is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    Disabled,
    /// Running as a step of a program.
    Running,
    /// Running by hand.
    Testing,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramStatus {
    Disabled,
    Running,
    Scheduled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneView {
    pub id: u8,
    pub name: String,
    pub output: u8,
    pub enabled: bool,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub last_run: Option<Timestamp>,
    pub status: ZoneStatus,
}

impl ZoneView {
    #[must_use]
    pub fn new(zone: &Zone, state: &ExecutionState) -> Self {
        let status = if !zone.enabled {
            ZoneStatus::Disabled
        } else {
            match state.active() {
                Some(active) if active.zone_id == zone.id => match active.run {
                    RunKind::Manual => ZoneStatus::Testing,
                    RunKind::Scheduled { .. } => ZoneStatus::Running,
                },
                _ => ZoneStatus::Idle,
            }
        };
        Self {
            id: zone.id.get(),
            name: zone.name.clone(),
            output: zone.output.0,
            enabled: zone.enabled,
            last_run: zone.last_run,
            status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    /// Weekday indices, 0 = Sunday.
    pub days: Vec<u8>,
    /// `HH:MM`.
    pub start_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramZoneView {
    pub id: u8,
    /// Minutes.
    pub duration: u16,
    pub order: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramView {
    pub id: u8,
    pub name: String,
    pub enabled: bool,
    pub schedule: ScheduleView,
    pub zones: Vec<ProgramZoneView>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub last_run: Option<Timestamp>,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub next_run: Option<Timestamp>,
    pub status: ProgramStatus,
}

impl ProgramView {
    #[must_use]
    pub fn new(program: &Program, state: &ExecutionState) -> Self {
        let status = if !program.enabled {
            ProgramStatus::Disabled
        } else if state.program_id() == Some(program.id) {
            ProgramStatus::Running
        } else {
            ProgramStatus::Scheduled
        };
        Self {
            id: program.id.get(),
            name: program.name.clone(),
            enabled: program.enabled,
            schedule: ScheduleView {
                days: program.schedule.days.days().collect(),
                start_time: program.schedule.start_time_label(),
            },
            zones: program
                .zones
                .iter()
                .map(|z| ProgramZoneView {
                    id: z.zone_id.get(),
                    duration: z.duration_minutes,
                    order: z.order,
                })
                .collect(),
            last_run: program.last_run,
            next_run: program.next_run,
            status,
        }
    }
}

/// Every zone, in slot order.
#[must_use]
pub fn zone_views(catalog: &Catalog, state: &ExecutionState) -> Vec<ZoneView> {
    catalog.zones().map(|z| ZoneView::new(z, state)).collect()
}

/// Every program, in slot order.
#[must_use]
pub fn program_views(catalog: &Catalog, state: &ExecutionState) -> Vec<ProgramView> {
    catalog.programs().map(|p| ProgramView::new(p, state)).collect()
}
