//! Command dispatch: the public request surface of the controller.
//!
//! A [`Command`] is a closed, JSON-tagged enum (`{"type": "get_zones"}`, …).
//! [`CommandHandler::execute`] validates it and maps it 1:1 onto a
//! [`ScheduleStore`] or [`ExecutionEngine`] operation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sprinkler_domain::days::DayMask;
use sprinkler_domain::error::{SprinklerError, ValidationError};
use sprinkler_domain::execution::StatusReport;
use sprinkler_domain::id::{OutputPin, ProgramId, ZoneId};
use sprinkler_domain::program::{ProgramZone, Schedule};

use crate::execution_engine::ExecutionEngine;
use crate::ports::{ChangeNotifier, Clock, OutputDriver, RecordStore};
use crate::schedule_store::ScheduleStore;
use crate::views::{ProgramView, ZoneView, program_views, zone_views};

/// How long `test_manual` runs a zone when no duration is given.
pub const DEFAULT_MANUAL_ZONE_SECONDS: u32 = 30;

/// A request from a client. Ids of `0` (or absent ids) on create-or-update
/// commands mean "allocate a new slot".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    GetZones,
    GetPrograms,
    GetStatus,
    CreateOrUpdateZone {
        #[serde(default, alias = "id")]
        zone_id: u8,
        name: String,
        output: u8,
    },
    DeleteZone {
        zone_id: u8,
    },
    CreateOrUpdateProgram {
        #[serde(default, alias = "program_id")]
        id: u8,
        name: String,
        schedule: ScheduleInput,
        #[serde(default)]
        zones: Vec<ProgramZoneInput>,
    },
    DeleteProgram {
        program_id: u8,
    },
    AddZoneToProgram {
        program_id: u8,
        zone_id: u8,
        /// Minutes.
        duration: u16,
        /// Position in the program; past the end appends.
        #[serde(default = "append")]
        order: u8,
    },
    Enable {
        #[serde(default)]
        zone_id: Option<u8>,
        #[serde(default)]
        program_id: Option<u8>,
        is_enabled: bool,
    },
    TestManual {
        #[serde(default)]
        zone_id: Option<u8>,
        #[serde(default)]
        program_id: Option<u8>,
        action: ManualAction,
        /// Seconds; only used when starting a zone.
        #[serde(default)]
        duration: Option<u32>,
    },
}

fn append() -> u8 {
    u8::MAX
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInput {
    /// Weekday indices, 0 = Sunday.
    pub days: Vec<u8>,
    /// `HH:MM`.
    #[serde(alias = "startTime")]
    pub start_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramZoneInput {
    pub id: u8,
    #[serde(default)]
    pub order: u8,
    /// Minutes.
    pub duration: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualAction {
    Start,
    Stop,
}

/// Response to a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    ZoneList {
        zones: Vec<ZoneView>,
    },
    ProgramList {
        programs: Vec<ProgramView>,
    },
    Status {
        #[serde(flatten)]
        status: StatusReport,
    },
    Zone {
        zone: ZoneView,
    },
    Program {
        program: ProgramView,
    },
    Ok,
    Error {
        code: &'static str,
        message: String,
    },
}

impl Reply {
    /// Error reply carrying the structured code of `err`.
    #[must_use]
    pub fn from_error(err: &SprinklerError) -> Self {
        Self::Error {
            code: err.code(),
            message: describe(err),
        }
    }
}

/// `err` followed by its direct cause, if any.
#[must_use]
pub fn describe(err: &SprinklerError) -> String {
    match std::error::Error::source(err) {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

fn zone_id(value: u8) -> Result<ZoneId, ValidationError> {
    ZoneId::new(value)
}

fn program_id(value: u8) -> Result<ProgramId, ValidationError> {
    ProgramId::new(value)
}

/// `0` means "none".
fn optional<T>(
    value: u8,
    parse: impl FnOnce(u8) -> Result<T, ValidationError>,
) -> Result<Option<T>, ValidationError> {
    if value == 0 {
        Ok(None)
    } else {
        parse(value).map(Some)
    }
}

impl ScheduleInput {
    /// # Errors
    ///
    /// Returns [`ValidationError`] for a day outside `0..=6` or a malformed or
    /// out-of-range start time.
    pub fn to_schedule(&self) -> Result<Schedule, ValidationError> {
        let days = DayMask::from_days(&self.days)?;
        let (hour, minute) = Schedule::parse_start_time(&self.start_time)?;
        Schedule::new(days, hour, minute)
    }
}

/// Executes [`Command`]s against the store and the engine.
pub struct CommandHandler<R, O, N, C> {
    store: Arc<ScheduleStore<R, O, N, C>>,
    engine: Arc<ExecutionEngine<R, O, N, C>>,
    manual_zone_seconds: u32,
}

impl<R, O, N, C> CommandHandler<R, O, N, C>
where
    R: RecordStore + 'static,
    O: OutputDriver + 'static,
    N: ChangeNotifier + 'static,
    C: Clock + 'static,
{
    pub fn new(
        store: Arc<ScheduleStore<R, O, N, C>>,
        engine: Arc<ExecutionEngine<R, O, N, C>>,
    ) -> Self {
        Self {
            store,
            engine,
            manual_zone_seconds: DEFAULT_MANUAL_ZONE_SECONDS,
        }
    }

    #[must_use]
    pub fn with_manual_zone_seconds(mut self, seconds: u32) -> Self {
        self.manual_zone_seconds = seconds;
        self
    }

    pub fn store(&self) -> &Arc<ScheduleStore<R, O, N, C>> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine<R, O, N, C>> {
        &self.engine
    }

    /// Every zone with its live status.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Timeout`] if the store lock is unavailable.
    pub async fn zones(&self) -> Result<Vec<ZoneView>, SprinklerError> {
        let state = self.engine.status().state;
        self.store.read(|catalog| zone_views(catalog, &state)).await
    }

    /// Every program with its live status.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Timeout`] if the store lock is unavailable.
    pub async fn programs(&self) -> Result<Vec<ProgramView>, SprinklerError> {
        let state = self.engine.status().state;
        self.store.read(|catalog| program_views(catalog, &state)).await
    }

    /// Run `command`.
    ///
    /// # Errors
    ///
    /// Returns whatever the underlying store or engine operation returns, or
    /// [`SprinklerError::InvalidArgument`] for malformed ids, days, start
    /// times or a missing target.
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, command: Command) -> Result<Reply, SprinklerError> {
        let state = || self.engine.status().state;
        match command {
            Command::GetZones => Ok(Reply::ZoneList {
                zones: self.zones().await?,
            }),
            Command::GetPrograms => Ok(Reply::ProgramList {
                programs: self.programs().await?,
            }),
            Command::GetStatus => Ok(Reply::Status {
                status: self.engine.report(),
            }),
            Command::CreateOrUpdateZone {
                zone_id: id,
                name,
                output,
            } => {
                let id = optional(id, zone_id)?;
                let zone = self
                    .store
                    .create_or_update_zone(id, &name, OutputPin(output))
                    .await?;
                Ok(Reply::Zone {
                    zone: ZoneView::new(&zone, &state()),
                })
            }
            Command::DeleteZone { zone_id: id } => {
                self.engine.remove_zone(zone_id(id)?).await?;
                Ok(Reply::Ok)
            }
            Command::CreateOrUpdateProgram {
                id,
                name,
                schedule,
                zones,
            } => {
                let id = optional(id, program_id)?;
                let schedule = schedule.to_schedule()?;
                let zones = zones
                    .iter()
                    .map(|z| Ok(ProgramZone::new(zone_id(z.id)?, z.duration, z.order)))
                    .collect::<Result<Vec<_>, ValidationError>>()?;
                let program = self
                    .store
                    .create_or_update_program(id, &name, schedule, zones)
                    .await?;
                Ok(Reply::Program {
                    program: ProgramView::new(&program, &state()),
                })
            }
            Command::DeleteProgram { program_id: id } => {
                self.store.remove_program(program_id(id)?).await?;
                Ok(Reply::Ok)
            }
            Command::AddZoneToProgram {
                program_id: program,
                zone_id: zone,
                duration,
                order,
            } => {
                let program = self
                    .store
                    .add_zone_to_program(program_id(program)?, zone_id(zone)?, duration, order)
                    .await?;
                Ok(Reply::Program {
                    program: ProgramView::new(&program, &state()),
                })
            }
            Command::Enable {
                zone_id: zone,
                program_id: program,
                is_enabled,
            } => match (zone, program) {
                (Some(zone), _) => {
                    let zone = self.store.enable_zone(zone_id(zone)?, is_enabled).await?;
                    Ok(Reply::Zone {
                        zone: ZoneView::new(&zone, &state()),
                    })
                }
                (None, Some(program)) => {
                    let program = self
                        .store
                        .enable_program(program_id(program)?, is_enabled)
                        .await?;
                    Ok(Reply::Program {
                        program: ProgramView::new(&program, &state()),
                    })
                }
                (None, None) => Err(ValidationError::MissingTarget.into()),
            },
            Command::TestManual {
                zone_id: zone,
                program_id: program,
                action,
                duration,
            } => {
                match (action, zone, program) {
                    (ManualAction::Stop, _, _) => self.engine.stop_pending().await?,
                    (ManualAction::Start, Some(zone), _) => {
                        let seconds = duration.unwrap_or(self.manual_zone_seconds);
                        self.engine.manual_zone(zone_id(zone)?, seconds).await?;
                    }
                    (ManualAction::Start, None, Some(program)) => {
                        self.engine.manual_program(program_id(program)?).await?;
                    }
                    (ManualAction::Start, None, None) => {
                        return Err(ValidationError::MissingTarget.into());
                    }
                }
                Ok(Reply::Ok)
            }
        }
    }

    /// Like [`Self::execute`], folding failures into [`Reply::Error`].
    pub async fn handle(&self, command: Command) -> Reply {
        match self.execute(command).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(code = err.code(), error = %describe(&err), "command failed");
                Reply::from_error(&err)
            }
        }
    }
}
