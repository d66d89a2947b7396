//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`SprinklerError`] via `#[from]`. The variants mirror the controller's
//! error taxonomy so callers can report a structured code with
//! [`SprinklerError::code`].

/// Top-level error for every store and engine operation.
#[derive(Debug, thiserror::Error)]
pub enum SprinklerError {
    #[error("invalid argument")]
    InvalidArgument(#[from] ValidationError),

    #[error("invalid state")]
    InvalidState(#[from] StateError),

    #[error("timed out waiting for the schedule lock")]
    Timeout,

    #[error("no free slot")]
    NoMemory(#[from] CapacityError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("output error")]
    Output(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SprinklerError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::InvalidState(_) => "invalid_state",
            Self::Timeout => "timeout",
            Self::NoMemory(_) => "no_memory",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage",
            Self::Output(_) => "output",
        }
    }
}

/// Rejected input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} id {id} is outside 1..={max}")]
    IdOutOfRange {
        kind: &'static str,
        id: u8,
        max: u8,
    },

    #[error("name must not be empty")]
    EmptyName,

    #[error("day index {0} is outside 0..=6")]
    InvalidDay(u8),

    #[error("day mask {0:#010b} uses more than 7 bits")]
    InvalidDayMask(u8),

    #[error("start time {hour:02}:{minute:02} is not a valid time of day")]
    InvalidStartTime { hour: u8, minute: u8 },

    #[error("start time {0:?} is not formatted as HH:MM")]
    MalformedStartTime(String),

    #[error("duration must not be zero")]
    ZeroDuration,

    #[error("program holds at most {max} zones, got {count}")]
    TooManyZones { count: usize, max: usize },

    #[error("command needs either a zone_id or a program_id")]
    MissingTarget,
}

/// Operation not allowed in the current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("{kind} slot {id} is empty")]
    EmptySlot { kind: &'static str, id: u8 },

    #[error("zone {0} is outside the controllable range")]
    ZoneOutOfRange(u8),

    #[error("controller is already running")]
    AlreadyRunning,

    #[error("controller is not running")]
    NotRunning,
}

/// A slot table or a per-program list is full.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("all {0} zone slots are in use")]
    ZonesFull(u8),

    #[error("all {0} program slots are in use")]
    ProgramsFull(u8),

    #[error("program {program_id} already holds {max} zones")]
    ProgramZonesFull { program_id: u8, max: usize },

    #[error("command queue is full")]
    QueueFull,
}

/// A referenced record does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}
