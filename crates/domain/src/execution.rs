//! Transient execution state of the controller.
//!
//! Nothing here is persisted. The engine worker is the only writer; other
//! tasks observe [`EngineStatus`] snapshots.

use serde::{Deserialize, Serialize};

use crate::id::{ProgramId, ZoneId};
use crate::time::{Timestamp, elapsed_seconds};

/// Why a zone is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunKind {
    /// Step `zone_index` of a program.
    Scheduled {
        program_id: ProgramId,
        zone_index: usize,
    },
    /// Operator-started run outside any program.
    Manual,
}

impl RunKind {
    #[must_use]
    pub fn program_id(&self) -> Option<ProgramId> {
        match self {
            Self::Scheduled { program_id, .. } => Some(*program_id),
            Self::Manual => None,
        }
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual)
    }
}

/// The zone currently driven on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveZone {
    pub run: RunKind,
    pub zone_id: ZoneId,
    pub started_at: Timestamp,
    /// Planned run length in seconds; `None` runs until stopped.
    pub duration: Option<u32>,
}

impl ActiveZone {
    /// Seconds left at `now`, clamped at zero. `None` for an open-ended run.
    #[must_use]
    pub fn remaining(&self, now: Timestamp) -> Option<u32> {
        self.duration
            .map(|duration| duration.saturating_sub(elapsed_seconds(self.started_at, now)))
    }
}

/// What the sequencer is doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionState {
    #[default]
    Idle,
    Active(ActiveZone),
}

impl ExecutionState {
    #[must_use]
    pub fn active(&self) -> Option<&ActiveZone> {
        match self {
            Self::Idle => None,
            Self::Active(active) => Some(active),
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Program currently being sequenced, if any.
    #[must_use]
    pub fn program_id(&self) -> Option<ProgramId> {
        self.active().and_then(|a| a.run.program_id())
    }
}

/// Read-only engine snapshot published to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub running: bool,
    pub state: ExecutionState,
}

/// Serializable view of an [`EngineStatus`] at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub running: bool,
    pub active: Option<ActiveReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveReport {
    #[serde(flatten)]
    pub zone: ActiveZone,
    pub remaining: Option<u32>,
}

impl EngineStatus {
    /// Snapshot with `remaining` computed against `now`.
    #[must_use]
    pub fn report(&self, now: Timestamp) -> StatusReport {
        StatusReport {
            running: self.running,
            active: self.state.active().map(|zone| ActiveReport {
                zone: *zone,
                remaining: zone.remaining(now),
            }),
        }
    }
}
