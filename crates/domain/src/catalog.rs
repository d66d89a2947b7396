//! Catalog — the zone and program slot tables.
//!
//! Slots are sparse maps keyed by id. A slot is either present or absent;
//! new records take the lowest free id.

use std::collections::BTreeMap;

use crate::error::{CapacityError, StateError};
use crate::id::{ProgramId, ZoneId};
use crate::program::{Program, ProgramZone};
use crate::time::Timestamp;
use crate::zone::Zone;
use crate::{MAX_PROGRAMS, MAX_ZONES};

/// In-memory collection of every configured zone and program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    zones: BTreeMap<ZoneId, Zone>,
    programs: BTreeMap<ProgramId, Program>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    pub fn programs(&self) -> impl Iterator<Item = &Program> {
        self.programs.values()
    }

    #[must_use]
    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(&id)
    }

    #[must_use]
    pub fn program(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(&id)
    }

    pub fn program_mut(&mut self, id: ProgramId) -> Option<&mut Program> {
        self.programs.get_mut(&id)
    }

    /// Like [`Catalog::zone`], failing with [`StateError::EmptySlot`].
    ///
    /// # Errors
    ///
    /// Returns [`StateError::EmptySlot`] when the slot is unused.
    pub fn require_zone(&self, id: ZoneId) -> Result<&Zone, StateError> {
        self.zone(id).ok_or(StateError::EmptySlot {
            kind: "zone",
            id: id.get(),
        })
    }

    /// Like [`Catalog::program`], failing with [`StateError::EmptySlot`].
    ///
    /// # Errors
    ///
    /// Returns [`StateError::EmptySlot`] when the slot is unused.
    pub fn require_program(&self, id: ProgramId) -> Result<&Program, StateError> {
        self.program(id).ok_or(StateError::EmptySlot {
            kind: "program",
            id: id.get(),
        })
    }

    /// Lowest unused zone id.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::ZonesFull`] when every slot is taken.
    pub fn free_zone_id(&self) -> Result<ZoneId, CapacityError> {
        ZoneId::all()
            .find(|id| !self.zones.contains_key(id))
            .ok_or(CapacityError::ZonesFull(MAX_ZONES))
    }

    /// Lowest unused program id.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::ProgramsFull`] when every slot is taken.
    pub fn free_program_id(&self) -> Result<ProgramId, CapacityError> {
        ProgramId::all()
            .find(|id| !self.programs.contains_key(id))
            .ok_or(CapacityError::ProgramsFull(MAX_PROGRAMS))
    }

    /// Store a zone in its slot, returning the previous occupant.
    pub fn put_zone(&mut self, zone: Zone) -> Option<Zone> {
        self.zones.insert(zone.id, zone)
    }

    /// Store a program in its slot, returning the previous occupant.
    pub fn put_program(&mut self, program: Program) -> Option<Program> {
        self.programs.insert(program.id, program)
    }

    /// Clear a zone slot without touching programs.
    pub fn take_zone(&mut self, id: ZoneId) -> Option<Zone> {
        self.zones.remove(&id)
    }

    pub fn take_program(&mut self, id: ProgramId) -> Option<Program> {
        self.programs.remove(&id)
    }

    /// Remove every program reference to `zone_id`. Returns the ids of the
    /// programs that changed.
    pub fn cascade_zone_removal(&mut self, zone_id: ZoneId) -> Vec<ProgramId> {
        self.programs
            .values_mut()
            .filter_map(|program| program.remove_zone_refs(zone_id).then_some(program.id))
            .collect()
    }

    /// Drop references to zones that are not in the catalog.
    pub fn prune_dangling_refs(&mut self) -> Vec<ProgramId> {
        let Self { zones, programs } = self;
        programs
            .values_mut()
            .filter_map(|program| {
                let before = program.zones.len();
                program.zones.retain(|z| zones.contains_key(&z.zone_id));
                if program.zones.len() == before {
                    return None;
                }
                program.renumber();
                Some(program.id)
            })
            .collect()
    }

    /// Whether `zone_id` names a present, enabled zone.
    #[must_use]
    pub fn is_zone_enabled(&self, zone_id: ZoneId) -> bool {
        self.zone(zone_id).is_some_and(|z| z.enabled)
    }

    /// First reference of `program_id`, at or after `from`, whose zone is
    /// present and enabled, with its index.
    #[must_use]
    pub fn next_enabled_ref(&self, program_id: ProgramId, from: usize) -> Option<(usize, ProgramZone)> {
        let program = self.program(program_id)?;
        program
            .zones
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, r)| self.is_zone_enabled(r.zone_id))
            .map(|(index, r)| (index, *r))
    }

    /// References of `program` whose zone is present and enabled, with
    /// their original indices.
    pub fn enabled_refs(&self, program: &Program) -> impl Iterator<Item = (usize, ProgramZone)> {
        program
            .zones
            .iter()
            .enumerate()
            .filter(move |(_, r)| self.is_zone_enabled(r.zone_id))
            .map(|(index, r)| (index, *r))
    }

    /// Enabled programs, in slot order, whose `next_run` is at or before
    /// `now`.
    #[must_use]
    pub fn due_programs(&self, now: Timestamp) -> Vec<ProgramId> {
        self.programs()
            .filter(|p| p.enabled && p.next_run.is_some_and(|next| next <= now))
            .map(|p| p.id)
            .collect()
    }
}
