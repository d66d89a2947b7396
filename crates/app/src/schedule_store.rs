//! Schedule store holding the authoritative zone and program catalog.
//!
//! Every operation takes the store lock with a bounded wait and fails with
//! [`SprinklerError::Timeout`] instead of blocking forever. Mutations are
//! validated, persisted, applied in memory, then announced through the
//! [`ChangeNotifier`], in that order: a failed write leaves the catalog
//! untouched.

use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex, MutexGuard};

use sprinkler_domain::catalog::Catalog;
use sprinkler_domain::error::{NotFoundError, SprinklerError};
use sprinkler_domain::id::{OutputPin, ProgramId, ZoneId};
use sprinkler_domain::program::{Program, ProgramZone, Schedule};
use sprinkler_domain::time::Timestamp;
use sprinkler_domain::zone::{Zone, normalize_name};

use crate::ports::{ChangeKind, ChangeNotifier, Clock, OutputDriver, RecordStore};
use crate::records;

/// Default bound on waiting for the store lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Owns the in-memory [`Catalog`] and keeps persistence in step with it.
pub struct ScheduleStore<R, O, N, C> {
    catalog: Mutex<Catalog>,
    records: R,
    outputs: O,
    notifier: N,
    clock: C,
    lock_timeout: Duration,
}

impl<R, O, N, C> ScheduleStore<R, O, N, C>
where
    R: RecordStore,
    O: OutputDriver,
    N: ChangeNotifier,
    C: Clock,
{
    /// Create an empty store. Call [`ScheduleStore::load_all`] to bootstrap
    /// it from persistence.
    pub fn new(records: R, outputs: O, notifier: N, clock: C) -> Self {
        Self {
            catalog: Mutex::new(Catalog::new()),
            records,
            outputs,
            notifier,
            clock,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override how long operations wait for the store lock.
    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Local wall-clock time.
    pub fn now(&self) -> DateTime<Tz> {
        self.clock.now()
    }

    async fn lock(&self) -> Result<MutexGuard<'_, Catalog>, SprinklerError> {
        tokio::time::timeout(self.lock_timeout, self.catalog.lock())
            .await
            .map_err(|_| {
                tracing::error!(
                    timeout = ?self.lock_timeout,
                    "schedule lock not acquired in time"
                );
                SprinklerError::Timeout
            })
    }

    async fn persist_zone(&self, zone: &Zone) -> Result<(), SprinklerError> {
        let bytes = records::encode(zone)?;
        self.records.write(&records::zone_key(zone.id), bytes).await
    }

    async fn persist_program(&self, program: &Program) -> Result<(), SprinklerError> {
        let bytes = records::encode(program)?;
        self.records
            .write(&records::program_key(program.id), bytes)
            .await
    }

    /// Run `f` over a consistent view of the catalog with the lock held.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Timeout`] if the lock is unavailable.
    pub async fn read<T>(&self, f: impl FnOnce(&Catalog) -> T) -> Result<T, SprinklerError> {
        let catalog = self.lock().await?;
        Ok(f(&catalog))
    }

    /// Copy of the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Timeout`] if the lock is unavailable.
    pub async fn snapshot(&self) -> Result<Catalog, SprinklerError> {
        self.read(Catalog::clone).await
    }

    /// Rebuild the catalog from persistence.
    ///
    /// Unreadable or undecodable records are logged and leave their slot
    /// empty. References to zones that did not load are pruned.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Timeout`] if the lock is unavailable.
    #[tracing::instrument(skip(self))]
    pub async fn load_all(&self) -> Result<Catalog, SprinklerError> {
        let mut catalog = self.lock().await?;
        let mut loaded = Catalog::new();

        for id in ZoneId::all() {
            if let Some(zone) = self.load_record::<Zone>(&records::zone_key(id)).await {
                if zone.id == id {
                    loaded.put_zone(zone);
                } else {
                    tracing::warn!(slot = %id, stored_id = %zone.id, "zone record in wrong slot, skipped");
                }
            }
        }
        for id in ProgramId::all() {
            if let Some(program) = self.load_record::<Program>(&records::program_key(id)).await {
                if program.id == id {
                    loaded.put_program(program);
                } else {
                    tracing::warn!(slot = %id, stored_id = %program.id, "program record in wrong slot, skipped");
                }
            }
        }

        for program_id in loaded.prune_dangling_refs() {
            tracing::warn!(program = %program_id, "dropped references to missing zones");
            let Some(program) = loaded.program(program_id) else {
                continue;
            };
            if let Err(err) = self.persist_program(program).await {
                tracing::warn!(program = %program_id, error = %err, "failed to persist pruned program");
            }
        }

        tracing::info!(
            zones = loaded.zones().count(),
            programs = loaded.programs().count(),
            "catalog loaded"
        );
        *catalog = loaded.clone();
        drop(catalog);

        self.notifier.notify(ChangeKind::Zones);
        self.notifier.notify(ChangeKind::Programs);
        Ok(loaded)
    }

    async fn load_record<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.records.read(key).await {
            Ok(Some(bytes)) => match records::decode(&bytes) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(key, error = %err, "skipping undecodable record");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read record");
                None
            }
        }
    }

    /// Read one zone straight from persistence.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::NotFound`] when no record exists, or a
    /// storage error.
    pub async fn load_zone(&self, id: ZoneId) -> Result<Zone, SprinklerError> {
        let bytes = self
            .records
            .read(&records::zone_key(id))
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "Zone",
                id: id.to_string(),
            })?;
        Ok(records::decode(&bytes)?)
    }

    /// Read one program straight from persistence.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::NotFound`] when no record exists, or a
    /// storage error.
    pub async fn load_program(&self, id: ProgramId) -> Result<Program, SprinklerError> {
        let bytes = self
            .records
            .read(&records::program_key(id))
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "Program",
                id: id.to_string(),
            })?;
        Ok(records::decode(&bytes)?)
    }

    /// Create a zone in the first free slot (`id == None`) or update an
    /// existing one. The output line is configured inactive.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::NoMemory`] when creating and every slot is used
    /// - [`SprinklerError::InvalidState`] when updating an empty slot
    /// - [`SprinklerError::InvalidArgument`] for an empty name
    /// - [`SprinklerError::Timeout`] or a storage error
    #[tracing::instrument(skip(self))]
    pub async fn create_or_update_zone(
        &self,
        id: Option<ZoneId>,
        name: &str,
        output: OutputPin,
    ) -> Result<Zone, SprinklerError> {
        let mut catalog = self.lock().await?;
        let (zone, output_changed) = match id {
            None => {
                let zone = Zone::builder(catalog.free_zone_id()?)
                    .name(name)
                    .output(output)
                    .build()?;
                (zone, true)
            }
            Some(id) => {
                let mut zone = catalog.require_zone(id)?.clone();
                let output_changed = zone.output != output;
                zone.name = normalize_name(name);
                zone.output = output;
                zone.validate()?;
                (zone, output_changed)
            }
        };

        self.persist_zone(&zone).await?;
        catalog.put_zone(zone.clone());
        drop(catalog);

        // Configuring drives the line inactive, so an unchanged line is left alone.
        if output_changed {
            if let Err(err) = self.outputs.configure(zone.output) {
                tracing::warn!(zone = %zone.id, output = %zone.output, error = %err, "failed to configure output");
            }
        }
        tracing::info!(zone = %zone.id, name = %zone.name, "zone saved");
        self.notifier.notify(ChangeKind::Zones);
        Ok(zone)
    }

    /// Delete a zone and every program reference to it.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] when the slot is empty
    /// - [`SprinklerError::Timeout`] or a storage error from deleting the
    ///   zone record (the catalog is then unchanged)
    #[tracing::instrument(skip(self))]
    pub async fn remove_zone(&self, id: ZoneId) -> Result<Zone, SprinklerError> {
        let mut catalog = self.lock().await?;
        catalog.require_zone(id)?;
        self.records.delete(&records::zone_key(id)).await?;

        let removed = catalog.take_zone(id);
        let touched = catalog.cascade_zone_removal(id);
        for program_id in &touched {
            let Some(program) = catalog.program(*program_id) else {
                continue;
            };
            if let Err(err) = self.persist_program(program).await {
                tracing::warn!(program = %program_id, error = %err, "failed to persist program after zone removal");
            }
        }
        drop(catalog);

        tracing::info!(zone = %id, programs_updated = touched.len(), "zone removed");
        self.notifier.notify(ChangeKind::Zones);
        self.notifier.notify(ChangeKind::Programs);
        removed.ok_or_else(|| {
            NotFoundError {
                entity: "Zone",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Enable or disable a zone. Disabled zones are skipped by programs.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] when the slot is empty
    /// - [`SprinklerError::Timeout`] or a storage error
    #[tracing::instrument(skip(self))]
    pub async fn enable_zone(&self, id: ZoneId, enabled: bool) -> Result<Zone, SprinklerError> {
        let mut catalog = self.lock().await?;
        let mut zone = catalog.require_zone(id)?.clone();
        zone.enabled = enabled;

        self.persist_zone(&zone).await?;
        catalog.put_zone(zone.clone());
        drop(catalog);

        self.notifier.notify(ChangeKind::Zones);
        Ok(zone)
    }

    /// Record a zone switching on or off. Turning on stamps `last_run`.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] when turning on an empty slot
    /// - [`SprinklerError::Timeout`] or a storage error
    #[tracing::instrument(skip(self))]
    pub async fn update_zone_status(&self, id: ZoneId, turn_on: bool) -> Result<(), SprinklerError> {
        if turn_on {
            let mut catalog = self.lock().await?;
            let mut zone = catalog.require_zone(id)?.clone();
            zone.last_run = Some(self.clock.utc_now());

            self.persist_zone(&zone).await?;
            catalog.put_zone(zone);
        }
        self.notifier.notify(ChangeKind::Zones);
        Ok(())
    }

    /// Create a program in the first free slot (`id == None`) or replace the
    /// definition of an existing one, keeping its enabled flag and
    /// `last_run`. Zone references are sorted by `order` and renumbered.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::NoMemory`] when creating and every slot is used
    /// - [`SprinklerError::InvalidState`] when updating an empty slot
    /// - [`SprinklerError::InvalidArgument`] for an invalid name, start
    ///   time, duration or zone count
    /// - [`SprinklerError::NotFound`] when a referenced zone does not exist
    /// - [`SprinklerError::Timeout`] or a storage error
    #[tracing::instrument(skip(self))]
    pub async fn create_or_update_program(
        &self,
        id: Option<ProgramId>,
        name: &str,
        schedule: Schedule,
        zones: Vec<ProgramZone>,
    ) -> Result<Program, SprinklerError> {
        let mut catalog = self.lock().await?;
        schedule.validate()?;
        if let Some(missing) = zones.iter().find(|z| catalog.zone(z.zone_id).is_none()) {
            return Err(NotFoundError {
                entity: "Zone",
                id: missing.zone_id.to_string(),
            }
            .into());
        }

        let builder = match id {
            None => Program::builder(catalog.free_program_id()?),
            Some(id) => {
                let current = catalog.require_program(id)?;
                let builder = Program::builder(id).enabled(current.enabled);
                match current.last_run {
                    Some(last_run) => builder.last_run(last_run),
                    None => builder,
                }
            }
        };
        let mut program = builder
            .name(name)
            .schedule(schedule)
            .zones(zones)
            .build()?;
        program.refresh_next_run(&self.clock.now());

        self.persist_program(&program).await?;
        catalog.put_program(program.clone());
        drop(catalog);

        tracing::info!(program = %program.id, name = %program.name, next_run = ?program.next_run, "program saved");
        self.notifier.notify(ChangeKind::Programs);
        Ok(program)
    }

    /// Delete a program.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] when the slot is empty
    /// - [`SprinklerError::Timeout`] or a storage error
    #[tracing::instrument(skip(self))]
    pub async fn remove_program(&self, id: ProgramId) -> Result<Program, SprinklerError> {
        let mut catalog = self.lock().await?;
        catalog.require_program(id)?;
        self.records.delete(&records::program_key(id)).await?;
        let removed = catalog.take_program(id);
        drop(catalog);

        tracing::info!(program = %id, "program removed");
        self.notifier.notify(ChangeKind::Programs);
        removed.ok_or_else(|| {
            NotFoundError {
                entity: "Program",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Enable or disable a program and recompute its `next_run`.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] when the slot is empty
    /// - [`SprinklerError::Timeout`] or a storage error
    #[tracing::instrument(skip(self))]
    pub async fn enable_program(&self, id: ProgramId, enabled: bool) -> Result<Program, SprinklerError> {
        self.modify_program(id, |program, now| {
            program.enabled = enabled;
            program.refresh_next_run(now);
            Ok(())
        })
        .await
    }

    /// Insert a zone into a program at `min(order, len)`.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] when the program slot is empty
    /// - [`SprinklerError::NotFound`] when the zone does not exist
    /// - [`SprinklerError::NoMemory`] when the program's zone list is full
    /// - [`SprinklerError::InvalidArgument`] for a zero duration
    /// - [`SprinklerError::Timeout`] or a storage error
    #[tracing::instrument(skip(self))]
    pub async fn add_zone_to_program(
        &self,
        program_id: ProgramId,
        zone_id: ZoneId,
        duration_minutes: u16,
        order: u8,
    ) -> Result<Program, SprinklerError> {
        let mut catalog = self.lock().await?;
        let mut program = catalog.require_program(program_id)?.clone();
        if catalog.zone(zone_id).is_none() {
            return Err(NotFoundError {
                entity: "Zone",
                id: zone_id.to_string(),
            }
            .into());
        }
        program.insert_zone(zone_id, duration_minutes, order)?;

        self.persist_program(&program).await?;
        catalog.put_program(program.clone());
        drop(catalog);

        self.notifier.notify(ChangeKind::Programs);
        Ok(program)
    }

    /// Recompute a program's `next_run` from the current time.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] when the slot is empty
    /// - [`SprinklerError::Timeout`] or a storage error
    #[tracing::instrument(skip(self))]
    pub async fn update_program_next_run(&self, id: ProgramId) -> Result<Program, SprinklerError> {
        self.modify_program(id, |program, now| {
            program.refresh_next_run(now);
            Ok(())
        })
        .await
    }

    /// Stamp a program's `last_run` with the current time.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] when the slot is empty
    /// - [`SprinklerError::Timeout`] or a storage error
    #[tracing::instrument(skip(self))]
    pub async fn update_program_last_run(&self, id: ProgramId) -> Result<Program, SprinklerError> {
        self.modify_program(id, |program, now| {
            program.last_run = Some(now.with_timezone(&Utc));
            Ok(())
        })
        .await
    }

    async fn modify_program(
        &self,
        id: ProgramId,
        change: impl FnOnce(&mut Program, &DateTime<Tz>) -> Result<(), SprinklerError>,
    ) -> Result<Program, SprinklerError> {
        let mut catalog = self.lock().await?;
        let mut program = catalog.require_program(id)?.clone();
        change(&mut program, &self.clock.now())?;

        self.persist_program(&program).await?;
        catalog.put_program(program.clone());
        drop(catalog);

        self.notifier.notify(ChangeKind::Programs);
        Ok(program)
    }

    /// Recompute `next_run` of every program, persisting the ones that
    /// changed. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Timeout`] if the lock is unavailable.
    /// Individual write failures are logged and leave that program as it was.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_next_runs(&self) -> Result<usize, SprinklerError> {
        let mut catalog = self.lock().await?;
        let now = self.clock.now();
        let mut changed = 0;

        let programs: Vec<Program> = catalog.programs().cloned().collect();
        for mut program in programs {
            let previous = program.next_run;
            program.refresh_next_run(&now);
            if program.next_run == previous {
                continue;
            }
            match self.persist_program(&program).await {
                Ok(()) => {
                    tracing::debug!(program = %program.id, next_run = ?program.next_run, "next run refreshed");
                    catalog.put_program(program);
                    changed += 1;
                }
                Err(err) => {
                    tracing::warn!(program = %program.id, error = %err, "failed to persist refreshed next run");
                }
            }
        }
        drop(catalog);

        if changed > 0 {
            self.notifier.notify(ChangeKind::Programs);
        }
        Ok(changed)
    }

    /// Delete every record and empty the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Timeout`] or the first storage error; records
    /// deleted before the failure stay deleted and the in-memory catalog is
    /// reloaded from what remains.
    #[tracing::instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<(), SprinklerError> {
        let mut catalog = self.lock().await?;
        let keys = ZoneId::all()
            .map(records::zone_key)
            .chain(ProgramId::all().map(records::program_key));

        for key in keys {
            if let Err(err) = self.records.delete(&key).await {
                tracing::error!(key, error = %err, "factory reset interrupted");
                drop(catalog);
                self.load_all().await?;
                return Err(err);
            }
        }
        *catalog = Catalog::new();
        drop(catalog);

        tracing::info!("all zones and programs cleared");
        self.notifier.notify(ChangeKind::Zones);
        self.notifier.notify(ChangeKind::Programs);
        Ok(())
    }

    /// `last_run` of a zone, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Timeout`] if the lock is unavailable.
    pub async fn zone_last_run(&self, id: ZoneId) -> Result<Option<Timestamp>, SprinklerError> {
        self.read(|catalog| catalog.zone(id).and_then(|z| z.last_run))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, harness_at, tuesday};
    use chrono::{TimeDelta, Weekday};
    use sprinkler_domain::days::DayMask;
    use sprinkler_domain::error::{CapacityError, StateError, ValidationError};
    use sprinkler_domain::{MAX_PROGRAMS, MAX_ZONES};
    use std::sync::Arc;

    fn zone_id(n: u8) -> ZoneId {
        ZoneId::new(n).unwrap()
    }

    fn program_id(n: u8) -> ProgramId {
        ProgramId::new(n).unwrap()
    }

    fn weekdays_at(hour: u8) -> Schedule {
        let days: DayMask = [Weekday::Mon, Weekday::Wed].into_iter().collect();
        Schedule::new(days, hour, 0).unwrap()
    }

    async fn with_zones(h: &Harness, count: u8) {
        for n in 1..=count {
            h.store
                .create_or_update_zone(None, &format!("Zone {n}"), OutputPin(n + 10))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn should_allocate_first_free_zone_slot() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 3).await;
        h.store.remove_zone(zone_id(2)).await.unwrap();

        let zone = h
            .store
            .create_or_update_zone(None, "Back yard", OutputPin(4))
            .await
            .unwrap();

        assert_eq!(zone.id, zone_id(2));
        assert!(zone.enabled);
        assert!(h.outputs.is_configured(OutputPin(4)));
    }

    #[tokio::test]
    async fn should_return_no_memory_when_zone_slots_are_full() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, MAX_ZONES).await;

        let result = h
            .store
            .create_or_update_zone(None, "One too many", OutputPin(1))
            .await;
        assert!(matches!(
            result,
            Err(SprinklerError::NoMemory(CapacityError::ZonesFull(_)))
        ));
    }

    #[tokio::test]
    async fn should_return_invalid_state_when_updating_empty_slot() {
        let h = harness_at(tuesday(10, 0));
        let result = h
            .store
            .create_or_update_zone(Some(zone_id(5)), "Ghost", OutputPin(1))
            .await;
        assert!(matches!(
            result,
            Err(SprinklerError::InvalidState(StateError::EmptySlot { .. }))
        ));
    }

    #[tokio::test]
    async fn should_keep_flags_when_updating_zone() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 1).await;
        h.store.enable_zone(zone_id(1), false).await.unwrap();

        let zone = h
            .store
            .create_or_update_zone(Some(zone_id(1)), "Renamed", OutputPin(20))
            .await
            .unwrap();

        assert_eq!(zone.name, "Renamed");
        assert_eq!(zone.output, OutputPin(20));
        assert!(!zone.enabled);
    }

    #[tokio::test]
    async fn should_roll_back_allocation_when_write_fails() {
        let h = harness_at(tuesday(10, 0));
        h.records.fail_writes(true);

        let result = h
            .store
            .create_or_update_zone(None, "Lost", OutputPin(1))
            .await;
        assert!(matches!(result, Err(SprinklerError::Storage(_))));

        let catalog = h.store.snapshot().await.unwrap();
        assert_eq!(catalog.zones().count(), 0);
        assert!(h.notifier.take().is_empty());

        h.records.fail_writes(false);
        let zone = h
            .store
            .create_or_update_zone(None, "Found", OutputPin(1))
            .await
            .unwrap();
        assert_eq!(zone.id, zone_id(1));
    }

    #[tokio::test]
    async fn should_keep_previous_zone_when_update_write_fails() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 1).await;
        h.records.fail_writes(true);

        let result = h
            .store
            .create_or_update_zone(Some(zone_id(1)), "New name", OutputPin(3))
            .await;
        assert!(result.is_err());

        let name = h
            .store
            .read(|c| c.zone(zone_id(1)).map(|z| z.name.clone()))
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("Zone 1"));
    }

    #[tokio::test]
    async fn should_roundtrip_zone_through_persistence() {
        let h = harness_at(tuesday(10, 0));
        let zone = h
            .store
            .create_or_update_zone(None, "Roses", OutputPin(7))
            .await
            .unwrap();

        assert_eq!(h.store.load_zone(zone.id).await.unwrap(), zone);

        h.store.remove_zone(zone.id).await.unwrap();
        assert!(matches!(
            h.store.load_zone(zone.id).await,
            Err(SprinklerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_roundtrip_program_through_persistence() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 2).await;
        let program = h
            .store
            .create_or_update_program(
                None,
                "Morning",
                weekdays_at(6),
                vec![
                    ProgramZone::new(zone_id(1), 10, 0),
                    ProgramZone::new(zone_id(2), 20, 1),
                ],
            )
            .await
            .unwrap();

        assert_eq!(h.store.load_program(program.id).await.unwrap(), program);

        h.store.remove_program(program.id).await.unwrap();
        assert!(matches!(
            h.store.load_program(program.id).await,
            Err(SprinklerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_compute_next_run_when_saving_program() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 1).await;

        let program = h
            .store
            .create_or_update_program(
                None,
                "Morning",
                Schedule::new([Weekday::Mon, Weekday::Wed].into_iter().collect(), 8, 0).unwrap(),
                vec![ProgramZone::new(zone_id(1), 10, 0)],
            )
            .await
            .unwrap();

        assert_eq!(program.next_run, Some(tuesday(8, 0).with_timezone(&Utc) + TimeDelta::days(1)));
    }

    #[tokio::test]
    async fn should_reject_program_referencing_missing_zone() {
        let h = harness_at(tuesday(10, 0));
        let result = h
            .store
            .create_or_update_program(
                None,
                "Broken",
                weekdays_at(6),
                vec![ProgramZone::new(zone_id(3), 10, 0)],
            )
            .await;
        assert!(matches!(result, Err(SprinklerError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_reject_invalid_start_time() {
        let h = harness_at(tuesday(10, 0));
        let schedule = Schedule {
            days: DayMask::EVERY_DAY,
            start_hour: 24,
            start_minute: 0,
        };
        let result = h
            .store
            .create_or_update_program(None, "Late", schedule, vec![])
            .await;
        assert!(matches!(
            result,
            Err(SprinklerError::InvalidArgument(
                ValidationError::InvalidStartTime { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn should_return_no_memory_when_program_slots_are_full() {
        let h = harness_at(tuesday(10, 0));
        for n in 0..MAX_PROGRAMS {
            h.store
                .create_or_update_program(None, &format!("P{n}"), weekdays_at(6), vec![])
                .await
                .unwrap();
        }
        let result = h
            .store
            .create_or_update_program(None, "Extra", weekdays_at(6), vec![])
            .await;
        assert!(matches!(
            result,
            Err(SprinklerError::NoMemory(CapacityError::ProgramsFull(_)))
        ));
    }

    #[tokio::test]
    async fn should_cascade_zone_removal_and_persist_programs() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 3).await;
        let program = h
            .store
            .create_or_update_program(
                None,
                "All",
                weekdays_at(6),
                vec![
                    ProgramZone::new(zone_id(1), 5, 0),
                    ProgramZone::new(zone_id(2), 5, 1),
                    ProgramZone::new(zone_id(3), 5, 2),
                ],
            )
            .await
            .unwrap();
        h.notifier.take();

        h.store.remove_zone(zone_id(2)).await.unwrap();

        let stored = h.store.load_program(program.id).await.unwrap();
        let refs: Vec<(u8, u8)> = stored
            .zones
            .iter()
            .map(|z| (z.zone_id.get(), z.order))
            .collect();
        assert_eq!(refs, vec![(1, 0), (3, 1)]);
        assert_eq!(h.notifier.take(), vec![ChangeKind::Zones, ChangeKind::Programs]);
        assert!(!h.records.keys().contains(&"zone_2".to_string()));
    }

    #[tokio::test]
    async fn should_leave_catalog_intact_when_zone_delete_fails() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 1).await;
        h.records
            .fail_deletes
            .store(true, std::sync::atomic::Ordering::SeqCst);

        assert!(h.store.remove_zone(zone_id(1)).await.is_err());
        assert!(h.store.read(|c| c.zone(zone_id(1)).is_some()).await.unwrap());
    }

    #[tokio::test]
    async fn should_clear_next_run_when_program_disabled() {
        let h = harness_at(tuesday(10, 0));
        let program = h
            .store
            .create_or_update_program(None, "Morning", weekdays_at(6), vec![])
            .await
            .unwrap();
        assert!(program.next_run.is_some());

        let disabled = h.store.enable_program(program.id, false).await.unwrap();
        assert!(disabled.next_run.is_none());

        let enabled = h.store.enable_program(program.id, true).await.unwrap();
        assert_eq!(enabled.next_run, program.next_run);
    }

    #[tokio::test]
    async fn should_insert_zone_into_program_and_renumber() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 3).await;
        let program = h
            .store
            .create_or_update_program(
                None,
                "Two",
                weekdays_at(6),
                vec![
                    ProgramZone::new(zone_id(1), 5, 0),
                    ProgramZone::new(zone_id(2), 5, 1),
                ],
            )
            .await
            .unwrap();

        let updated = h
            .store
            .add_zone_to_program(program.id, zone_id(3), 15, 1)
            .await
            .unwrap();

        let refs: Vec<(u8, u8)> = updated
            .zones
            .iter()
            .map(|z| (z.zone_id.get(), z.order))
            .collect();
        assert_eq!(refs, vec![(1, 0), (3, 1), (2, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stamp_last_run_only_when_zone_turns_on() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 1).await;

        h.store.update_zone_status(zone_id(1), false).await.unwrap();
        assert_eq!(h.store.zone_last_run(zone_id(1)).await.unwrap(), None);

        h.store.update_zone_status(zone_id(1), true).await.unwrap();
        assert_eq!(
            h.store.zone_last_run(zone_id(1)).await.unwrap(),
            Some(tuesday(10, 0).with_timezone(&Utc))
        );
    }

    #[tokio::test]
    async fn should_reload_catalog_from_records() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 2).await;
        h.store
            .create_or_update_program(
                None,
                "Morning",
                weekdays_at(6),
                vec![ProgramZone::new(zone_id(2), 5, 0)],
            )
            .await
            .unwrap();
        let before = h.store.snapshot().await.unwrap();

        let fresh = ScheduleStore::new(
            Arc::clone(&h.records),
            Arc::clone(&h.outputs),
            Arc::clone(&h.notifier),
            crate::testing::TestClock::starting_at(tuesday(10, 0)),
        );
        let loaded = fresh.load_all().await.unwrap();

        assert_eq!(loaded, before);
    }

    #[tokio::test]
    async fn should_skip_bad_records_and_prune_dangling_refs_on_load() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 2).await;
        h.store
            .create_or_update_program(
                None,
                "Morning",
                weekdays_at(6),
                vec![
                    ProgramZone::new(zone_id(1), 5, 0),
                    ProgramZone::new(zone_id(2), 5, 1),
                ],
            )
            .await
            .unwrap();
        h.records.insert_raw("zone_1", b"not json");

        let loaded = h.store.load_all().await.unwrap();

        assert!(loaded.zone(zone_id(1)).is_none());
        let program = loaded.program(program_id(1)).unwrap();
        assert_eq!(program.zones.len(), 1);
        assert_eq!(program.zones[0].zone_id, zone_id(2));
        assert_eq!(program.zones[0].order, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_refresh_stale_next_runs() {
        let h = harness_at(tuesday(10, 0));
        let program = h
            .store
            .create_or_update_program(None, "Morning", weekdays_at(6), vec![])
            .await
            .unwrap();
        assert_eq!(h.store.refresh_next_runs().await.unwrap(), 0);

        // Wednesday 10:00: the Wednesday 06:00 run is now in the past.
        tokio::time::advance(Duration::from_secs(24 * 3600)).await;
        assert_eq!(h.store.refresh_next_runs().await.unwrap(), 1);

        let refreshed = h.store.load_program(program.id).await.unwrap();
        assert_eq!(
            refreshed.next_run,
            Some(tuesday(6, 0).with_timezone(&Utc) + TimeDelta::days(6))
        );
    }

    #[tokio::test]
    async fn should_clear_everything() {
        let h = harness_at(tuesday(10, 0));
        with_zones(&h, 2).await;
        h.store
            .create_or_update_program(None, "Morning", weekdays_at(6), vec![])
            .await
            .unwrap();

        h.store.clear_all().await.unwrap();

        assert!(h.records.keys().is_empty());
        let catalog = h.store.snapshot().await.unwrap();
        assert_eq!(catalog.zones().count(), 0);
        assert_eq!(catalog.programs().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_when_lock_is_held() {
        let h = harness_at(tuesday(10, 0));
        let store = Arc::clone(&h.store);
        let guard = store.catalog.lock().await;

        let result = h.store.create_or_update_zone(None, "Blocked", OutputPin(1)).await;
        assert!(matches!(result, Err(SprinklerError::Timeout)));

        drop(guard);
        assert!(h.records.keys().is_empty());
    }
}
