//! Execution engine: runs at most one zone at a time.
//!
//! A single worker task owns the execution state and the zone timer. Callers
//! talk to it through a bounded command queue and read its state from a
//! `watch` snapshot, so a timer expiry can never race a transition.
//!
//! Programs advance zone by zone; references to disabled zones are skipped
//! and take no time. On [`ExecutionEngine::start`] a program interrupted by a
//! restart is resumed where its schedule says it should be, and while idle
//! the worker starts programs whose `next_run` has come.

mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use sprinkler_domain::error::{CapacityError, SprinklerError, StateError, ValidationError};
use sprinkler_domain::execution::{EngineStatus, StatusReport};
use sprinkler_domain::id::{ProgramId, ZoneId};
use sprinkler_domain::zone::Zone;
use sprinkler_domain::recovery::find_resumable;

use crate::ports::{ChangeNotifier, Clock, OutputDriver, RecordStore};
use crate::schedule_store::ScheduleStore;

use self::worker::{Command, Worker};

/// Tuning knobs for the engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Capacity of the command queue.
    pub queue_depth: usize,
    /// How often the worker checks the stop flag and due programs.
    pub poll_interval: Duration,
    /// Bound on waiting for queue space, for a reply, or for the worker to
    /// exit.
    pub command_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_depth: 10,
            poll_interval: Duration::from_secs(1),
            command_timeout: Duration::from_secs(1),
        }
    }
}

struct WorkerHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

/// Handle to the sequencer. Cheap to share behind an `Arc`.
pub struct ExecutionEngine<R, O, N, C> {
    store: Arc<ScheduleStore<R, O, N, C>>,
    config: EngineConfig,
    running: Arc<AtomicBool>,
    status: Arc<watch::Sender<EngineStatus>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl<R, O, N, C> ExecutionEngine<R, O, N, C>
where
    R: RecordStore + 'static,
    O: OutputDriver + 'static,
    N: ChangeNotifier + 'static,
    C: Clock + 'static,
{
    pub fn new(store: Arc<ScheduleStore<R, O, N, C>>, config: EngineConfig) -> Self {
        let (status, _) = watch::channel(EngineStatus::default());
        Self {
            store,
            config,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(status),
            worker: Mutex::new(None),
        }
    }

    /// Configure every zone's output line and drive it inactive.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Timeout`] if the store lock is unavailable.
    /// Failures on individual lines are logged.
    pub async fn init(&self) -> Result<(), SprinklerError> {
        let lines = self
            .store
            .read(|catalog| catalog.zones().map(|z| (z.id, z.output)).collect::<Vec<_>>())
            .await?;
        let outputs = self.store.outputs();
        for (zone_id, output) in lines {
            if let Err(err) = outputs
                .configure(output)
                .and_then(|()| outputs.set_output(output, false))
            {
                tracing::warn!(zone = %zone_id, %output, error = %err, "failed to initialise output");
            }
        }
        tracing::debug!("outputs initialised");
        Ok(())
    }

    /// Start sequencing: refresh every `next_run`, spawn the worker and hand
    /// it the program to resume, if a restart interrupted one.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] if the engine is already running
    /// - [`SprinklerError::Timeout`] if the store lock is unavailable
    pub async fn start(&self) -> Result<(), SprinklerError> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return Err(StateError::AlreadyRunning.into());
        }

        if let Err(err) = self.store.refresh_next_runs().await {
            tracing::warn!(error = %err, "failed to refresh next runs");
        }
        let now = self.store.now();
        let plan = self
            .store
            .read(|catalog| find_resumable(catalog, &now))
            .await?;

        let (commands, receiver) = mpsc::channel(self.config.queue_depth);
        if let Some(plan) = plan {
            if commands.try_send(Command::Resume(plan)).is_err() {
                tracing::warn!(program = %plan.program_id, "could not queue program resume");
            }
        }

        self.running.store(true, Ordering::Release);
        self.status.send_modify(|status| status.running = true);
        let task = tokio::spawn(
            Worker::new(
                Arc::clone(&self.store),
                receiver,
                Arc::clone(&self.running),
                Arc::clone(&self.status),
                self.config.poll_interval,
            )
            .run(),
        );
        *worker = Some(WorkerHandle { commands, task });

        tracing::info!(resuming = plan.is_some(), "engine started");
        Ok(())
    }

    /// Hard stop: the active zone is switched off and the worker exits. If
    /// the worker does not finish in time it is aborted and every output is
    /// forced off.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::InvalidState`] if the engine is not running.
    pub async fn stop(&self) -> Result<(), SprinklerError> {
        let handle = self
            .worker
            .lock()
            .await
            .take()
            .ok_or(StateError::NotRunning)?;
        self.running.store(false, Ordering::Release);

        let WorkerHandle { commands, mut task } = handle;
        if commands.try_send(Command::Shutdown).is_err() {
            tracing::debug!("shutdown not queued, worker will observe the stop flag");
        }
        drop(commands);

        match tokio::time::timeout(self.config.command_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(error = %err, "worker ended abnormally");
                self.force_all_off().await;
            }
            Err(_) => {
                tracing::warn!("worker did not stop in time, aborting");
                task.abort();
                self.force_all_off().await;
            }
        }

        self.status.send_replace(EngineStatus::default());
        tracing::info!("engine stopped");
        Ok(())
    }

    async fn force_all_off(&self) {
        let lines = match self
            .store
            .read(|catalog| catalog.zones().map(|z| z.output).collect::<Vec<_>>())
            .await
        {
            Ok(lines) => lines,
            Err(err) => {
                tracing::error!(error = %err, "cannot list outputs to force off");
                return;
            }
        };
        for output in lines {
            if let Err(err) = self.store.outputs().set_output(output, false) {
                tracing::error!(%output, error = %err, "failed to force output off");
            }
        }
    }

    /// Whether [`ExecutionEngine::start`] has been called without a matching
    /// [`ExecutionEngine::stop`].
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Current state snapshot.
    pub fn status(&self) -> EngineStatus {
        *self.status.borrow()
    }

    /// Snapshot with the remaining time of the active zone.
    pub fn report(&self) -> StatusReport {
        self.status().report(self.store.clock().utc_now())
    }

    /// Follow state changes.
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    async fn sender(&self) -> Result<mpsc::Sender<Command>, SprinklerError> {
        self.worker
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.commands.clone())
            .ok_or_else(|| StateError::NotRunning.into())
    }

    async fn send(&self, command: Command) -> Result<(), SprinklerError> {
        self.sender()
            .await?
            .send_timeout(command, self.config.command_timeout)
            .await
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => CapacityError::QueueFull.into(),
                SendTimeoutError::Closed(_) => StateError::NotRunning.into(),
            })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SprinklerError> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        tokio::time::timeout(self.config.command_timeout, response)
            .await
            .map_err(|_| SprinklerError::Timeout)?
            .map_err(|_| StateError::NotRunning.into())
    }

    /// Delete a zone. While the engine runs, an active zone is switched off
    /// before its slot is freed.
    ///
    /// # Errors
    ///
    /// Whatever [`ScheduleStore::remove_zone`] returns, or
    /// [`SprinklerError::Timeout`] / [`SprinklerError::NoMemory`] when the
    /// worker does not take the request in time.
    pub async fn remove_zone(&self, zone_id: ZoneId) -> Result<Zone, SprinklerError> {
        if self.sender().await.is_err() {
            return self.store.remove_zone(zone_id).await;
        }
        self.request(|reply| Command::RemoveZone { zone_id, reply })
            .await?
    }

    /// Switch a zone on or off by hand.
    ///
    /// Turning on the zone that is already active changes nothing. Turning on
    /// another zone cancels the current activity and runs it until switched
    /// off. Turning off the active zone cancels it.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] when `zone_id` is outside
    ///   `1..=MAX_ZONES` or the engine is not running
    /// - [`SprinklerError::NotFound`] when the slot is empty
    /// - [`SprinklerError::NoMemory`] when the command queue stays full
    pub async fn control_zone(&self, zone_id: u8, on: bool) -> Result<(), SprinklerError> {
        let zone_id = ZoneId::new(zone_id).map_err(|_| StateError::ZoneOutOfRange(zone_id))?;
        self.request(|reply| Command::ControlZone { zone_id, on, reply })
            .await?
    }

    /// Cancel current activity and run one zone for `duration_seconds`.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidArgument`] for a zero duration
    /// - [`SprinklerError::InvalidState`] when the engine is not running
    /// - [`SprinklerError::NotFound`] when the slot is empty
    pub async fn manual_zone(&self, zone_id: ZoneId, duration_seconds: u32) -> Result<(), SprinklerError> {
        if duration_seconds == 0 {
            return Err(ValidationError::ZeroDuration.into());
        }
        self.request(|reply| Command::ManualZone {
            zone_id,
            duration: Some(duration_seconds),
            reply,
        })
        .await?
    }

    /// Queue a program run now and stamp its `last_run`.
    ///
    /// # Errors
    ///
    /// - [`SprinklerError::InvalidState`] when the program slot is empty or
    ///   the engine is not running
    /// - [`SprinklerError::NoMemory`] when the queue stays full for the
    ///   command timeout
    pub async fn manual_program(&self, program_id: ProgramId) -> Result<(), SprinklerError> {
        self.store
            .read(|catalog| catalog.require_program(program_id).map(|_| ()))
            .await??;
        self.send(Command::StartProgram(program_id)).await?;

        if let Err(err) = self.store.update_program_last_run(program_id).await {
            tracing::warn!(program = %program_id, error = %err, "failed to stamp program start");
        }
        tracing::info!(program = %program_id, "program started by hand");
        Ok(())
    }

    /// Cancel whatever is running. An interrupted program is rescheduled for
    /// its next window.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::InvalidState`] when the engine is not running.
    pub async fn stop_pending(&self) -> Result<(), SprinklerError> {
        self.request(|reply| Command::StopPending { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, harness_at, tuesday};
    use chrono::{TimeDelta, Utc, Weekday};
    use sprinkler_domain::days::DayMask;
    use sprinkler_domain::execution::RunKind;
    use sprinkler_domain::id::OutputPin;
    use sprinkler_domain::program::{ProgramZone, Schedule};
    use tokio::time::Instant;

    type TestEngine = ExecutionEngine<
        Arc<crate::testing::MemoryRecords>,
        Arc<crate::testing::RecordingOutputs>,
        Arc<crate::testing::RecordingNotifier>,
        crate::testing::TestClock,
    >;

    fn engine(h: &Harness) -> TestEngine {
        ExecutionEngine::new(Arc::clone(&h.store), EngineConfig::default())
    }

    fn zone_id(n: u8) -> ZoneId {
        ZoneId::new(n).unwrap()
    }

    fn pin(n: u8) -> OutputPin {
        OutputPin(n + 10)
    }

    fn tuesdays_at(hour: u8, minute: u8) -> Schedule {
        Schedule::new([Weekday::Tue].into_iter().collect::<DayMask>(), hour, minute).unwrap()
    }

    async fn add_zones(h: &Harness, count: u8) {
        for n in 1..=count {
            h.store
                .create_or_update_zone(None, &format!("Zone {n}"), pin(n))
                .await
                .unwrap();
        }
    }

    async fn add_program(h: &Harness, schedule: Schedule, refs: &[(u8, u16)]) -> ProgramId {
        let zones = (0u8..)
            .zip(refs)
            .map(|(order, &(zone, minutes))| ProgramZone::new(zone_id(zone), minutes, order))
            .collect();
        h.store
            .create_or_update_program(None, "Program", schedule, zones)
            .await
            .unwrap()
            .id
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn active_zone(engine: &TestEngine) -> Option<u8> {
        engine.status().state.active().map(|a| a.zone_id.get())
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_disabled_zones_and_reschedule_after_last_zone() {
        let h = harness_at(tuesday(9, 59));
        add_zones(&h, 3).await;
        h.store.enable_zone(zone_id(2), false).await.unwrap();
        let program = add_program(&h, tuesdays_at(10, 0), &[(1, 10), (2, 15), (3, 5)]).await;
        let scheduled = Some(tuesday(10, 0).with_timezone(&Utc));
        assert_eq!(h.store.load_program(program).await.unwrap().next_run, scheduled);

        let engine = engine(&h);
        let origin = Instant::now();
        engine.start().await.unwrap();

        tokio::time::sleep_until(origin + Duration::from_secs(65)).await;
        assert_eq!(active_zone(&engine), Some(1));

        tokio::time::sleep_until(origin + Duration::from_secs(665)).await;
        assert_eq!(active_zone(&engine), Some(3));
        assert_eq!(h.outputs.on_count(pin(2)), 0);

        tokio::time::sleep_until(origin + Duration::from_secs(955)).await;
        assert_eq!(active_zone(&engine), Some(3));
        assert_eq!(h.store.load_program(program).await.unwrap().next_run, scheduled);

        tokio::time::sleep_until(origin + Duration::from_secs(965)).await;
        assert!(engine.status().state.is_idle());
        assert!(h.outputs.active().is_empty());
        let finished = h.store.load_program(program).await.unwrap();
        assert_eq!(finished.next_run, scheduled.map(|t| t + TimeDelta::days(7)));
        assert_eq!(finished.last_run, scheduled);

        engine.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_restart_already_active_zone() {
        let h = harness_at(tuesday(12, 0));
        add_zones(&h, 1).await;
        let engine = engine(&h);
        engine.start().await.unwrap();

        engine.control_zone(1, true).await.unwrap();
        let first = engine.status().state.active().copied().unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        engine.control_zone(1, true).await.unwrap();
        let second = engine.status().state.active().copied().unwrap();

        assert_eq!(first.started_at, second.started_at);
        assert_eq!(second.duration, None);
        assert_eq!(h.outputs.on_count(pin(1)), 1);

        engine.control_zone(1, false).await.unwrap();
        assert!(engine.status().state.is_idle());
        assert!(h.outputs.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_a_single_zone_running() {
        let h = harness_at(tuesday(12, 0));
        add_zones(&h, 3).await;
        let program = add_program(&h, tuesdays_at(6, 0), &[(3, 10)]).await;
        let engine = engine(&h);
        engine.start().await.unwrap();

        engine.manual_zone(zone_id(1), 60).await.unwrap();
        assert_eq!(h.outputs.active(), vec![pin(1)]);

        engine.manual_zone(zone_id(2), 60).await.unwrap();
        assert_eq!(h.outputs.active(), vec![pin(2)]);

        engine.control_zone(1, true).await.unwrap();
        assert_eq!(h.outputs.active(), vec![pin(1)]);

        engine.manual_program(program).await.unwrap();
        settle().await;
        assert_eq!(h.outputs.active(), vec![pin(3)]);
        assert!(matches!(
            engine.status().state.active().map(|a| a.run),
            Some(RunKind::Scheduled { .. })
        ));

        engine.stop_pending().await.unwrap();
        assert!(h.outputs.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_resume_interrupted_program_on_start() {
        let h = harness_at(tuesday(6, 45));
        add_zones(&h, 2).await;
        let program = add_program(&h, tuesdays_at(6, 0), &[(1, 30), (2, 40)]).await;
        let engine = engine(&h);

        engine.start().await.unwrap();
        settle().await;

        let active = engine.status().state.active().copied().unwrap();
        assert_eq!(active.zone_id, zone_id(2));
        assert_eq!(active.duration, Some(25 * 60));
        assert_eq!(
            active.run,
            RunKind::Scheduled {
                program_id: program,
                zone_index: 1
            }
        );
        assert_eq!(
            h.store.load_program(program).await.unwrap().last_run,
            Some(tuesday(6, 45).with_timezone(&Utc))
        );

        tokio::time::sleep(Duration::from_secs(25 * 60 + 2)).await;
        assert!(engine.status().state.is_idle());
        assert!(h.outputs.active().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_turn_manual_zone_off_when_timer_expires() {
        let h = harness_at(tuesday(12, 0));
        add_zones(&h, 1).await;
        let engine = engine(&h);
        engine.start().await.unwrap();

        engine.manual_zone(zone_id(1), 30).await.unwrap();
        assert_eq!(engine.report().active.and_then(|a| a.remaining), Some(30));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.report().active.and_then(|a| a.remaining), Some(20));

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert!(engine.status().state.is_idle());
        assert!(h.outputs.active().is_empty());
        assert_eq!(
            h.store.zone_last_run(zone_id(1)).await.unwrap(),
            Some(tuesday(12, 0).with_timezone(&Utc))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_reschedule_interrupted_program() {
        let h = harness_at(tuesday(9, 59));
        add_zones(&h, 1).await;
        let program = add_program(&h, tuesdays_at(10, 0), &[(1, 30)]).await;
        let engine = engine(&h);
        engine.start().await.unwrap();

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(active_zone(&engine), Some(1));

        engine.stop_pending().await.unwrap();
        assert!(engine.status().state.is_idle());
        let rescheduled = h.store.load_program(program).await.unwrap();
        assert_eq!(
            rescheduled.next_run,
            Some(tuesday(10, 0).with_timezone(&Utc) + TimeDelta::days(7))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_program_that_comes_due_while_busy() {
        let h = harness_at(tuesday(9, 59));
        add_zones(&h, 2).await;
        let program = add_program(&h, tuesdays_at(10, 0), &[(2, 10)]).await;
        let engine = engine(&h);
        engine.start().await.unwrap();

        engine.manual_zone(zone_id(1), 600).await.unwrap();
        tokio::time::sleep(Duration::from_secs(65)).await;

        assert_eq!(active_zone(&engine), Some(1));
        assert_eq!(h.outputs.on_count(pin(2)), 0);
        let skipped = h.store.load_program(program).await.unwrap();
        assert_eq!(
            skipped.next_run,
            Some(tuesday(10, 0).with_timezone(&Utc) + TimeDelta::days(7))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_finish_program_without_enabled_zones_immediately() {
        let h = harness_at(tuesday(12, 0));
        add_zones(&h, 1).await;
        h.store.enable_zone(zone_id(1), false).await.unwrap();
        let program = add_program(&h, tuesdays_at(6, 0), &[(1, 10)]).await;
        let engine = engine(&h);
        engine.start().await.unwrap();

        engine.manual_program(program).await.unwrap();
        settle().await;

        assert!(engine.status().state.is_idle());
        assert!(h.outputs.active().is_empty());
        assert!(
            h.store
                .load_program(program)
                .await
                .unwrap()
                .last_run
                .is_some()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_lifecycle_misuse() {
        let h = harness_at(tuesday(12, 0));
        add_zones(&h, 1).await;
        let engine = engine(&h);

        assert!(matches!(
            engine.manual_zone(zone_id(1), 10).await,
            Err(SprinklerError::InvalidState(StateError::NotRunning))
        ));
        assert!(matches!(
            engine.stop().await,
            Err(SprinklerError::InvalidState(StateError::NotRunning))
        ));

        engine.start().await.unwrap();
        assert!(matches!(
            engine.start().await,
            Err(SprinklerError::InvalidState(StateError::AlreadyRunning))
        ));
        assert!(matches!(
            engine.control_zone(9, true).await,
            Err(SprinklerError::InvalidState(StateError::ZoneOutOfRange(9)))
        ));
        assert!(matches!(
            engine.control_zone(4, true).await,
            Err(SprinklerError::NotFound(_))
        ));
        assert!(matches!(
            engine.manual_zone(zone_id(1), 0).await,
            Err(SprinklerError::InvalidArgument(ValidationError::ZeroDuration))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn should_switch_everything_off_on_stop() {
        let h = harness_at(tuesday(12, 0));
        add_zones(&h, 1).await;
        let engine = engine(&h);
        engine.init().await.unwrap();
        engine.start().await.unwrap();
        assert!(engine.is_running());

        engine.manual_zone(zone_id(1), 600).await.unwrap();
        engine.stop().await.unwrap();

        assert!(!engine.is_running());
        assert!(h.outputs.active().is_empty());
        assert_eq!(engine.status(), EngineStatus::default());

        engine.start().await.unwrap();
        engine.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_active_zone_before_removing_it() {
        let h = harness_at(tuesday(12, 0));
        add_zones(&h, 2).await;
        let engine = engine(&h);
        engine.start().await.unwrap();
        engine.manual_zone(zone_id(1), 600).await.unwrap();

        engine.remove_zone(zone_id(1)).await.unwrap();

        assert!(engine.status().state.is_idle());
        assert!(h.outputs.active().is_empty());

        let reused = h
            .store
            .create_or_update_zone(None, "New", OutputPin(30))
            .await
            .unwrap();
        assert_eq!(reused.id, zone_id(1));
        assert_eq!(active_zone(&engine), None);

        engine.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_running_zone_when_another_is_removed() {
        let h = harness_at(tuesday(12, 0));
        add_zones(&h, 2).await;
        let engine = engine(&h);
        engine.start().await.unwrap();
        engine.manual_zone(zone_id(1), 600).await.unwrap();

        engine.remove_zone(zone_id(2)).await.unwrap();

        assert_eq!(active_zone(&engine), Some(1));
        assert_eq!(h.outputs.active(), vec![pin(1)]);
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn should_remove_zone_directly_when_engine_is_stopped() {
        let h = harness_at(tuesday(12, 0));
        add_zones(&h, 1).await;
        let engine = engine(&h);

        engine.remove_zone(zone_id(1)).await.unwrap();

        assert!(matches!(
            h.store.load_zone(zone_id(1)).await,
            Err(SprinklerError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_valve_open_when_running_zone_is_renamed() {
        let h = harness_at(tuesday(12, 0));
        add_zones(&h, 1).await;
        let engine = engine(&h);
        engine.start().await.unwrap();
        engine.manual_zone(zone_id(1), 600).await.unwrap();

        h.store
            .create_or_update_zone(Some(zone_id(1)), "Renamed", pin(1))
            .await
            .unwrap();

        assert_eq!(active_zone(&engine), Some(1));
        assert_eq!(h.outputs.active(), vec![pin(1)]);
        engine.stop().await.unwrap();
    }
}
