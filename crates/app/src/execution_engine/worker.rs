//! The sequencing worker: sole owner of the execution state and zone timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

use sprinkler_domain::error::{NotFoundError, SprinklerError};
use sprinkler_domain::execution::{ActiveZone, EngineStatus, ExecutionState, RunKind};
use sprinkler_domain::id::{OutputPin, ProgramId, ZoneId};
use sprinkler_domain::recovery::RecoveryPlan;
use sprinkler_domain::zone::Zone;

use crate::ports::{ChangeNotifier, Clock, OutputDriver, RecordStore};
use crate::schedule_store::ScheduleStore;

/// Messages accepted by the worker.
#[derive(Debug)]
pub(super) enum Command {
    /// Run a program from its first enabled zone.
    StartProgram(ProgramId),
    /// Continue a program interrupted by a restart.
    Resume(RecoveryPlan),
    ManualZone {
        zone_id: ZoneId,
        duration: Option<u32>,
        reply: oneshot::Sender<Result<(), SprinklerError>>,
    },
    ControlZone {
        zone_id: ZoneId,
        on: bool,
        reply: oneshot::Sender<Result<(), SprinklerError>>,
    },
    StopPending {
        reply: oneshot::Sender<()>,
    },
    /// Delete a zone, switching it off first if it is the active one.
    RemoveZone {
        zone_id: ZoneId,
        reply: oneshot::Sender<Result<Zone, SprinklerError>>,
    },
    Shutdown,
}

/// Single-shot timer that must be re-armed for every zone.
#[derive(Debug, Default)]
struct ZoneTimer {
    deadline: Option<Instant>,
}

impl ZoneTimer {
    fn arm(&mut self, seconds: u32) {
        self.deadline = Some(Instant::now() + Duration::from_secs(u64::from(seconds)));
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// The zone being driven, plus the line it was switched on through.
#[derive(Debug, Clone, Copy)]
struct Current {
    zone: ActiveZone,
    output: OutputPin,
}

pub(super) struct Worker<R, O, N, C> {
    store: Arc<ScheduleStore<R, O, N, C>>,
    commands: mpsc::Receiver<Command>,
    running: Arc<AtomicBool>,
    status: Arc<watch::Sender<EngineStatus>>,
    poll_interval: Duration,
    current: Option<Current>,
    timer: ZoneTimer,
}

impl<R, O, N, C> Worker<R, O, N, C>
where
    R: RecordStore + 'static,
    O: OutputDriver + 'static,
    N: ChangeNotifier + 'static,
    C: Clock + 'static,
{
    pub(super) fn new(
        store: Arc<ScheduleStore<R, O, N, C>>,
        commands: mpsc::Receiver<Command>,
        running: Arc<AtomicBool>,
        status: Arc<watch::Sender<EngineStatus>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            commands,
            running,
            status,
            poll_interval,
            current: None,
            timer: ZoneTimer::default(),
        }
    }

    pub(super) async fn run(mut self) {
        tracing::info!("sequencing worker started");
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.timer.deadline();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command).await,
                },
                () = sleep_until_opt(deadline) => self.on_timer_expired().await,
                _ = poll.tick() => {
                    if !self.running.load(Ordering::Acquire) {
                        break;
                    }
                    self.start_due_program().await;
                }
            }
        }

        self.halt().await;
        tracing::info!("sequencing worker stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::StartProgram(program_id) => {
                self.stop_pending().await;
                self.start_program(program_id, 0).await;
            }
            Command::Resume(plan) => self.resume(plan).await,
            Command::ManualZone {
                zone_id,
                duration,
                reply,
            } => {
                let result = self.run_manual(zone_id, duration).await;
                let _ = reply.send(result);
            }
            Command::ControlZone { zone_id, on, reply } => {
                let result = self.control_zone(zone_id, on).await;
                let _ = reply.send(result);
            }
            Command::StopPending { reply } => {
                self.stop_pending().await;
                let _ = reply.send(());
            }
            Command::RemoveZone { zone_id, reply } => {
                let result = self.remove_zone(zone_id).await;
                let _ = reply.send(result);
            }
            Command::Shutdown => {}
        }
    }

    fn publish(&self) {
        let state = match self.current {
            Some(current) => ExecutionState::Active(current.zone),
            None => ExecutionState::Idle,
        };
        self.status.send_modify(|status| status.state = state);
    }

    /// Switch a zone on and arm the timer. `duration == None` runs until
    /// stopped.
    async fn activate(
        &mut self,
        run: RunKind,
        zone_id: ZoneId,
        duration: Option<u32>,
    ) -> Result<(), SprinklerError> {
        let output = self
            .store
            .read(|catalog| catalog.zone(zone_id).map(|zone| zone.output))
            .await?
            .ok_or_else(|| NotFoundError {
                entity: "Zone",
                id: zone_id.to_string(),
            })?;
        self.store.outputs().set_output(output, true)?;

        self.current = Some(Current {
            zone: ActiveZone {
                run,
                zone_id,
                started_at: self.store.clock().utc_now(),
                duration,
            },
            output,
        });
        match duration {
            Some(seconds) => self.timer.arm(seconds),
            None => self.timer.cancel(),
        }
        self.publish();
        tracing::info!(zone = %zone_id, ?run, ?duration, "zone on");

        if let Err(err) = self.store.update_zone_status(zone_id, true).await {
            tracing::warn!(zone = %zone_id, error = %err, "failed to record zone start");
        }
        Ok(())
    }

    /// Switch the active zone off and clear the state.
    async fn deactivate(&mut self) -> Option<ActiveZone> {
        let current = self.current.take()?;
        self.timer.cancel();
        if let Err(err) = self.store.outputs().set_output(current.output, false) {
            tracing::error!(zone = %current.zone.zone_id, error = %err, "failed to switch zone off");
        }
        self.publish();
        tracing::info!(zone = %current.zone.zone_id, "zone off");

        if let Err(err) = self.store.update_zone_status(current.zone.zone_id, false).await {
            tracing::warn!(zone = %current.zone.zone_id, error = %err, "failed to record zone stop");
        }
        Some(current.zone)
    }

    /// Run the first enabled zone of `program_id` at or after `from`, or
    /// finish the program when none is left.
    async fn start_program(&mut self, program_id: ProgramId, from: usize) {
        let next = match self
            .store
            .read(|catalog| catalog.next_enabled_ref(program_id, from))
            .await
        {
            Ok(next) => next,
            Err(err) => {
                tracing::error!(program = %program_id, error = %err, "failed to look up next zone");
                return;
            }
        };

        let Some((zone_index, zone_ref)) = next else {
            self.finish_program(program_id).await;
            return;
        };
        let run = RunKind::Scheduled {
            program_id,
            zone_index,
        };
        let duration = zone_ref.duration_seconds();
        if let Err(err) = self.activate(run, zone_ref.zone_id, Some(duration)).await {
            tracing::error!(program = %program_id, zone = %zone_ref.zone_id, error = %err, "failed to start zone");
            self.finish_program(program_id).await;
        }
    }

    async fn finish_program(&mut self, program_id: ProgramId) {
        match self.store.update_program_next_run(program_id).await {
            Ok(program) => {
                tracing::info!(program = %program_id, next_run = ?program.next_run, "program finished");
            }
            Err(err) => {
                tracing::warn!(program = %program_id, error = %err, "failed to reschedule program");
            }
        }
    }

    async fn resume(&mut self, plan: RecoveryPlan) {
        self.stop_pending().await;
        let run = RunKind::Scheduled {
            program_id: plan.program_id,
            zone_index: plan.zone_index,
        };
        tracing::info!(program = %plan.program_id, zone = %plan.zone_id, remaining = plan.remaining, "resuming interrupted program");
        if let Err(err) = self.activate(run, plan.zone_id, Some(plan.remaining)).await {
            tracing::error!(program = %plan.program_id, error = %err, "failed to resume program");
            self.finish_program(plan.program_id).await;
            return;
        }
        if let Err(err) = self.store.update_program_last_run(plan.program_id).await {
            tracing::warn!(program = %plan.program_id, error = %err, "failed to stamp program start");
        }
    }

    async fn on_timer_expired(&mut self) {
        self.timer.cancel();
        let Some(finished) = self.deactivate().await else {
            return;
        };
        match finished.run {
            RunKind::Manual => {
                tracing::debug!(zone = %finished.zone_id, "manual run finished");
            }
            RunKind::Scheduled {
                program_id,
                zone_index,
            } => self.start_program(program_id, zone_index + 1).await,
        }
    }

    /// Cancel whatever is running. An interrupted program is rescheduled
    /// for its next window rather than resumed.
    async fn stop_pending(&mut self) {
        let Some(interrupted) = self.deactivate().await else {
            return;
        };
        if let Some(program_id) = interrupted.run.program_id() {
            tracing::info!(program = %program_id, "program interrupted");
            self.finish_program(program_id).await;
        }
    }

    async fn remove_zone(&mut self, zone_id: ZoneId) -> Result<Zone, SprinklerError> {
        if self.current.is_some_and(|current| current.zone.zone_id == zone_id) {
            tracing::info!(zone = %zone_id, "stopping zone before removal");
            self.stop_pending().await;
        }
        self.store.remove_zone(zone_id).await
    }

    async fn run_manual(&mut self, zone_id: ZoneId, duration: Option<u32>) -> Result<(), SprinklerError> {
        self.stop_pending().await;
        self.activate(RunKind::Manual, zone_id, duration).await
    }

    async fn control_zone(&mut self, zone_id: ZoneId, on: bool) -> Result<(), SprinklerError> {
        let active = self.current.map(|current| current.zone.zone_id);
        match (on, active == Some(zone_id)) {
            (true, true) => Ok(()),
            (true, false) => self.run_manual(zone_id, None).await,
            (false, true) => {
                self.stop_pending().await;
                Ok(())
            }
            (false, false) => {
                let output = self
                    .store
                    .read(|catalog| catalog.zone(zone_id).map(|zone| zone.output))
                    .await?
                    .ok_or_else(|| NotFoundError {
                        entity: "Zone",
                        id: zone_id.to_string(),
                    })?;
                self.store.outputs().set_output(output, false)?;
                self.store.update_zone_status(zone_id, false).await
            }
        }
    }

    /// Start the first due program. A program that comes due while another
    /// run is active misses this window.
    async fn start_due_program(&mut self) {
        let now = self.store.clock().utc_now();
        let due = match self.store.read(|catalog| catalog.due_programs(now)).await {
            Ok(due) => due,
            Err(err) => {
                tracing::warn!(error = %err, "failed to check for due programs");
                return;
            }
        };
        let running = self.current.and_then(|current| current.zone.run.program_id());
        let Some(program_id) = due.into_iter().find(|id| Some(*id) != running) else {
            return;
        };

        if self.current.is_some() {
            tracing::warn!(program = %program_id, "program due while another run is active, skipping this window");
            self.finish_program(program_id).await;
            return;
        }

        tracing::info!(program = %program_id, "starting scheduled program");
        if let Err(err) = self.store.update_program_last_run(program_id).await {
            tracing::warn!(program = %program_id, error = %err, "failed to stamp program start");
        }
        self.start_program(program_id, 0).await;
    }

    /// Leave everything off on the way out.
    async fn halt(&mut self) {
        self.deactivate().await;
    }
}
