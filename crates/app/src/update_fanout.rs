//! Turns "something changed" signals into snapshots.
//!
//! The [`ChangeQueue`] is the store's [`ChangeNotifier`]: it pushes signals
//! into a bounded queue without ever blocking. [`UpdateFanout::run`] drains
//! that queue, coalesces bursts, and publishes at most one snapshot per
//! cycle, cycles at least [`MIN_PUBLISH_INTERVAL`] apart, alternating between
//! kinds when both are pending. Subscribers receive [`Update`]s on a
//! broadcast channel; slow subscribers lag rather than slow the controller.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

use sprinkler_domain::execution::EngineStatus;

use crate::ports::{ChangeKind, ChangeNotifier, Clock, OutputDriver, RecordStore};
use crate::schedule_store::ScheduleStore;
use crate::views::{ProgramView, ZoneView, program_views, zone_views};

/// Default depth of the signal queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Minimum spacing between two published snapshots.
pub const MIN_PUBLISH_INTERVAL: Duration = Duration::from_millis(50);

/// A snapshot pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    ZoneList { zones: Vec<ZoneView> },
    ProgramList { programs: Vec<ProgramView> },
    Error { message: String },
}

impl Update {
    /// JSON text of this update.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; views only hold plain data, so this does
    /// not fail in practice.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Non-blocking [`ChangeNotifier`] feeding an [`UpdateFanout`].
#[derive(Debug, Clone)]
pub struct ChangeQueue {
    sender: mpsc::Sender<ChangeKind>,
}

/// Create a signal queue holding up to `capacity` pending signals.
#[must_use]
pub fn change_queue(capacity: usize) -> (ChangeQueue, mpsc::Receiver<ChangeKind>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (ChangeQueue { sender }, receiver)
}

impl ChangeNotifier for ChangeQueue {
    fn notify(&self, kind: ChangeKind) {
        match self.sender.try_send(kind) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%kind, "change queue full, signal dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(%kind, "no update fan-out listening");
            }
        }
    }
}

/// Kinds waiting to be published, with a round-robin cursor.
#[derive(Debug, Default)]
struct Pending {
    flags: [bool; 2],
    cursor: usize,
}

impl Pending {
    fn index(kind: ChangeKind) -> usize {
        match kind {
            ChangeKind::Zones => 0,
            ChangeKind::Programs => 1,
        }
    }

    fn insert(&mut self, kind: ChangeKind) {
        self.flags[Self::index(kind)] = true;
    }

    fn is_empty(&self) -> bool {
        !self.flags.iter().any(|flag| *flag)
    }

    fn take_next(&mut self) -> Option<ChangeKind> {
        let count = ChangeKind::ALL.len();
        let index = (0..count)
            .map(|offset| (self.cursor + offset) % count)
            .find(|&index| self.flags[index])?;
        self.flags[index] = false;
        self.cursor = (index + 1) % count;
        Some(ChangeKind::ALL[index])
    }
}

/// Background task publishing catalog snapshots.
pub struct UpdateFanout<R, O, N, C> {
    store: Arc<ScheduleStore<R, O, N, C>>,
    status: watch::Receiver<EngineStatus>,
    changes: mpsc::Receiver<ChangeKind>,
    updates: broadcast::Sender<Update>,
    min_interval: Duration,
}

impl<R, O, N, C> UpdateFanout<R, O, N, C>
where
    R: RecordStore,
    O: OutputDriver,
    N: ChangeNotifier,
    C: Clock,
{
    /// `capacity` bounds how many updates a subscriber may fall behind.
    pub fn new(
        store: Arc<ScheduleStore<R, O, N, C>>,
        status: watch::Receiver<EngineStatus>,
        changes: mpsc::Receiver<ChangeKind>,
        capacity: usize,
    ) -> Self {
        let (updates, _) = broadcast::channel(capacity);
        Self {
            store,
            status,
            changes,
            updates,
            min_interval: MIN_PUBLISH_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Handle for publishing-side consumers that outlive [`Self::run`].
    #[must_use]
    pub fn sender(&self) -> broadcast::Sender<Update> {
        self.updates.clone()
    }

    /// Receive updates published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.updates.subscribe()
    }

    /// Snapshot of `kind` against the current catalog and engine state.
    async fn snapshot(&mut self, kind: ChangeKind) -> Update {
        let state = self.status.borrow_and_update().state;
        let result = self
            .store
            .read(|catalog| match kind {
                ChangeKind::Zones => Update::ZoneList {
                    zones: zone_views(catalog, &state),
                },
                ChangeKind::Programs => Update::ProgramList {
                    programs: program_views(catalog, &state),
                },
            })
            .await;
        result.unwrap_or_else(|err| {
            tracing::warn!(%kind, error = %err, "could not snapshot catalog");
            Update::Error {
                message: format!("Failed to serialize {kind}"),
            }
        })
    }

    /// Publish until the signal queue closes.
    pub async fn run(mut self) {
        tracing::info!("update fan-out started");
        let mut pending = Pending::default();
        let mut watching = true;
        let mut last_sent: Option<Instant> = None;

        loop {
            if pending.is_empty() {
                tokio::select! {
                    kind = self.changes.recv() => match kind {
                        Some(kind) => pending.insert(kind),
                        None => break,
                    },
                    changed = self.status.changed(), if watching => match changed {
                        Ok(()) => ChangeKind::ALL.into_iter().for_each(|kind| pending.insert(kind)),
                        Err(_) => watching = false,
                    },
                }
                continue;
            }

            if let Some(last) = last_sent {
                tokio::time::sleep_until(last + self.min_interval).await;
            }
            while let Ok(kind) = self.changes.try_recv() {
                pending.insert(kind);
            }
            let Some(kind) = pending.take_next() else {
                continue;
            };

            let update = self.snapshot(kind).await;
            let receivers = self.updates.send(update).unwrap_or(0);
            tracing::debug!(%kind, receivers, "update published");
            last_sent = Some(Instant::now());
        }
        tracing::info!("update fan-out stopped");
    }
}
