//! In-memory port fakes shared by the unit tests of this crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use tokio::time::Instant;

use sprinkler_domain::error::SprinklerError;
use sprinkler_domain::id::OutputPin;

use crate::ports::{ChangeKind, ChangeNotifier, Clock, OutputDriver, RecordStore};
use crate::schedule_store::ScheduleStore;

#[derive(Default)]
pub(crate) struct MemoryRecords {
    map: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_writes: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl MemoryRecords {
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn insert_raw(&self, key: &str, value: &[u8]) {
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

fn disk_error() -> SprinklerError {
    SprinklerError::Storage(Box::new(std::io::Error::other("disk unavailable")))
}

impl RecordStore for MemoryRecords {
    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), SprinklerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(disk_error());
        }
        self.map.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SprinklerError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), SprinklerError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(disk_error());
        }
        self.map.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingOutputs {
    lines: Mutex<BTreeMap<OutputPin, bool>>,
    switches: Mutex<Vec<(OutputPin, bool)>>,
}

impl RecordingOutputs {
    /// Lines currently driven on.
    pub fn active(&self) -> Vec<OutputPin> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, on)| **on)
            .map(|(pin, _)| *pin)
            .collect()
    }

    pub fn is_configured(&self, pin: OutputPin) -> bool {
        self.lines.lock().unwrap().contains_key(&pin)
    }

    /// How many times `pin` was switched on.
    pub fn on_count(&self, pin: OutputPin) -> usize {
        self.switches
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, on)| *p == pin && *on)
            .count()
    }
}

impl OutputDriver for RecordingOutputs {
    fn configure(&self, output: OutputPin) -> Result<(), SprinklerError> {
        self.lines.lock().unwrap().insert(output, false);
        Ok(())
    }

    fn set_output(&self, output: OutputPin, active: bool) -> Result<(), SprinklerError> {
        self.lines.lock().unwrap().insert(output, active);
        self.switches.lock().unwrap().push((output, active));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    events: Mutex<Vec<ChangeKind>>,
}

impl RecordingNotifier {
    pub fn take(&self) -> Vec<ChangeKind> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn notify(&self, kind: ChangeKind) {
        self.events.lock().unwrap().push(kind);
    }
}

/// Wall clock that follows tokio's (possibly paused) clock from a fixed
/// starting point.
pub(crate) struct TestClock {
    base: DateTime<Tz>,
    origin: Instant,
}

impl TestClock {
    pub fn starting_at(base: DateTime<Tz>) -> Self {
        Self {
            base,
            origin: Instant::now(),
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Tz> {
        self.base + TimeDelta::from_std(self.origin.elapsed()).unwrap()
    }
}

/// `2025-06-10` (a Tuesday) at `hour:minute` UTC.
pub(crate) fn tuesday(hour: u32, minute: u32) -> DateTime<Tz> {
    chrono_tz::UTC
        .with_ymd_and_hms(2025, 6, 10, hour, minute, 0)
        .unwrap()
}

pub(crate) type TestStore = ScheduleStore<
    Arc<MemoryRecords>,
    Arc<RecordingOutputs>,
    Arc<RecordingNotifier>,
    TestClock,
>;

pub(crate) struct Harness {
    pub store: Arc<TestStore>,
    pub records: Arc<MemoryRecords>,
    pub outputs: Arc<RecordingOutputs>,
    pub notifier: Arc<RecordingNotifier>,
}

pub(crate) fn harness_at(now: DateTime<Tz>) -> Harness {
    let records = Arc::new(MemoryRecords::default());
    let outputs = Arc::new(RecordingOutputs::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let store = Arc::new(ScheduleStore::new(
        Arc::clone(&records),
        Arc::clone(&outputs),
        Arc::clone(&notifier),
        TestClock::starting_at(now),
    ));
    Harness {
        store,
        records,
        outputs,
        notifier,
    }
}
