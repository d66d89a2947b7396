//! Port stubs for router and handler tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use tokio::sync::broadcast;

use sprinkler_app::commands::CommandHandler;
use sprinkler_app::execution_engine::{EngineConfig, ExecutionEngine};
use sprinkler_app::ports::{ChangeKind, ChangeNotifier, Clock, OutputDriver, RecordStore};
use sprinkler_app::schedule_store::ScheduleStore;
use sprinkler_domain::error::SprinklerError;
use sprinkler_domain::id::OutputPin;

use crate::state::AppState;

#[derive(Default)]
pub(crate) struct StubRecords {
    map: Mutex<HashMap<String, Vec<u8>>>,
}

impl RecordStore for StubRecords {
    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), SprinklerError> {
        self.map.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SprinklerError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), SprinklerError> {
        self.map.lock().unwrap().remove(key);
        Ok(())
    }
}

pub(crate) struct StubOutputs;

impl OutputDriver for StubOutputs {
    fn configure(&self, _output: OutputPin) -> Result<(), SprinklerError> {
        Ok(())
    }

    fn set_output(&self, _output: OutputPin, _active: bool) -> Result<(), SprinklerError> {
        Ok(())
    }
}

pub(crate) struct StubNotifier;

impl ChangeNotifier for StubNotifier {
    fn notify(&self, _kind: ChangeKind) {}
}

pub(crate) struct FixedClock(DateTime<Tz>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        self.0
    }
}

pub(crate) type StubHandler = CommandHandler<StubRecords, StubOutputs, StubNotifier, FixedClock>;
pub(crate) type StubState = AppState<StubRecords, StubOutputs, StubNotifier, FixedClock>;

pub(crate) fn test_state() -> (StubState, Arc<StubHandler>) {
    let now = chrono_tz::UTC
        .with_ymd_and_hms(2025, 6, 10, 10, 0, 0)
        .unwrap();
    let store = Arc::new(ScheduleStore::new(
        StubRecords::default(),
        StubOutputs,
        StubNotifier,
        FixedClock(now),
    ));
    let engine = Arc::new(ExecutionEngine::new(
        Arc::clone(&store),
        EngineConfig::default(),
    ));
    let handler = Arc::new(CommandHandler::new(store, engine));
    let (updates, _) = broadcast::channel(16);
    (AppState::new(Arc::clone(&handler), updates), handler)
}
